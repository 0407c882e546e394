//! Quorum-coordinated key-value engine.
//!
//! Every inbound message runs the same pipeline, start to finish, under the
//! node's lock:
//!
//! 1. advance the sequence counter and read the clock,
//! 2. fail pending requests whose acknowledgement window has elapsed,
//! 3. re-replicate keys whose replica set moved after a member failure,
//! 4. buffer requests for keys with a write in flight,
//! 5. dispatch: count an ACK, apply a replica copy, or coordinate a client
//!    request (forward to the owner, or apply, fan out and wait for quorum).
//!
//! Timeouts are only noticed in step 2, i.e. when the next message arrives.
//! Sends are fire-and-forget and every accepted request is replicated once.

use super::memory::LocalStore;
use super::partitioner::{HashRing, ReplicaSelector};
use super::protocol::{KvMessage, MessageType};
use crate::clock::Clock;
use crate::config::NodeConfig;
use crate::error::ClusterError;
use crate::network::Network;
use crate::network::types::{Address, Payload};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// A request this node owns and has fanned out.
#[derive(Debug, Clone)]
struct PendingRequest {
    /// The request as the client sent it.
    message: KvMessage,
    accepted_at: u64,
    /// Acknowledgements so far; the owner's own apply counts as the first.
    acks: usize,
    /// What the owner read locally, for READs.
    local_value: Option<String>,
}

pub struct KvEngine {
    address: Address,
    network: Arc<dyn Network>,
    clock: Arc<dyn Clock>,
    selector: ReplicaSelector,
    quorum: usize,
    timeout_ms: u64,

    store: LocalStore,
    pending: BTreeMap<u64, PendingRequest>,
    records: BTreeMap<String, Vec<Address>>,
    blocked: HashMap<String, VecDeque<KvMessage>>,

    seq: u64,
    seq_taken: bool,
    now: u64,
}

impl KvEngine {
    pub fn new(
        address: Address,
        network: Arc<dyn Network>,
        clock: Arc<dyn Clock>,
        config: &NodeConfig,
    ) -> Self {
        let now = clock.now();
        Self {
            address,
            network,
            clock,
            selector: ReplicaSelector::new(config.replication_factor),
            quorum: config.quorum(),
            timeout_ms: config.request_timeout_ms,
            store: LocalStore::new(),
            pending: BTreeMap::new(),
            records: BTreeMap::new(),
            blocked: HashMap::new(),
            seq: 0,
            seq_taken: false,
            now,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_blocked(&self, key: &str) -> bool {
        self.blocked.contains_key(key)
    }

    pub fn blocked_count(&self) -> usize {
        self.blocked.len()
    }

    /// Requests waiting behind the in-flight write for `key`.
    pub fn buffered(&self, key: &str) -> usize {
        self.blocked.get(key).map(VecDeque::len).unwrap_or(0)
    }

    /// Replica set recorded when this node last wrote `key` as owner.
    pub fn replica_record(&self, key: &str) -> Option<&[Address]> {
        self.records.get(key).map(Vec::as_slice)
    }

    pub fn handle(&mut self, ring: &mut HashRing, message: KvMessage) {
        let now = self.tick();
        tracing::debug!(
            "[{} T={}] Received {:?} seq={} key={} from {}",
            self.address,
            now,
            message.kind,
            message.seq,
            message.key,
            message.sender
        );

        self.expire(ring, now);
        self.rebalance(ring, now);
        self.route(ring, message, now);
    }

    fn tick(&mut self) -> u64 {
        self.seq += 1;
        self.seq_taken = false;
        self.now = self.clock.now();
        self.now
    }

    /// Sequence number for a newly accepted request. The first request of a
    /// `handle` call takes the counter as advanced by `tick`; any further ones
    /// (replays, repairs) advance it again.
    fn assign_seq(&mut self) -> u64 {
        if self.seq_taken {
            self.seq += 1;
        }
        self.seq_taken = true;
        self.seq
    }

    fn expire(&mut self, ring: &mut HashRing, now: u64) {
        let expired: Vec<u64> = self
            .pending
            .iter()
            .filter(|(_, request)| now.saturating_sub(request.accepted_at) >= self.timeout_ms)
            .map(|(seq, _)| *seq)
            .collect();

        for seq in expired {
            if let Some(request) = self.pending.remove(&seq) {
                self.time_out(ring, seq, request, now);
            }
        }
    }

    fn time_out(&mut self, ring: &mut HashRing, seq: u64, request: PendingRequest, now: u64) {
        tracing::warn!(
            "[{} T={}] {} (seq={} key={})",
            self.address,
            now,
            ClusterError::Timeout {
                millis: self.timeout_ms
            },
            seq,
            request.message.key
        );
        let reply = request.message.fail(&self.address);
        self.respond(&request.message.sender, reply);

        if !request.message.kind.is_idempotent() {
            self.release(ring, &request.message.key, now);
        }
    }

    fn rebalance(&mut self, ring: &mut HashRing, now: u64) {
        if self.records.is_empty() {
            return;
        }
        let failed: HashSet<Address> = ring
            .failed(now)
            .into_iter()
            .map(|member| member.address)
            .collect();
        if failed.is_empty() {
            return;
        }

        let keys: Vec<String> = self.records.keys().cloned().collect();
        for key in keys {
            if self.blocked.contains_key(&key) {
                continue;
            }

            let Ok(targets) = self.replica_set(ring, &key, now) else {
                continue;
            };

            let Some(stored) = self.records.get(&key) else {
                continue;
            };
            let stored: HashSet<&Address> = stored.iter().collect();
            if targets.iter().all(|address| stored.contains(address)) {
                continue;
            }

            let Some(value) = self.store.read(&key) else {
                self.records.remove(&key);
                continue;
            };

            tracing::info!(
                "[{} T={}] Rebalancing key={} onto {:?} ({} failed members)",
                self.address,
                now,
                key,
                targets,
                failed.len()
            );

            let repair = KvMessage::new(
                MessageType::Replicate,
                self.seq,
                self.address.clone(),
                key.clone(),
                Some(value),
            );
            let owner = targets[0].clone();
            if owner == self.address {
                self.coordinate(ring, repair, now);
            } else {
                // Ownership moved: hand the value to the new owner.
                self.records.remove(&key);
                self.send(&owner, repair);
            }
        }
    }

    fn route(&mut self, ring: &mut HashRing, message: KvMessage, now: u64) {
        if message.kind.is_request()
            && !message.replica
            && let Some(queue) = self.blocked.get_mut(&message.key)
        {
            tracing::debug!(
                "[{}] Buffered {:?} seq={} for blocked key={}",
                self.address,
                message.kind,
                message.seq,
                message.key
            );
            queue.push_back(message);
            return;
        }

        self.dispatch(ring, message, now);
    }

    fn dispatch(&mut self, ring: &mut HashRing, message: KvMessage, now: u64) {
        match message.kind {
            MessageType::Ack => self.acknowledge(ring, message, now),
            MessageType::Ok | MessageType::Fail => {
                tracing::debug!(
                    "[{}] Dropping {:?} seq={} from {}",
                    self.address,
                    message.kind,
                    message.seq,
                    message.sender
                );
            }
            _ if message.replica => self.apply_replica(message),
            _ => self.coordinate(ring, message, now),
        }
    }

    fn acknowledge(&mut self, ring: &mut HashRing, ack: KvMessage, now: u64) {
        let Some(request) = self.pending.get_mut(&ack.seq) else {
            tracing::trace!("[{}] Ignoring ack for settled seq={}", self.address, ack.seq);
            return;
        };

        // Anything past its window was already failed by `expire`.
        if request.acks + 1 < self.quorum {
            request.acks += 1;
            tracing::debug!(
                "[{}] Ack received for seq={} ({}/{})",
                self.address,
                ack.seq,
                request.acks,
                self.quorum
            );
            return;
        }

        if let Some(request) = self.pending.remove(&ack.seq) {
            tracing::debug!(
                "[{}] Ack received and quorum reached for seq={} key={}",
                self.address,
                ack.seq,
                request.message.key
            );
            self.complete(ring, request, ack.value, now);
        }
    }

    fn complete(
        &mut self,
        ring: &mut HashRing,
        request: PendingRequest,
        acked_value: Option<String>,
        now: u64,
    ) {
        let message = request.message;

        let reply = if message.kind == MessageType::Read {
            match acked_value.or(request.local_value) {
                Some(value) => message.with_value(Some(value)).ok(&self.address),
                None => message.fail(&self.address),
            }
        } else {
            message.ok(&self.address)
        };
        self.respond(&message.sender, reply);

        if !message.kind.is_idempotent() {
            self.release(ring, &message.key, now);
        }
    }

    fn coordinate(&mut self, ring: &mut HashRing, message: KvMessage, now: u64) {
        let targets = match self.replica_set(ring, &message.key, now) {
            Ok(targets) => targets,
            Err(e) => {
                tracing::error!("[{}] {} for key={}", self.address, e, message.key);
                let reply = message.fail(&self.address);
                self.respond(&message.sender, reply);
                return;
            }
        };

        let owner = &targets[0];
        if *owner != self.address {
            tracing::debug!(
                "[{}] Forwarding {:?} key={} to owner {}",
                self.address,
                message.kind,
                message.key,
                owner
            );
            self.send(owner, message);
            return;
        }

        let seq = self.assign_seq();
        let local_value = self.apply(&message);
        if self.store.contains(&message.key) {
            self.records.insert(message.key.clone(), targets.clone());
        } else {
            self.records.remove(&message.key);
        }

        if !message.kind.is_idempotent() {
            self.block(&message.key);
        }

        let replica = message.replica_of(&self.address).with_seq(seq);
        self.pending.insert(
            seq,
            PendingRequest {
                message,
                accepted_at: now,
                acks: 1,
                local_value,
            },
        );
        tracing::debug!("[{}] Pending request seq={}", self.address, seq);

        for target in &targets[1..] {
            tracing::debug!("[{}] Send replication seq={} to {}", self.address, seq, target);
            self.send(target, replica.clone());
        }
    }

    /// Replica set for `key`, owner first.
    fn replica_set(
        &self,
        ring: &mut HashRing,
        key: &str,
        now: u64,
    ) -> Result<Vec<Address>, ClusterError> {
        let needed = self.selector.replication_factor();
        let targets = self.selector.pick(ring, key, now);
        // Owner first; never empty on success, even for a zero replication factor.
        if targets.is_empty() || targets.len() < needed {
            return Err(ClusterError::InsufficientReplicas {
                needed: needed.max(1),
                available: ring.ordered(now).len(),
            });
        }
        Ok(targets)
    }

    fn apply_replica(&mut self, message: KvMessage) {
        let value = self.apply(&message);
        let reply = if message.kind == MessageType::Read {
            message.with_value(value).ack(&self.address)
        } else {
            message.ack(&self.address)
        };
        self.send(&message.sender, reply);
    }

    /// Applies a request to the local store; returns the value read, for READs.
    fn apply(&mut self, message: &KvMessage) -> Option<String> {
        let key = message.key.as_str();
        match message.kind {
            MessageType::Read => {
                let value = self.store.read(key);
                tracing::debug!("[{}] read key={} value={:?}", self.address, key, value);
                value
            }
            MessageType::Create | MessageType::Replicate => {
                let value = message.value.clone().unwrap_or_default();
                self.store.create(key, value);
                tracing::debug!("[{}] create saved key={}", self.address, key);
                None
            }
            MessageType::Update => {
                let value = message.value.clone().unwrap_or_default();
                self.store.update(key, value);
                tracing::debug!("[{}] update saved key={}", self.address, key);
                None
            }
            MessageType::Delete => {
                self.store.delete(key);
                tracing::debug!("[{}] delete saved key={}", self.address, key);
                None
            }
            MessageType::Ack | MessageType::Ok | MessageType::Fail => None,
        }
    }

    fn block(&mut self, key: &str) {
        self.blocked.entry(key.to_string()).or_default();
        tracing::debug!("[{}] Blocked key={}", self.address, key);
    }

    /// Unblocks `key` and replays its buffer in arrival order. A replayed write
    /// blocks the key again, so whatever follows it is buffered anew.
    fn release(&mut self, ring: &mut HashRing, key: &str, now: u64) {
        let Some(queue) = self.blocked.remove(key) else {
            return;
        };
        tracing::debug!(
            "[{}] Released key={} ({} buffered)",
            self.address,
            key,
            queue.len()
        );
        for message in queue {
            self.route(ring, message, now);
        }
    }

    fn respond(&self, target: &Address, message: KvMessage) {
        if *target == self.address {
            tracing::debug!(
                "[{}] {:?} for self-initiated seq={} key={}",
                self.address,
                message.kind,
                message.seq,
                message.key
            );
            return;
        }
        self.send(target, message);
    }

    fn send(&self, target: &Address, message: KvMessage) {
        if !self.network.send(target, Payload::Kv(message)) {
            tracing::warn!(
                "[{}] {}",
                self.address,
                ClusterError::NetworkUnavailable {
                    target: target.clone()
                }
            );
        }
    }
}
