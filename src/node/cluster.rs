use crate::clock::Clock;
use crate::config::NodeConfig;
use crate::membership::gossip::GossipDriver;
use crate::membership::service::Membership;
use crate::membership::spread::{RandomSpread, SpreadStrategy};
use crate::network::Network;
use crate::network::types::{Address, Payload};
use crate::storage::engine::KvEngine;
use crate::storage::partitioner::HashRing;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

struct NodeCore {
    ring: HashRing,
    gossip: GossipDriver,
    kv: KvEngine,
}

/// A single cluster member.
///
/// All state sits behind one mutex: every entry point takes it for the whole
/// call, which keeps the engine's cleanup, rebalance and dispatch steps atomic.
pub struct ClusterNode {
    address: Address,
    core: Mutex<NodeCore>,
}

/// Point-in-time summary of a node, as served by `/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub address: String,
    pub failed: bool,
    pub heartbeat: u64,
    pub members: Vec<String>,
    pub failed_members: Vec<String>,
    pub keys: usize,
    pub pending_requests: usize,
    pub blocked_keys: usize,
}

impl ClusterNode {
    pub fn new(
        address: Address,
        network: Arc<dyn Network>,
        clock: Arc<dyn Clock>,
        config: &NodeConfig,
    ) -> Self {
        let spread = Box::new(RandomSpread::new(config.gossip_fanout));
        Self::with_spread(address, network, clock, config, spread)
    }

    pub fn with_spread(
        address: Address,
        network: Arc<dyn Network>,
        clock: Arc<dyn Clock>,
        config: &NodeConfig,
        spread: Box<dyn SpreadStrategy>,
    ) -> Self {
        let mut membership = Membership::new(
            address.clone(),
            config.failure_window_ms,
            config.cleanup_window_ms,
        );
        let gossip = GossipDriver::new(
            address.clone(),
            network.clone(),
            clock.clone(),
            spread,
            &mut membership,
        );
        let kv = KvEngine::new(address.clone(), network, clock, config);

        tracing::info!(
            "[{}] Node created (rf={}, quorum={}, ring={})",
            address,
            config.replication_factor,
            config.quorum(),
            config.ring_space
        );

        Self {
            address,
            core: Mutex::new(NodeCore {
                ring: HashRing::new(config.ring_space, membership),
                gossip,
                kv,
            }),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Routes one inbound payload to the gossip driver or the KV engine.
    pub fn handle(&self, payload: Payload) {
        let mut core = self.lock();
        let NodeCore { ring, gossip, kv } = &mut *core;
        match payload {
            Payload::Gossip(message) => gossip.handle(ring.membership_mut(), message),
            Payload::Kv(message) => kv.handle(ring, message),
        }
    }

    pub fn cycle(&self) {
        let mut core = self.lock();
        let NodeCore { ring, gossip, .. } = &mut *core;
        gossip.cycle(ring.membership_mut());
    }

    pub fn join(&self, target: &Address) -> bool {
        self.lock().gossip.join(target)
    }

    /// Active members in ring order.
    pub fn peers(&self) -> Vec<Address> {
        let mut core = self.lock();
        let now = core.gossip.local_time();
        core.ring.ordered(now)
    }

    /// Stops gossip for good and forgets the membership view.
    pub fn fail(&self) {
        let mut core = self.lock();
        let NodeCore { ring, gossip, .. } = &mut *core;
        gossip.fail(ring.membership_mut());
    }

    pub fn is_failed(&self) -> bool {
        self.lock().gossip.is_failed()
    }

    /// This node's local copy of `key`, bypassing the quorum path.
    pub fn local_value(&self, key: &str) -> Option<String> {
        self.lock().kv.store().read(key)
    }

    pub fn status(&self) -> NodeStatus {
        let mut core = self.lock();
        let now = core.gossip.local_time();
        let members = core.ring.ordered(now);
        let failed_members = core.ring.failed(now);

        NodeStatus {
            address: self.address.to_string(),
            failed: core.gossip.is_failed(),
            heartbeat: core.gossip.heartbeat(),
            members: members.iter().map(ToString::to_string).collect(),
            failed_members: failed_members
                .iter()
                .map(|member| member.address.to_string())
                .collect(),
            keys: core.kv.store().len(),
            pending_requests: core.kv.pending_count(),
            blocked_keys: core.kv.blocked_count(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, NodeCore> {
        // Every critical section leaves the tables consistent, so a panic in
        // one caller does not invalidate them for the next.
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
