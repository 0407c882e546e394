//! Request/response client.
//!
//! Nodes never hold a connection open for a client; the client listens on its
//! own address and matches replies by sequence number.

use crate::error::{ClusterError, Result};
use crate::network::types::{Address, Payload};
use crate::network::{Listener, Network};
use crate::storage::protocol::{KvMessage, MessageType};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(300);

pub struct KvClient {
    address: Address,
    network: Arc<dyn Network>,
    listener: Listener,
    nodes: Vec<Address>,
    seq: u64,
    timeout: Duration,
}

impl KvClient {
    /// Starts listening on `address`. Requests rotate over `nodes`.
    pub fn new(address: Address, network: Arc<dyn Network>, nodes: Vec<Address>) -> Result<Self> {
        if nodes.is_empty() {
            return Err(ClusterError::InvalidConfig(
                "client needs at least one node".to_string(),
            ));
        }
        let listener = network.listen(&address)?;
        Ok(Self {
            address,
            network,
            listener,
            nodes,
            seq: 0,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub async fn create(&mut self, key: &str, value: &str) -> Result<()> {
        self.request(|seq, sender| KvMessage::create(seq, sender, key, value))
            .await
            .map(|_| ())
    }

    pub async fn read(&mut self, key: &str) -> Result<String> {
        let reply = self
            .request(|seq, sender| KvMessage::read(seq, sender, key))
            .await?;
        reply.value.ok_or_else(|| ClusterError::Rejected {
            key: key.to_string(),
        })
    }

    pub async fn update(&mut self, key: &str, value: &str) -> Result<()> {
        self.request(|seq, sender| KvMessage::update(seq, sender, key, value))
            .await
            .map(|_| ())
    }

    pub async fn delete(&mut self, key: &str) -> Result<()> {
        self.request(|seq, sender| KvMessage::delete(seq, sender, key))
            .await
            .map(|_| ())
    }

    async fn request(
        &mut self,
        build: impl FnOnce(u64, Address) -> KvMessage,
    ) -> Result<KvMessage> {
        self.seq += 1;
        let seq = self.seq;
        let target = self.nodes[(seq % self.nodes.len() as u64) as usize].clone();
        let message = build(seq, self.address.clone());
        let key = message.key.clone();

        tracing::debug!(
            "[{}] {:?} key={} seq={} -> {}",
            self.address,
            message.kind,
            key,
            seq,
            target
        );
        if !self.network.send(&target, Payload::Kv(message)) {
            return Err(ClusterError::NetworkUnavailable { target });
        }

        let deadline = Instant::now() + self.timeout;
        loop {
            let payload = match tokio::time::timeout_at(deadline, self.listener.recv()).await {
                Ok(Some(payload)) => payload,
                Ok(None) | Err(_) => {
                    return Err(ClusterError::Timeout {
                        millis: self.timeout.as_millis() as u64,
                    });
                }
            };

            let Payload::Kv(reply) = payload else {
                continue;
            };
            if reply.seq != seq {
                tracing::debug!(
                    "[{}] Discarding stale reply seq={} (waiting for {})",
                    self.address,
                    reply.seq,
                    seq
                );
                continue;
            }

            match reply.kind {
                MessageType::Ok => return Ok(reply),
                MessageType::Fail => return Err(ClusterError::Rejected { key }),
                other => {
                    tracing::debug!("[{}] Ignoring {:?} seq={}", self.address, other, seq);
                }
            }
        }
    }
}
