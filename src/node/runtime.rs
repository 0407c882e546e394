//! Tokio scheduler for a node.
//!
//! Two tasks per node: one drains the inbound queue into `handle`, the other
//! calls `cycle` on a fixed interval. Both go through the node's lock, so
//! they never run concurrently against its state.

use super::cluster::ClusterNode;
use crate::network::Listener;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub struct NodeRuntime {
    node: Arc<ClusterNode>,
    tasks: Vec<JoinHandle<()>>,
}

impl NodeRuntime {
    /// Spawns the inbound and cycle loops. Must be called inside a tokio runtime.
    pub fn start(node: Arc<ClusterNode>, mut listener: Listener, interval: Duration) -> Self {
        tracing::info!(
            "[{}] Starting runtime (cycle every {:?})",
            node.address(),
            interval
        );

        let inbound_node = node.clone();
        let inbound = tokio::spawn(async move {
            while let Some(payload) = listener.recv().await {
                inbound_node.handle(payload);
            }
            tracing::debug!("[{}] Inbound queue closed", inbound_node.address());
        });

        let cycle_node = node.clone();
        let cycle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                cycle_node.cycle();
            }
        });

        Self {
            node,
            tasks: vec![inbound, cycle],
        }
    }

    pub fn node(&self) -> &Arc<ClusterNode> {
        &self.node
    }

    /// Stops both loops. The listener goes down with the inbound task.
    pub fn shutdown(mut self) {
        self.abort();
        tracing::info!("[{}] Runtime stopped", self.node.address());
    }

    fn abort(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for NodeRuntime {
    fn drop(&mut self) {
        self.abort();
    }
}
