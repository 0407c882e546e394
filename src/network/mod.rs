//! Transport Module
//!
//! Everything a node needs to exchange messages with its peers, and nothing more.
//! The core only ever calls two operations: fire-and-forget [`Network::send`] and
//! [`Network::listen`], which hands back an inbound queue.
//!
//! ## Implementations
//! - **`local`**: In-process delivery through per-address channels. Used by tests
//!   and single-process simulations.
//! - **`udp`**: Datagram transport over tokio sockets using the `codec` framing.

pub mod codec;
pub mod local;
pub mod types;
pub mod udp;

use crate::error::Result;
use tokio::sync::mpsc;
use types::{Address, Payload};

/// Delivery contract shared by every transport.
pub trait Network: Send + Sync {
    /// Hands `payload` to the transport. `true` means it left this process,
    /// not that anyone received it.
    fn send(&self, target: &Address, payload: Payload) -> bool;

    /// Starts receiving for `address`.
    fn listen(&self, address: &Address) -> Result<Listener>;
}

type StopFn = Box<dyn FnOnce() + Send>;

/// Inbound queue for one address. Dropping it stops listening.
pub struct Listener {
    address: Address,
    queue: mpsc::UnboundedReceiver<Payload>,
    stop: Option<StopFn>,
}

impl Listener {
    pub(crate) fn new(
        address: Address,
        queue: mpsc::UnboundedReceiver<Payload>,
        stop: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            address,
            queue,
            stop: Some(Box::new(stop)),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Non-blocking poll.
    pub fn try_recv(&mut self) -> Option<Payload> {
        self.queue.try_recv().ok()
    }

    /// Waits for the next payload; `None` once closed and drained.
    pub async fn recv(&mut self) -> Option<Payload> {
        self.queue.recv().await
    }

    /// Takes everything currently queued.
    pub fn drain(&mut self) -> Vec<Payload> {
        let mut payloads = Vec::new();
        while let Some(payload) = self.try_recv() {
            payloads.push(payload);
        }
        payloads
    }

    pub fn close(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop();
            tracing::debug!("Stopped listening on {}", self.address);
        }
        self.queue.close();
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("address", &self.address)
            .field("open", &self.stop.is_some())
            .finish()
    }
}
