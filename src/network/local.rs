//! In-process network.
//!
//! Each listening address owns an unbounded channel; `send` pushes straight onto
//! it. Delivery is immediate and ordered per sender, which keeps multi-node
//! tests deterministic.

use super::types::{Address, Payload};
use super::{Listener, Network};
use crate::error::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

struct Registration {
    id: u64,
    queue: mpsc::UnboundedSender<Payload>,
}

#[derive(Clone, Default)]
pub struct LocalNetwork {
    listeners: Arc<DashMap<Address, Registration>>,
    next_id: Arc<AtomicU64>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_listening(&self, address: &Address) -> bool {
        self.listeners.contains_key(address)
    }
}

impl Network for LocalNetwork {
    fn send(&self, target: &Address, payload: Payload) -> bool {
        match self.listeners.get(target) {
            Some(registration) => registration.queue.send(payload).is_ok(),
            None => {
                tracing::trace!("No listener on {}", target);
                false
            }
        }
    }

    fn listen(&self, address: &Address) -> Result<Listener> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        // A newer listener replaces the old one; the old one's close must not
        // unregister its replacement.
        self.listeners
            .insert(address.clone(), Registration { id, queue: tx });

        let listeners = self.listeners.clone();
        let key = address.clone();
        Ok(Listener::new(address.clone(), rx, move || {
            listeners.remove_if(&key, |_, registration| registration.id == id);
        }))
    }
}
