//! UDP transport.
//!
//! Sends go through one shared socket bound to an ephemeral port; each
//! `listen` binds its own socket and runs a receive task that decodes datagrams
//! onto the listener's queue. Both operations need a running tokio runtime.

use super::codec;
use super::types::{Address, Payload};
use super::{Listener, Network};
use crate::error::{ClusterError, Result};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

pub struct UdpNetwork {
    socket: Arc<UdpSocket>,
}

impl UdpNetwork {
    pub async fn new() -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        tracing::debug!("UDP sender bound to {}", socket.local_addr()?);
        Ok(Self {
            socket: Arc::new(socket),
        })
    }

    fn try_send(&self, target: &Address, payload: &Payload) -> Result<()> {
        let addr = target.socket_addr()?;
        let frame = codec::encode(payload)?;
        let sent = self.socket.try_send_to(&frame, addr)?;
        if sent != frame.len() {
            return Err(ClusterError::NetworkUnavailable {
                target: target.clone(),
            });
        }
        Ok(())
    }
}

impl Network for UdpNetwork {
    fn send(&self, target: &Address, payload: Payload) -> bool {
        match self.try_send(target, &payload) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to send to {}: {}", target, e);
                false
            }
        }
    }

    fn listen(&self, address: &Address) -> Result<Listener> {
        let bind_addr = address.socket_addr()?;
        let std_socket = std::net::UdpSocket::bind(bind_addr)?;
        std_socket.set_nonblocking(true)?;
        let socket = UdpSocket::from_std(std_socket)?;

        // Port 0 asks the OS for a port; report the one actually bound.
        let local = if address.port == 0 {
            Address::from(socket.local_addr()?)
        } else {
            address.clone()
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let listener_address = local.clone();

        let handle = tokio::spawn(async move {
            let mut buf = vec![0u8; 65_536];

            loop {
                match socket.recv_from(&mut buf).await {
                    Ok((len, src)) => match codec::decode(&buf[..len]) {
                        Ok(payload) => {
                            if tx.send(payload).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::warn!("Dropping datagram from {} on {}: {}", src, local, e);
                        }
                    },
                    Err(e) => {
                        tracing::error!("Failed to receive UDP packet on {}: {}", local, e);
                        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    }
                }
            }
        });

        tracing::info!("Listening for UDP on {}", listener_address);

        Ok(Listener::new(listener_address, rx, move || handle.abort()))
    }
}
