//! Periodic gossip protocol logic.
//!
//! The driver owns the node's heartbeat and local time but not the membership
//! table: callers pass it in, so the same table can back the hash ring.

use super::service::Membership;
use super::spread::SpreadStrategy;
use super::types::{GossipMessage, Member};
use crate::clock::Clock;
use crate::network::Network;
use crate::network::types::{Address, Payload};
use std::sync::Arc;

pub struct GossipDriver {
    address: Address,
    network: Arc<dyn Network>,
    clock: Arc<dyn Clock>,
    spread: Box<dyn SpreadStrategy>,
    heartbeat: u64,
    local_time: u64,
    failed: bool,
}

impl GossipDriver {
    /// Creates the driver and seeds `membership` with the local record.
    pub fn new(
        address: Address,
        network: Arc<dyn Network>,
        clock: Arc<dyn Clock>,
        spread: Box<dyn SpreadStrategy>,
        membership: &mut Membership,
    ) -> Self {
        let local_time = clock.now();
        let driver = Self {
            address,
            network,
            clock,
            spread,
            heartbeat: 0,
            local_time,
            failed: false,
        };
        membership.add(driver.self_member(), local_time);
        driver
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn heartbeat(&self) -> u64 {
        self.heartbeat
    }

    pub fn local_time(&self) -> u64 {
        self.local_time
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Announces this node to `target`. Joining yourself is a no-op.
    pub fn join(&self, target: &Address) -> bool {
        if *target == self.address {
            return false;
        }
        let message = GossipMessage::Join {
            sender: self.self_member(),
        };
        tracing::info!("[{}] Sending join request to {}", self.address, target);
        self.send(target, message)
    }

    /// One protocol round: bump the heartbeat, refresh self, push the view.
    pub fn cycle(&mut self, membership: &mut Membership) {
        if self.failed {
            return;
        }

        self.heartbeat += 1;
        self.local_time = self.clock.now();

        let me = self.self_member();
        membership.add(me.clone(), self.local_time);

        let members = membership.list(self.local_time);
        let candidates: Vec<Address> = members
            .iter()
            .filter(|member| member.address != self.address)
            .map(|member| member.address.clone())
            .collect();

        tracing::debug!(
            "[{} T={} H={}] Members: {}",
            self.address,
            self.local_time,
            self.heartbeat,
            members.len()
        );

        let targets = self.spread.targets(&candidates);
        if targets.is_empty() {
            return;
        }

        let message = GossipMessage::MemberList {
            sender: me,
            members,
        };
        for target in targets.iter().filter(|target| **target != self.address) {
            self.send(target, message.clone());
        }
    }

    pub fn handle(&mut self, membership: &mut Membership, message: GossipMessage) {
        if self.failed {
            return;
        }

        tracing::debug!(
            "[{} T={} H={}] Received gossip from {} ({} members)",
            self.address,
            self.local_time,
            self.heartbeat,
            message.sender().address,
            message.members().len()
        );

        match message {
            GossipMessage::Join { sender } => {
                membership.add(sender, self.local_time);
            }
            GossipMessage::MemberList { sender, members } => {
                membership.add(sender, self.local_time);
                for member in members {
                    membership.add(member, self.local_time);
                }
            }
        }
    }

    /// Stops the node for good and forgets every member.
    pub fn fail(&mut self, membership: &mut Membership) {
        tracing::warn!(
            "[{} T={} H={}] Node failed",
            self.address,
            self.local_time,
            self.heartbeat
        );
        self.failed = true;
        membership.reset();
    }

    /// Active member addresses as of the last cycle.
    pub fn peers(&self, membership: &mut Membership) -> Vec<Address> {
        membership
            .list(self.local_time)
            .into_iter()
            .map(|member| member.address)
            .collect()
    }

    fn self_member(&self) -> Member {
        Member::new(self.address.clone(), self.heartbeat, self.local_time)
    }

    fn send(&self, target: &Address, message: GossipMessage) -> bool {
        let sent = self.network.send(target, Payload::Gossip(message));
        if !sent {
            tracing::debug!("[{}] Gossip to {} not delivered", self.address, target);
        }
        sent
    }
}
