//! The membership table.
//!
//! Plain data owned by one node. All aging is computed against the `now` the
//! caller passes in, so the table itself never reads a clock.

use super::types::{Member, MemberId};
use crate::network::types::Address;
use std::collections::BTreeMap;

pub struct Membership {
    local: Address,
    failure_window: u64,
    cleanup_window: u64,
    members: BTreeMap<MemberId, Member>,
}

impl Membership {
    pub fn new(local: Address, failure_window: u64, cleanup_window: u64) -> Self {
        Self {
            local,
            failure_window,
            cleanup_window,
            members: BTreeMap::new(),
        }
    }

    /// Address of the node owning this view.
    pub fn local(&self) -> &Address {
        &self.local
    }

    /// Merges `member` into the view.
    ///
    /// Records older than the failure window are rejected outright. A new
    /// member is stored as seen at `now`; a known one is replaced only by a
    /// strictly higher heartbeat.
    pub fn add(&mut self, member: Member, now: u64) {
        if member.age(now) >= self.failure_window {
            tracing::trace!(
                "[{}] Ignoring stale record for {} (age {} ms)",
                self.local,
                member.address,
                member.age(now)
            );
            return;
        }

        match self.members.get_mut(&member.id) {
            Some(existing) => {
                if member.heartbeat > existing.heartbeat {
                    tracing::trace!(
                        "[{}] Updating {}: hb {} -> {}",
                        self.local,
                        member.address,
                        existing.heartbeat,
                        member.heartbeat
                    );
                    existing.heartbeat = member.heartbeat;
                    existing.last_seen = now;
                }
            }
            None => {
                tracing::info!("[{} T={}] Added new member {}", self.local, now, member.address);
                self.members.insert(member.id.clone(), member.seen_at(now));
            }
        }
    }

    /// Active members, self included, after pruning expired entries.
    pub fn list(&mut self, now: u64) -> Vec<Member> {
        self.prune(now);
        self.members
            .values()
            .filter(|member| self.is_local(member) || member.age(now) < self.failure_window)
            .cloned()
            .collect()
    }

    /// Members past the failure window that have not been removed yet.
    pub fn failed(&mut self, now: u64) -> Vec<Member> {
        self.prune(now);
        self.members
            .values()
            .filter(|member| !self.is_local(member) && member.age(now) >= self.failure_window)
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &MemberId) -> Option<&Member> {
        self.members.get(id)
    }

    /// Number of records held, failed-but-not-removed ones included.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn reset(&mut self) {
        self.members.clear();
        tracing::debug!("[{}] Membership reset", self.local);
    }

    fn is_local(&self, member: &Member) -> bool {
        member.address == self.local
    }

    fn prune(&mut self, now: u64) {
        let horizon = self.failure_window + self.cleanup_window;
        let local = self.local.clone();

        self.members.retain(|id, member| {
            if member.address == local {
                return true;
            }
            let age = member.age(now);
            if age >= horizon {
                tracing::info!("[{} T={}] Member {} removed from member list", local, now, id.0);
                return false;
            }
            true
        });
    }
}
