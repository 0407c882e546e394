//! Consistent-hash placement.
//!
//! Positions are `hash mod ring_space`, where `hash` is the 31-multiplier
//! polynomial string hash over UTF-16 code units (wrapping 32-bit arithmetic,
//! remainder taken as non-negative). An address hashes as
//! `31 * hash(host) + port`, so in-process addresses sit at `port mod ring_space`.
//!
//! Ordering is by position, ties broken by address. A key belongs to the first
//! member whose position is `>=` the key's position, wrapping to the first
//! member of the ring when none is.
//!
//! The hash is 32 bits wide, so `ring_space` is a `u32`: a larger space would
//! add no positions. With `ring_space = u32::MAX` distinct hashes map to
//! distinct positions except `i32::MIN`, which wraps onto `i32::MAX`.

use crate::membership::service::Membership;
use crate::membership::types::Member;
use crate::network::types::Address;

pub fn string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(unit as i32))
}

pub fn address_hash(address: &Address) -> i32 {
    string_hash(&address.host)
        .wrapping_mul(31)
        .wrapping_add(address.port as i32)
}

pub struct HashRing {
    space: u32,
    membership: Membership,
}

impl HashRing {
    pub fn new(space: u32, membership: Membership) -> Self {
        Self {
            space: space.max(1),
            membership,
        }
    }

    pub fn space(&self) -> u32 {
        self.space
    }

    pub fn key_position(&self, key: &str) -> u32 {
        self.position(string_hash(key))
    }

    pub fn address_position(&self, address: &Address) -> u32 {
        self.position(address_hash(address))
    }

    /// Active member addresses in ring order.
    pub fn ordered(&mut self, now: u64) -> Vec<Address> {
        let mut nodes: Vec<(u32, Address)> = self
            .membership
            .list(now)
            .into_iter()
            .map(|member| (self.address_position(&member.address), member.address))
            .collect();
        nodes.sort();
        nodes.into_iter().map(|(_, address)| address).collect()
    }

    /// Owner of `key`, or `None` when no member is active.
    pub fn pick(&mut self, key: &str, now: u64) -> Option<Address> {
        let target = self.key_position(key);
        let nodes = self.ordered(now);

        nodes
            .iter()
            .find(|address| self.address_position(address) >= target)
            .or_else(|| nodes.first())
            .cloned()
    }

    pub fn add(&mut self, member: Member, now: u64) {
        self.membership.add(member, now);
    }

    pub fn list(&mut self, now: u64) -> Vec<Member> {
        self.membership.list(now)
    }

    pub fn failed(&mut self, now: u64) -> Vec<Member> {
        self.membership.failed(now)
    }

    pub fn reset(&mut self) {
        self.membership.reset();
    }

    pub fn local(&self) -> &Address {
        self.membership.local()
    }

    pub fn membership(&self) -> &Membership {
        &self.membership
    }

    pub fn membership_mut(&mut self) -> &mut Membership {
        &mut self.membership
    }

    fn position(&self, hash: i32) -> u32 {
        (hash as i64).rem_euclid(self.space as i64) as u32
    }
}

/// Owner plus clockwise successors for a key.
#[derive(Debug, Clone, Copy)]
pub struct ReplicaSelector {
    replication_factor: usize,
}

impl ReplicaSelector {
    pub fn new(replication_factor: usize) -> Self {
        Self { replication_factor }
    }

    pub fn replication_factor(&self) -> usize {
        self.replication_factor
    }

    /// Exactly `replication_factor` distinct addresses, owner first, or an
    /// empty list when too few members are active.
    pub fn pick(&self, ring: &mut HashRing, key: &str, now: u64) -> Vec<Address> {
        let nodes = ring.ordered(now);
        if nodes.len() < self.replication_factor || nodes.is_empty() {
            return Vec::new();
        }

        let Some(owner) = ring.pick(key, now) else {
            return Vec::new();
        };
        let start = nodes.iter().position(|address| *address == owner).unwrap_or(0);

        (0..self.replication_factor)
            .map(|offset| nodes[(start + offset) % nodes.len()].clone())
            .collect()
    }
}
