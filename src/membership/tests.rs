//! Membership Module Tests
//!
//! Validates the membership table and the gossip driver built on it.
//!
//! ## Test Scopes
//! - **Membership**: Acceptance rule, heartbeat precedence, failure and cleanup aging.
//! - **GossipDriver**: Join, cycle, merge and the terminal failed state, observed
//!   through `LocalNetwork` listeners.
//! - **Spread**: Target selection size and determinism.

#[cfg(test)]
mod tests {
    use crate::clock::ManualClock;
    use crate::membership::gossip::GossipDriver;
    use crate::membership::service::Membership;
    use crate::membership::spread::{BroadcastSpread, RandomSpread, SpreadStrategy};
    use crate::membership::types::{GossipMessage, Member, MemberId};
    use crate::network::local::LocalNetwork;
    use crate::network::types::{Address, Payload};
    use crate::network::{Listener, Network};
    use std::collections::HashSet;
    use std::sync::Arc;

    const START: u64 = 10_000;
    const FAILURE: u64 = 2000;
    const CLEANUP: u64 = 3000;

    fn table(port: u16) -> Membership {
        Membership::new(Address::local(port), FAILURE, CLEANUP)
    }

    fn member(port: u16, heartbeat: u64, last_seen: u64) -> Member {
        Member::new(Address::local(port), heartbeat, last_seen)
    }

    fn ports(members: &[Member]) -> Vec<u16> {
        let mut ports: Vec<u16> = members.iter().map(|m| m.address.port).collect();
        ports.sort();
        ports
    }

    fn gossip(listener: &mut Listener) -> Vec<GossipMessage> {
        listener
            .drain()
            .into_iter()
            .filter_map(|payload| match payload {
                Payload::Gossip(message) => Some(message),
                Payload::Kv(_) => None,
            })
            .collect()
    }

    struct Node {
        driver: GossipDriver,
        membership: Membership,
    }

    fn node(port: u16, network: &LocalNetwork, clock: &ManualClock) -> Node {
        let mut membership = table(port);
        let driver = GossipDriver::new(
            Address::local(port),
            Arc::new(network.clone()),
            Arc::new(clock.clone()),
            Box::new(BroadcastSpread),
            &mut membership,
        );
        Node { driver, membership }
    }

    // ============================================================
    // MEMBER TESTS
    // ============================================================

    #[test]
    fn test_member_id_derives_from_address() {
        let a = member(100, 0, START);
        let b = member(100, 7, START + 5);
        assert_eq!(a.id, b.id);
        assert_eq!(a.id, MemberId::of(&Address::local(100)));
        assert_ne!(a.id, member(101, 0, START).id);
    }

    #[test]
    fn test_member_age_saturates() {
        let m = member(100, 0, START);
        assert_eq!(m.age(START + 30), 30);
        assert_eq!(m.age(START - 1), 0);
    }

    // ============================================================
    // MEMBERSHIP TABLE TESTS
    // ============================================================

    #[test]
    fn test_added_member_is_listed() {
        let mut view = table(100);
        view.add(member(105, 0, START), START);

        assert_eq!(ports(&view.list(START)), vec![105]);
        assert!(view.failed(START).is_empty());
    }

    #[test]
    fn test_member_fails_then_is_removed() {
        let mut view = table(100);
        view.add(member(105, 0, START), START);

        assert_eq!(ports(&view.list(START + FAILURE - 1)), vec![105]);

        assert!(view.list(START + FAILURE).is_empty());
        assert_eq!(ports(&view.failed(START + FAILURE)), vec![105]);

        let horizon = START + FAILURE + CLEANUP;
        assert_eq!(ports(&view.failed(horizon - 1)), vec![105]);
        assert!(view.list(horizon).is_empty());
        assert!(view.failed(horizon).is_empty());
        assert!(view.is_empty());
    }

    #[test]
    fn test_new_member_is_stamped_with_local_time() {
        let mut view = table(100);
        view.add(member(105, 0, START - 500), START);

        let stored = view.get(&MemberId::of(&Address::local(105))).unwrap();
        assert_eq!(stored.last_seen, START);
    }

    #[test]
    fn test_stale_record_is_rejected() {
        let mut view = table(100);
        view.add(member(105, 0, START), START + FAILURE);
        assert!(view.is_empty());
    }

    #[test]
    fn test_heartbeat_must_strictly_increase() {
        let mut view = table(100);
        let id = MemberId::of(&Address::local(105));
        view.add(member(105, 5, START), START);

        view.add(member(105, 5, START + 100), START + 100);
        assert_eq!(view.get(&id).unwrap().last_seen, START);

        view.add(member(105, 4, START + 200), START + 200);
        assert_eq!(view.get(&id).unwrap().heartbeat, 5);
        assert_eq!(view.get(&id).unwrap().last_seen, START);

        view.add(member(105, 6, START + 300), START + 300);
        assert_eq!(view.get(&id).unwrap().heartbeat, 6);
        assert_eq!(view.get(&id).unwrap().last_seen, START + 300);
    }

    #[test]
    fn test_higher_heartbeat_revives_failed_member() {
        let mut view = table(100);
        view.add(member(105, 1, START), START);

        let later = START + FAILURE + 10;
        assert!(view.list(later).is_empty());

        view.add(member(105, 2, later), later);
        assert_eq!(ports(&view.list(later)), vec![105]);
        assert!(view.failed(later).is_empty());
    }

    #[test]
    fn test_self_is_never_aged_out() {
        let mut view = table(100);
        view.add(member(100, 0, START), START);

        let much_later = START + 100 * (FAILURE + CLEANUP);
        assert_eq!(ports(&view.list(much_later)), vec![100]);
        assert!(view.failed(much_later).is_empty());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut view = table(100);
        view.add(member(100, 0, START), START);
        view.add(member(105, 0, START), START);

        view.reset();
        assert!(view.is_empty());
        assert!(view.list(START).is_empty());
        assert_eq!(view.local(), &Address::local(100));
    }

    // ============================================================
    // SPREAD TESTS
    // ============================================================

    fn candidates(n: u16) -> Vec<Address> {
        (0..n).map(|i| Address::local(200 + i)).collect()
    }

    #[test]
    fn test_random_spread_picks_distinct_subset() {
        let mut spread = RandomSpread::seeded(3, 7);
        let pool = candidates(10);

        let targets = spread.targets(&pool);
        assert_eq!(targets.len(), 3);

        let unique: HashSet<&Address> = targets.iter().collect();
        assert_eq!(unique.len(), 3);
        assert!(targets.iter().all(|t| pool.contains(t)));
    }

    #[test]
    fn test_random_spread_caps_at_candidate_count() {
        let mut spread = RandomSpread::new(3);
        assert_eq!(spread.targets(&candidates(2)).len(), 2);
        assert!(spread.targets(&[]).is_empty());
    }

    #[test]
    fn test_seeded_spread_is_deterministic() {
        let pool = candidates(10);
        let a = RandomSpread::seeded(3, 42).targets(&pool);
        let b = RandomSpread::seeded(3, 42).targets(&pool);
        assert_eq!(a, b);
    }

    #[test]
    fn test_broadcast_spread_returns_everyone() {
        let pool = candidates(5);
        assert_eq!(BroadcastSpread.targets(&pool), pool);
    }

    // ============================================================
    // GOSSIP DRIVER TESTS
    // ============================================================

    #[test]
    fn test_new_driver_registers_self() {
        let network = LocalNetwork::new();
        let clock = ManualClock::new(START);
        let mut n = node(100, &network, &clock);

        assert_eq!(n.driver.peers(&mut n.membership), vec![Address::local(100)]);
        assert_eq!(n.driver.heartbeat(), 0);
    }

    #[test]
    fn test_join_sends_self_record() {
        let network = LocalNetwork::new();
        let clock = ManualClock::new(START);
        let n = node(100, &network, &clock);
        let mut seed = network.listen(&Address::local(105)).unwrap();

        assert!(n.driver.join(&Address::local(105)));

        let sent = gossip(&mut seed);
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            GossipMessage::Join { sender } => {
                assert_eq!(sender.address, Address::local(100));
                assert_eq!(sender.heartbeat, 0);
            }
            other => panic!("expected join, got {:?}", other),
        }
    }

    #[test]
    fn test_join_self_is_noop() {
        let network = LocalNetwork::new();
        let clock = ManualClock::new(START);
        let n = node(100, &network, &clock);
        let mut own = network.listen(&Address::local(100)).unwrap();

        assert!(!n.driver.join(&Address::local(100)));
        assert!(own.drain().is_empty());
    }

    #[test]
    fn test_join_to_unreachable_seed_reports_false() {
        let network = LocalNetwork::new();
        let clock = ManualClock::new(START);
        let n = node(100, &network, &clock);

        assert!(!n.driver.join(&Address::local(999)));
    }

    #[test]
    fn test_handle_join_adds_sender() {
        let network = LocalNetwork::new();
        let clock = ManualClock::new(START);
        let mut n = node(100, &network, &clock);

        n.driver.handle(
            &mut n.membership,
            GossipMessage::Join {
                sender: member(105, 0, START),
            },
        );

        assert_eq!(ports(&n.membership.list(START)), vec![100, 105]);
    }

    #[test]
    fn test_handle_member_list_merges_all() {
        let network = LocalNetwork::new();
        let clock = ManualClock::new(START);
        let mut n = node(100, &network, &clock);

        n.driver.handle(
            &mut n.membership,
            GossipMessage::MemberList {
                sender: member(105, 3, START),
                members: vec![member(105, 3, START), member(110, 1, START)],
            },
        );

        assert_eq!(ports(&n.membership.list(START)), vec![100, 105, 110]);
    }

    #[test]
    fn test_cycle_bumps_heartbeat_and_pushes_view() {
        let network = LocalNetwork::new();
        let clock = ManualClock::new(START);
        let mut n = node(100, &network, &clock);
        let mut peer = network.listen(&Address::local(105)).unwrap();
        n.membership.add(member(105, 0, START), START);

        clock.advance(100);
        n.driver.cycle(&mut n.membership);

        assert_eq!(n.driver.heartbeat(), 1);
        assert_eq!(n.driver.local_time(), START + 100);

        let sent = gossip(&mut peer);
        assert_eq!(sent.len(), 1);
        let GossipMessage::MemberList { sender, members } = &sent[0] else {
            panic!("expected member list, got {:?}", sent[0]);
        };
        assert_eq!(sender.heartbeat, 1);
        assert_eq!(sender.last_seen, START + 100);
        assert_eq!(ports(members), vec![100, 105]);
    }

    #[test]
    fn test_cycle_never_targets_self() {
        let network = LocalNetwork::new();
        let clock = ManualClock::new(START);
        let mut n = node(100, &network, &clock);
        let mut own = network.listen(&Address::local(100)).unwrap();

        n.driver.cycle(&mut n.membership);
        assert!(own.drain().is_empty());
    }

    #[test]
    fn test_cycle_keeps_self_alive() {
        let network = LocalNetwork::new();
        let clock = ManualClock::new(START);
        let mut n = node(100, &network, &clock);

        for _ in 0..5 {
            clock.advance(FAILURE);
            n.driver.cycle(&mut n.membership);
        }
        assert_eq!(n.driver.peers(&mut n.membership), vec![Address::local(100)]);
    }

    #[test]
    fn test_failed_driver_is_inert() {
        let network = LocalNetwork::new();
        let clock = ManualClock::new(START);
        let mut n = node(100, &network, &clock);
        let mut peer = network.listen(&Address::local(105)).unwrap();
        n.membership.add(member(105, 0, START), START);

        n.driver.fail(&mut n.membership);
        assert!(n.driver.is_failed());
        assert!(n.membership.is_empty());

        n.driver.cycle(&mut n.membership);
        n.driver.handle(
            &mut n.membership,
            GossipMessage::Join {
                sender: member(110, 0, START),
            },
        );

        assert_eq!(n.driver.heartbeat(), 0);
        assert!(n.membership.is_empty());
        assert!(peer.drain().is_empty());
    }

    #[test]
    fn test_two_nodes_converge_through_gossip() {
        let network = LocalNetwork::new();
        let clock = ManualClock::new(START);
        let mut a = node(100, &network, &clock);
        let mut b = node(105, &network, &clock);
        let mut a_rx = network.listen(&Address::local(100)).unwrap();
        let mut b_rx = network.listen(&Address::local(105)).unwrap();

        a.driver.join(&Address::local(105));
        for message in gossip(&mut b_rx) {
            b.driver.handle(&mut b.membership, message);
        }
        assert_eq!(ports(&b.membership.list(START)), vec![100, 105]);

        clock.advance(100);
        b.driver.cycle(&mut b.membership);
        for message in gossip(&mut a_rx) {
            a.driver.handle(&mut a.membership, message);
        }
        assert_eq!(ports(&a.membership.list(START)), vec![100, 105]);
    }

    #[test]
    fn test_silent_peer_is_detected_as_failed() {
        let network = LocalNetwork::new();
        let clock = ManualClock::new(START);
        let mut a = node(100, &network, &clock);
        let _b_rx = network.listen(&Address::local(105)).unwrap();

        a.driver.handle(
            &mut a.membership,
            GossipMessage::Join {
                sender: member(105, 0, START),
            },
        );

        clock.advance(FAILURE);
        a.driver.cycle(&mut a.membership);

        assert_eq!(a.driver.peers(&mut a.membership), vec![Address::local(100)]);
        assert_eq!(ports(&a.membership.failed(a.driver.local_time())), vec![105]);
    }
}
