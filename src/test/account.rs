use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::mmu::{BufferAccount, MmuConfig, THRESHOLD_CAP};
use crate::queue::QCNT;

fn account(max: u64) -> BufferAccount {
    let cfg = MmuConfig {
        max_buffer_bytes: max,
        ..MmuConfig::default()
    };
    BufferAccount::new(&cfg, 8)
}

#[test]
fn dynamic_threshold_shrinks_as_the_pool_fills() {
    let mut a = account(10_000);
    let mut prev = a.queue_threshold(0);
    assert_eq!(prev, 10_000);
    for _ in 0..10 {
        a.add_used(1_000, 0);
        let t = a.queue_threshold(0);
        assert!(t <= prev, "threshold grew: {prev} -> {t}");
        prev = t;
    }
    assert_eq!(a.used_buffer(), 10_000);
    assert_eq!(a.remaining(), 0);
    assert_eq!(a.queue_threshold(0), 0);
}

#[test]
fn used_buffer_tracks_add_and_delete_per_priority() {
    let mut cfg = MmuConfig {
        max_buffer_bytes: 10_000,
        ..MmuConfig::default()
    };
    cfg.queue_to_priority[3] = 1;
    let mut a = BufferAccount::new(&cfg, 8);

    a.add_used(1_000, 1);
    a.add_used(2_000, 3);
    assert_eq!(a.used_buffer(), 3_000);
    assert_eq!(a.priority_used(1), 3_000);
    assert_eq!(a.priority_used(3), 3_000);
    assert_eq!(a.priority_used(0), 0);

    a.delete_used(2_000, 3);
    assert_eq!(a.used_buffer(), 1_000);
    assert_eq!(a.priority_used(1), 1_000);
    assert_eq!(a.sent_bytes(), 2_000);
}

#[test]
#[should_panic(expected = "underflow")]
fn deleting_more_than_used_panics() {
    let mut a = account(10_000);
    a.add_used(500, 0);
    a.delete_used(501, 0);
}

#[test]
fn thresholds_are_clamped_to_their_width() {
    let mut cfg = MmuConfig {
        max_buffer_bytes: 1_000_000_000,
        ..MmuConfig::default()
    };
    cfg.queue_alpha[0] = 10.0;
    cfg.queue_alpha[1] = 0.0;
    let a = BufferAccount::new(&cfg, 1);

    assert_eq!(a.queue_threshold(0), u32::MAX);
    assert_eq!(a.queue_threshold(1), 0);
    // priority_alpha 默认为 10
    assert_eq!(a.priority_threshold(0), 10_000_000_000);
    assert!(THRESHOLD_CAP < u32::MAX);
}

#[test]
fn set_buffer_overrides_pool() {
    let mut a = account(10_000);
    a.set_buffer(4_000, 1_000);
    assert_eq!(a.max_buffer(), 4_000);
    assert_eq!(a.remaining(), 3_000);
    assert_eq!(a.queue_threshold(0), 3_000);
}

#[test]
fn set_saturated_is_idempotent() {
    let mut a = account(10_000);
    a.set_saturated(2, 1, true);
    a.set_saturated(2, 1, true);
    assert_eq!(a.congestion(1), 1);
    a.set_saturated(3, 1, true);
    assert_eq!(a.congestion(1), 2);
    a.set_saturated(2, 1, false);
    a.set_saturated(2, 1, false);
    assert_eq!(a.congestion(1), 1);
    assert_eq!(a.congestion(0), 0);
    assert_eq!(a.congestion_divisor(0), 1);
    assert_eq!(a.congestion_divisor(1), 1);
}

#[test]
fn congestion_count_matches_brute_force_recount() {
    let ports = 8;
    let map = [0, 0, 2, 2, 4, 5, 6, 6];
    let cfg = MmuConfig {
        queue_to_priority: map,
        ..MmuConfig::default()
    };
    let mut a = BufferAccount::new(&cfg, ports);
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..5_000 {
        let port = rng.gen_range(0..ports);
        let queue = rng.gen_range(0..QCNT);
        let sat = rng.gen_bool(0.5);
        a.set_saturated(port, queue, sat);

        for p in 0..QCNT {
            let expected = (0..ports)
                .flat_map(|port| (0..QCNT).map(move |q| (port, q)))
                .filter(|&(port, q)| map[q] == p && a.is_saturated(port, q))
                .count() as u32;
            assert_eq!(a.congestion(p), expected, "priority {p}");
        }
    }
}

#[test]
fn queues_sharing_a_priority_keep_separate_bits() {
    let cfg = MmuConfig {
        queue_to_priority: [0, 0, 2, 3, 4, 5, 6, 7],
        ..MmuConfig::default()
    };
    let mut a = BufferAccount::new(&cfg, 1);
    a.set_saturated(0, 0, true);
    a.set_saturated(0, 1, false);
    assert!(a.is_saturated(0, 0));
    assert_eq!(a.congestion(0), 1);
    a.set_saturated(0, 1, true);
    assert_eq!(a.congestion(0), 2);
    a.set_saturated(0, 0, false);
    assert_eq!(a.congestion(0), 1);
    assert_eq!(a.congestion(1), 0);
}

#[test]
fn saturation_for_unknown_port_grows_the_table() {
    let cfg = MmuConfig::default();
    let mut a = BufferAccount::new(&cfg, 1);
    assert!(!a.is_saturated(5, 0));
    a.set_saturated(5, 0, true);
    assert!(a.is_saturated(5, 0));
    assert_eq!(a.congestion(0), 1);
}
