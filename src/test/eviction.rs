use super::support::{config, offer, shared_occupancy, switch};
use crate::mmu::{DropReason, DropType, EnqueueMethod, EnqueueOutcome, EvictCause, MmuConfig};
use crate::net::{GroupId, PortId};
use crate::queue::{QueueEnd, SchedulerKind};
use crate::sim::SimTime;

fn push_out_config(max: u64) -> MmuConfig {
    let mut cfg = config(max);
    cfg.enqueue_method = EnqueueMethod::PushOut;
    cfg
}

#[test]
fn push_out_evicts_from_longest_queue_in_group() {
    let mut sw = switch(push_out_config(10_000), 2);
    for id in 0..4 {
        assert!(offer(&mut sw, 1, 0, id, 2_000));
    }
    assert!(offer(&mut sw, 0, 0, 10, 2_000));
    assert_eq!(sw.groups()[0].account.used_buffer(), 10_000);

    assert!(offer(&mut sw, 0, 1, 20, 3_000));
    let evicted = sw.take_evictions();
    assert_eq!(evicted.len(), 2);
    for ev in &evicted {
        assert_eq!(ev.port, PortId(1));
        assert_eq!(ev.index, 0);
        assert_eq!(ev.cause, EvictCause::PushOut);
    }
    // 默认从队头驱逐
    assert_eq!(evicted[0].pkt.id, 0);
    assert_eq!(evicted[1].pkt.id, 1);

    assert_eq!(sw.port(PortId(1)).queue.bytes(0), 4_000);
    assert_eq!(sw.groups()[0].account.used_buffer(), 9_000);
    assert_eq!(shared_occupancy(&sw, 0), 9_000);
    assert_eq!(sw.port(PortId(1)).stats.evicted_pkts, 2);
}

#[test]
fn push_out_ties_pick_the_last_scanned_queue() {
    let mut sw = switch(push_out_config(4_000), 2);
    assert!(offer(&mut sw, 0, 2, 1, 2_000));
    assert!(offer(&mut sw, 1, 5, 2, 2_000));

    assert!(offer(&mut sw, 0, 0, 3, 2_000));
    let evicted = sw.take_evictions();
    assert_eq!(evicted.len(), 1);
    assert_eq!((evicted[0].port, evicted[0].index), (PortId(1), 5));
}

#[test]
fn push_out_can_evict_from_the_tail() {
    let mut cfg = push_out_config(6_000);
    cfg.evict_from = QueueEnd::Tail;
    let mut sw = switch(cfg, 1);
    for id in 0..3 {
        assert!(offer(&mut sw, 0, 1, id, 2_000));
    }
    assert!(offer(&mut sw, 0, 0, 9, 2_000));
    let evicted = sw.take_evictions();
    assert_eq!(evicted.len(), 1);
    assert_eq!(evicted[0].pkt.id, 2);
}

#[test]
fn push_out_under_strict_priority_protects_higher_priority_queues() {
    let mut cfg = push_out_config(4_000);
    cfg.scheduler = SchedulerKind::StrictPriority;
    let mut sw = switch(cfg, 1);
    assert!(offer(&mut sw, 0, 0, 1, 2_000));
    assert!(offer(&mut sw, 0, 0, 2, 2_000));

    let out = sw.enqueue(PortId(0), super::support::pkt(3, 2_000), 2, SimTime::ZERO);
    assert!(matches!(
        out,
        EnqueueOutcome::Dropped {
            reason: DropReason::NoVictim,
            ..
        }
    ));
    assert!(sw.take_evictions().is_empty());
    assert_eq!(sw.port(PortId(0)).queue.bytes(0), 4_000);
}

#[test]
fn push_out_never_evicts_below_static_floor() {
    let mut cfg = push_out_config(2_000);
    cfg.static_buffer_bytes = 2_500;
    let mut sw = switch(cfg, 1);
    for q in 0..3 {
        assert!(offer(&mut sw, 0, q, q as u64, 2_000));
    }
    assert_eq!(sw.groups()[0].account.used_buffer(), 0);

    assert!(!offer(&mut sw, 0, 3, 9, 3_000));
    assert!(sw.take_evictions().is_empty());
}

/// 单端口、alpha 0.5、池 10000：q0 3000 字节，q1 2000 字节，之后 q0 超过阈值 2500。
fn over_threshold_switch(cfg: MmuConfig) -> crate::mmu::SharedBufferSwitch {
    let mut sw = switch(cfg, 1);
    for id in 0..3 {
        assert!(offer(&mut sw, 0, 0, id, 1_000));
    }
    assert!(!offer(&mut sw, 0, 0, 3, 1_000));
    assert!(offer(&mut sw, 0, 1, 10, 1_000));
    assert!(offer(&mut sw, 0, 1, 11, 1_000));
    assert_eq!(sw.groups()[0].account.used_buffer(), 5_000);
    assert!(sw.over_threshold(0, 0));
    assert!(!sw.over_threshold(0, 1));
    sw
}

fn token_config(drop_type: DropType) -> MmuConfig {
    let mut cfg = config(10_000);
    cfg.enqueue_method = EnqueueMethod::MultiLayerDynamicThreshold;
    cfg.queue_alpha = [0.5; 8];
    cfg.drop_type = drop_type;
    cfg
}

#[test]
fn no_token_eviction_before_first_refill() {
    let mut sw = over_threshold_switch(token_config(DropType::Token));
    assert_eq!(sw.groups()[0].tokens.tokens(), 0);
    assert!(!sw.groups()[0].tokens.can_evict());
    assert!(sw.take_evictions().is_empty());
    assert_eq!(sw.port(PortId(0)).queue.bytes(0), 3_000);
    assert_eq!(sw.take_timer_requests().len(), 1);
}

#[test]
fn token_refill_evicts_one_over_threshold_packet() {
    let mut sw = over_threshold_switch(token_config(DropType::Token));
    assert!(sw.token_tick(GroupId(0), SimTime(150)));

    let evicted = sw.take_evictions();
    assert_eq!(evicted.len(), 1);
    assert_eq!(evicted[0].cause, EvictCause::Token);
    assert_eq!((evicted[0].port, evicted[0].index), (PortId(0), 0));
    assert_eq!(sw.port(PortId(0)).queue.bytes(0), 2_000);
    assert_eq!(sw.groups()[0].account.used_buffer(), 4_000);
    // 8 − ceil(1000 / 200)
    assert_eq!(sw.groups()[0].tokens.tokens(), 3);
    assert_eq!(sw.groups()[0].evict_cursor, (0, 0));

    // 不再超过阈值：只补充，不驱逐
    assert!(sw.token_tick(GroupId(0), SimTime(300)));
    assert!(sw.take_evictions().is_empty());
    assert_eq!(sw.groups()[0].tokens.tokens(), 8);
}

#[test]
fn long_token_evicts_from_the_longest_queue() {
    let mut sw = over_threshold_switch(token_config(DropType::LongToken));
    assert!(sw.token_tick(GroupId(0), SimTime(150)));
    let evicted = sw.take_evictions();
    assert_eq!(evicted.len(), 1);
    assert_eq!(evicted[0].cause, EvictCause::LongToken);
    assert_eq!(evicted[0].index, 0);
}

#[test]
fn dequeue_debits_tokens_under_multi_layer() {
    let mut sw = over_threshold_switch(token_config(DropType::None));
    sw.dequeue(PortId(0), SimTime::ZERO).expect("queued packet");
    assert_eq!(sw.groups()[0].tokens.tokens(), -5);
    assert!(sw.token_tick(GroupId(0), SimTime(150)));
    assert_eq!(sw.groups()[0].tokens.tokens(), 3);
    assert!(sw.take_evictions().is_empty());
}

#[test]
fn stopped_token_bucket_does_not_continue() {
    let mut sw = over_threshold_switch(token_config(DropType::Token));
    sw.stop_timers();
    assert!(!sw.token_tick(GroupId(0), SimTime(150)));
    assert!(sw.take_evictions().is_empty());
    assert!(!sw.abm_tick(PortId(0)));
}

fn head_drop_switch() -> crate::mmu::SharedBufferSwitch {
    let mut cfg = config(10_000);
    cfg.queue_alpha = [0.25; 8];
    cfg.drop_type = DropType::RoundRobinHeadDrop;
    let mut sw = switch(cfg, 1);
    assert!(offer(&mut sw, 0, 0, 0, 1_000));
    assert!(offer(&mut sw, 0, 0, 1, 1_000));
    assert!(!offer(&mut sw, 0, 0, 2, 1_000));
    for q in 1..6 {
        assert!(offer(&mut sw, 0, q, 10 + q as u64, 1_000));
    }
    assert_eq!(sw.groups()[0].account.used_buffer(), 7_000);
    sw
}

#[test]
fn head_drop_evicts_once_per_interval() {
    let mut sw = head_drop_switch();
    // 池缩到刚好装满：所有非空队列都超过阈值
    sw.group_mut(GroupId(0)).account.set_buffer(7_000, 7_000);
    for q in 0..6 {
        assert!(sw.over_threshold(0, q), "queue {q}");
    }

    let (index, _) = sw.dequeue(PortId(0), SimTime::ZERO).expect("dequeue");
    assert_eq!(index, 0);
    let evicted = sw.take_evictions();
    assert_eq!(evicted.len(), 1);
    assert_eq!((evicted[0].index, evicted[0].pkt.id), (0, 0));
    assert_eq!(evicted[0].cause, EvictCause::HeadDrop);
    assert_eq!(sw.groups()[0].last_head_drop, Some(SimTime::ZERO));

    sw.dequeue(PortId(0), SimTime::from_millis(1)).expect("dequeue");
    assert!(sw.take_evictions().is_empty());

    sw.dequeue(PortId(0), SimTime::from_secs(2)).expect("dequeue");
    assert_eq!(sw.take_evictions().len(), 1);
}

#[test]
fn dequeue_method_drop_disables_transmission() {
    let mut cfg = config(10_000);
    cfg.dequeue_method = crate::mmu::DequeueMethod::Drop;
    let mut sw = switch(cfg, 1);
    assert!(offer(&mut sw, 0, 0, 1, 1_000));
    assert!(sw.dequeue(PortId(0), SimTime::ZERO).is_none());
    assert!(sw.start_transmit(PortId(0), SimTime::ZERO).is_none());
    assert_eq!(sw.port(PortId(0)).queue.len(), 1);
}
