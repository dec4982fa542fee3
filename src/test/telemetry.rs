use crate::mmu::{DropReason, QueueSnapshot};
use crate::telemetry::{TelemetryEvent, TelemetryKind, TelemetryLog};

fn snapshot() -> QueueSnapshot {
    QueueSnapshot {
        q_bytes: 3000,
        occupancy: 1500,
        threshold: 4000,
        priority: 2,
        priority_bytes: 1500,
        priority_threshold: 40_000,
    }
}

fn enqueue_event(t_ns: u64) -> TelemetryEvent {
    TelemetryEvent {
        t_ns,
        pkt_id: Some(t_ns),
        flow_id: Some(1),
        pkt_bytes: Some(1500),
        kind: TelemetryKind::Enqueue {
            port: 0,
            subqueue: 2,
            ecn_marked: false,
            from_static: false,
            queue: snapshot(),
        },
    }
}

#[test]
fn queue_records_are_sampled_but_losses_are_not() {
    let mut log = TelemetryLog::new(3);
    for t in 0..6 {
        log.push(enqueue_event(t));
    }
    log.push(TelemetryEvent {
        t_ns: 6,
        pkt_id: None,
        flow_id: None,
        pkt_bytes: None,
        kind: TelemetryKind::Loss {
            group: 0,
            usage: vec![1.0],
            sent_bytes: vec![0],
        },
    });
    let times: Vec<u64> = log.events.iter().map(|e| e.t_ns).collect();
    assert_eq!(times, vec![0, 3, 6]);
}

#[test]
fn events_serialise_flat_with_kind_tag() {
    let v = serde_json::to_value(enqueue_event(42)).expect("serialize");
    assert_eq!(v["kind"], "enqueue");
    assert_eq!(v["t_ns"], 42);
    assert_eq!(v["subqueue"], 2);
    assert_eq!(v["q_bytes"], 3000);
    assert_eq!(v["threshold"], 4000);

    let drop = TelemetryEvent {
        t_ns: 1,
        pkt_id: Some(1),
        flow_id: Some(1),
        pkt_bytes: Some(100),
        kind: TelemetryKind::Drop {
            port: 3,
            subqueue: 0,
            reason: DropReason::OverThreshold,
            queue: snapshot(),
        },
    };
    let v = serde_json::to_value(drop).expect("serialize");
    assert_eq!(v["kind"], "drop");
    assert_eq!(v["reason"], "over_threshold");
    assert_eq!(v["port"], 3);
}
