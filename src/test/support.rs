use crate::mmu::{EnqueueOutcome, MmuConfig, PortSpec, SharedBufferSwitch};
use crate::net::{Packet, PortId};
use crate::sim::SimTime;

pub const TEN_GBPS: u64 = 10_000_000_000;

pub fn config(max_buffer_bytes: u64) -> MmuConfig {
    MmuConfig {
        max_buffer_bytes,
        ..MmuConfig::default()
    }
}

pub fn switch(cfg: MmuConfig, ports: usize) -> SharedBufferSwitch {
    let specs = vec![PortSpec::new(TEN_GBPS, 1_000); ports];
    SharedBufferSwitch::new(cfg, &specs).expect("valid switch config")
}

pub fn pkt(id: u64, size: u32) -> Packet {
    Packet::new(id, id, size)
}

/// 入队并返回是否被接纳。
pub fn offer(sw: &mut SharedBufferSwitch, port: usize, index: usize, id: u64, size: u32) -> bool {
    sw.enqueue(PortId(port), pkt(id, size), index, SimTime::ZERO)
        .is_queued()
}

pub fn admitted_index(outcome: &EnqueueOutcome) -> Option<usize> {
    match outcome {
        EnqueueOutcome::Queued { index, .. } => Some(*index),
        EnqueueOutcome::Dropped { .. } => None,
    }
}

/// 组内所有子队列的共享占用之和。
pub fn shared_occupancy(sw: &SharedBufferSwitch, group: usize) -> u64 {
    let g = &sw.groups()[group];
    g.ports
        .clone()
        .map(|p| {
            let port = &sw.ports()[p];
            (0..port.queue.active()).map(|i| port.occupancy(i)).sum::<u64>()
        })
        .sum()
}
