//! 交换机出端口
//!
//! 端口拥有自己的多队列、发送状态机、静态预留计数和端口级准入状态；
//! 共享池计费在所属缓冲组里。

use serde::Serialize;

use crate::net::{GroupId, PortId};
use crate::queue::{MultiQueue, QCNT, Scheduler};
use crate::sim::SimTime;

use super::config::MmuConfig;
use super::meters::{AbmMeter, FlowMeter, IbController};

/// 端口的物理参数。
#[derive(Debug, Clone, Copy, Serialize, serde::Deserialize)]
pub struct PortSpec {
    pub bandwidth_bps: u64,
    #[serde(default)]
    pub latency_ns: u64,
}

impl PortSpec {
    pub fn new(bandwidth_bps: u64, latency_ns: u64) -> Self {
        Self {
            bandwidth_bps,
            latency_ns,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Ready,
    Busy,
}

/// 端口级计数器。
#[derive(Debug, Clone, Default, Serialize)]
pub struct PortStats {
    pub enqueued_pkts: u64,
    pub enqueued_bytes: u64,
    pub static_pkts: u64,
    pub dropped_pkts: u64,
    pub dropped_bytes: u64,
    pub ecn_marked: u64,
    pub sent_pkts: u64,
    pub sent_bytes: u64,
    /// 被驱逐（push-out、head-drop、令牌驱逐）的包。
    pub evicted_pkts: u64,
    pub evicted_bytes: u64,
}

#[derive(Debug)]
pub struct Port {
    pub id: PortId,
    pub group: GroupId,
    pub spec: PortSpec,
    pub queue: MultiQueue,
    tx: TxState,
    used_static: [u64; QCNT],
    pub(crate) abm: AbmMeter,
    pub(crate) flows: FlowMeter,
    pub(crate) ib: IbController,
    pub(crate) head_drop_cursor: usize,
    pub stats: PortStats,
}

impl Port {
    pub(crate) fn new(id: PortId, group: GroupId, spec: PortSpec, cfg: &MmuConfig, scheduler: Scheduler) -> Self {
        Self {
            id,
            group,
            spec,
            queue: MultiQueue::new(cfg.active_queues, scheduler),
            tx: TxState::Ready,
            used_static: [0; QCNT],
            abm: AbmMeter::default(),
            flows: FlowMeter::default(),
            ib: IbController::new(&cfg.ib, id.0),
            head_drop_cursor: 0,
            stats: PortStats::default(),
        }
    }

    pub fn tx_state(&self) -> TxState {
        self.tx
    }

    pub fn is_ready(&self) -> bool {
        self.tx == TxState::Ready
    }

    pub(crate) fn set_busy(&mut self) {
        debug_assert_eq!(self.tx, TxState::Ready, "port {:?} already transmitting", self.id);
        self.tx = TxState::Busy;
    }

    pub(crate) fn set_ready(&mut self) {
        self.tx = TxState::Ready;
    }

    pub fn tx_time(&self, bytes: u64) -> SimTime {
        SimTime::tx_time(bytes, self.spec.bandwidth_bps)
    }

    pub fn latency(&self) -> SimTime {
        SimTime::from_nanos(self.spec.latency_ns)
    }

    /// 子队列当前占用的静态预留字节。
    pub fn used_static(&self, index: usize) -> u64 {
        self.used_static[index]
    }

    /// 子队列在共享池中的占用：排队字节减去静态部分。
    pub fn occupancy(&self, index: usize) -> u64 {
        self.queue.bytes(index).saturating_sub(self.used_static[index])
    }

    pub(crate) fn charge_static(&mut self, index: usize, size: u64) {
        self.used_static[index] += size;
    }

    /// 包离开子队列后拆分静态与共享两部分并归还静态部分，返回共享部分。
    ///
    /// 调用时包已经出队，`queue.bytes(index)` 是剩余字节。剩余的包最多需要
    /// 的静态字节是 `min(S, 剩余字节)`，多出来的静态计数才随这个包释放。
    pub(crate) fn release(&mut self, index: usize, size: u64) -> u64 {
        let remaining = self.queue.bytes(index);
        let keep = self.used_static[index].min(remaining);
        let static_part = (self.used_static[index] - keep).min(size);
        self.used_static[index] -= static_part;
        size - static_part
    }
}
