use serde::Serialize;

use crate::mmu::{AdmissionPolicy, DropReason, EvictCause, QueueSnapshot};
use crate::queue::SchedulerKind;

/// 遥测事件类型
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TelemetryKind {
    /// 交换机元信息（作为 t=0 的第一条事件）
    Meta {
        ports: Vec<TelemetryPortInfo>,
        groups: usize,
        max_buffer_bytes: u64,
        policy: AdmissionPolicy,
        scheduler: SchedulerKind,
    },
    /// 包被接纳进子队列
    Enqueue {
        port: usize,
        subqueue: usize,
        ecn_marked: bool,
        from_static: bool,
        #[serde(flatten)]
        queue: QueueSnapshot,
    },
    /// 准入拒绝
    Drop {
        port: usize,
        subqueue: usize,
        reason: DropReason,
        #[serde(flatten)]
        queue: QueueSnapshot,
    },
    /// 出队并开始发送
    Dequeue {
        port: usize,
        subqueue: usize,
        depart_ns: u64,
        #[serde(flatten)]
        queue: QueueSnapshot,
    },
    /// 已接纳的包被驱逐
    Evict {
        port: usize,
        subqueue: usize,
        cause: EvictCause,
    },
    /// 丢包时各缓冲组的使用率与累计发送字节
    Loss {
        group: usize,
        usage: Vec<f64>,
        sent_bytes: Vec<u64>,
    },
    /// 端口在一个采样窗口内的吞吐
    Throughput {
        port: usize,
        bytes: u64,
        window_ns: u64,
        gbps: f64,
    },
    /// 包离开出端口链路
    Delivered { port: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct TelemetryPortInfo {
    pub id: usize,
    pub group: usize,
    pub bandwidth_bps: u64,
    pub latency_ns: u64,
    pub active_queues: usize,
}

/// 一条遥测记录（JSON）
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryEvent {
    /// 仿真时间（纳秒，和 `SimTime.0` 同口径）
    pub t_ns: u64,
    pub pkt_id: Option<u64>,
    pub flow_id: Option<u64>,
    pub pkt_bytes: Option<u32>,
    #[serde(flatten)]
    pub kind: TelemetryKind,
}

impl TelemetryEvent {
    /// 入队/出队这类逐包的队列记录，受采样频率控制。
    pub fn is_queue_record(&self) -> bool {
        matches!(
            self.kind,
            TelemetryKind::Enqueue { .. } | TelemetryKind::Dequeue { .. }
        )
    }
}

/// 内存中的事件收集器，仿真结束时整体写成 JSON。
#[derive(Debug)]
pub struct TelemetryLog {
    pub events: Vec<TelemetryEvent>,
    sample_every: u64,
    queue_records_seen: u64,
}

impl Default for TelemetryLog {
    fn default() -> Self {
        Self::new(1)
    }
}

impl TelemetryLog {
    /// `sample_every` 为 N 时每 N 条队列记录保留一条；0 按 1 处理。
    pub fn new(sample_every: u64) -> Self {
        Self {
            events: Vec::new(),
            sample_every: sample_every.max(1),
            queue_records_seen: 0,
        }
    }

    pub fn push(&mut self, ev: TelemetryEvent) {
        if ev.is_queue_record() {
            let n = self.queue_records_seen;
            self.queue_records_seen += 1;
            if n % self.sample_every != 0 {
                return;
            }
        }
        self.events.push(ev);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
