//! 端口级的准入状态：ABM 的出队速率、按流计数和 IB 的公平份额控制器。

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::queue::QCNT;
use crate::sim::SimTime;

use super::config::IbConfig;

/// ABM 的每优先级出队速率与拥塞端口数快照。
#[derive(Debug, Clone)]
pub struct AbmMeter {
    armed: bool,
    served: [u64; QCNT],
    rate: [f64; QCNT],
    snapshot: [u32; QCNT],
}

impl Default for AbmMeter {
    fn default() -> Self {
        Self {
            armed: false,
            served: [0; QCNT],
            rate: [1.0; QCNT],
            snapshot: [1; QCNT],
        }
    }
}

impl AbmMeter {
    /// 第一次调用返回 true，由调用方启动周期更新。
    pub fn arm(&mut self) -> bool {
        !std::mem::replace(&mut self.armed, true)
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn record_dequeue(&mut self, priority: usize, bytes: u64) {
        self.served[priority] += bytes;
    }

    /// 归一化出队速率，范围 `[1/QCNT, 1]`。
    pub fn rate(&self, priority: usize) -> f64 {
        self.rate[priority]
    }

    /// 上次更新时的拥塞端口数（至少为 1）。
    pub fn congested(&self, priority: usize) -> u32 {
        self.snapshot[priority]
    }

    /// 用上一周期的出队字节重新计算速率，并记录当前的拥塞端口数。
    ///
    /// 计算结果小于 `1/QCNT` 或大于 1 时都按 1 处理：空闲队列不应被压低阈值。
    pub fn update(&mut self, interval: SimTime, bandwidth_bps: u64, congestion: impl Fn(usize) -> u32) {
        let interval_ns = interval.as_nanos().max(1) as f64;
        for p in 0..QCNT {
            let bps = 8.0 * self.served[p] as f64 / interval_ns * 1e9;
            let mut rate = if bandwidth_bps == 0 {
                1.0
            } else {
                bps / bandwidth_bps as f64
            };
            if rate < 1.0 / QCNT as f64 || rate > 1.0 {
                rate = 1.0;
            }
            self.rate[p] = rate;
            self.snapshot[p] = congestion(p).max(1);
            self.served[p] = 0;
        }
        trace!(rate = ?self.rate, n = ?self.snapshot, "ABM 速率更新");
    }
}

#[derive(Debug, Clone, Copy)]
struct FlowWindow {
    amount: u64,
    last_seen: SimTime,
}

/// 按流累计一个窗口内的数量（字节或包数），流超过窗口未出现即清零。
#[derive(Debug, Clone, Default)]
pub struct FlowMeter {
    flows: HashMap<u64, FlowWindow>,
}

impl FlowMeter {
    /// 把 `amount` 记到 `flow` 上，返回累计后的值。
    pub fn observe(&mut self, flow: u64, amount: u64, now: SimTime, window: SimTime) -> u64 {
        let entry = self.flows.entry(flow).or_insert(FlowWindow {
            amount: 0,
            last_seen: now,
        });
        if now.since(entry.last_seen) > window {
            entry.amount = 0;
        }
        entry.amount += amount;
        entry.last_seen = now;
        entry.amount
    }

    pub fn get(&self, flow: u64) -> u64 {
        self.flows.get(&flow).map_or(0, |f| f.amount)
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}

/// IB 的 AFD 控制器：每个窗口用队列长度的变化调整公平份额 MFair。
#[derive(Debug, Clone)]
pub struct IbController {
    m_fair: [f64; QCNT],
    q_old: [u64; QCNT],
    /// (上一窗口的到达字节, 本窗口的到达字节)
    arrivals: [(u64, u64); QCNT],
    last_change: SimTime,
    rng: StdRng,
}

impl IbController {
    pub fn new(cfg: &IbConfig, port: usize) -> Self {
        Self {
            m_fair: [cfg.mfair_init_bytes; QCNT],
            q_old: [0; QCNT],
            arrivals: [(1, 1); QCNT],
            last_change: SimTime::ZERO,
            rng: StdRng::seed_from_u64(cfg.seed.wrapping_add(port as u64)),
        }
    }

    pub fn m_fair(&self, priority: usize) -> f64 {
        self.m_fair[priority]
    }

    /// 距离上次调整超过一个窗口时推进窗口并更新 MFair；
    /// `queue_bytes(i)` 返回第 i 个子队列当前的字节数。
    pub fn maybe_roll(&mut self, now: SimTime, cfg: &IbConfig, queue_bytes: impl Fn(usize) -> u64) {
        if now <= self.last_change + SimTime::from_nanos(cfg.afd_window_ns) {
            return;
        }
        for slot in self.arrivals.iter_mut() {
            slot.0 = slot.1;
            slot.1 = 1;
        }
        let qref = cfg.qref_bytes as f64;
        for i in 0..QCNT {
            let q_now = queue_bytes(i);
            let next = self.m_fair[i] - cfg.a1 * (q_now as f64 - qref)
                + cfg.a2 * (self.q_old[i] as f64 - qref);
            self.m_fair[i] = next.max(0.0);
            self.q_old[i] = q_now;
        }
        self.last_change = now;
        trace!(m_fair = ?self.m_fair, "AFD 窗口推进");
    }

    /// 记录到达并返回丢弃概率 `1 - min(15·M, MFair) / (15·M)`。
    pub fn drop_probability(&mut self, priority: usize, bytes: u64) -> f64 {
        let slot = &mut self.arrivals[priority];
        slot.1 += bytes;
        if slot.0 == 0 {
            slot.0 = 1;
        }
        let scaled = 15.0 * slot.0 as f64;
        (1.0 - scaled.min(self.m_fair[priority]) / scaled).max(0.0)
    }

    /// 队列足够长时按概率 `p` 提前丢弃。
    pub fn early_drop(&mut self, p: f64, queue_bytes: u64, floor: u64) -> bool {
        let x: f64 = self.rng.r#gen();
        x < p && queue_bytes > floor
    }
}
