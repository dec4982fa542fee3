//! 多队列调度策略
//!
//! 调度器在配置时确定为一个具体变体，之后每次出队只做一次 `match`。
//! 所有变体都只在活跃子队列（`queues` 切片）之间选择。

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::net::Packet;

use super::Subqueue;
use super::multi::QCNT;

/// 配置层面的调度方式名称。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum SchedulerKind {
    #[default]
    RoundRobin,
    DeficitRoundRobin,
    /// 保留的名字，没有实现；配置校验会拒绝它。
    WeightedRoundRobin,
    StrictPriority,
    HybridPriorityDrr,
}

/// DRR 的亏空计数器。
#[derive(Debug, Clone)]
pub struct Deficits {
    quantum: i64,
    counters: [i64; QCNT],
    /// 仅混合调度使用：上一次由 DRR 服务的队列（从 2 开始）。
    cursor: usize,
}

impl Deficits {
    pub fn new(quantum: u32) -> Self {
        Self {
            quantum: quantum as i64,
            counters: [0; QCNT],
            cursor: 2,
        }
    }

    pub fn quantum(&self) -> i64 {
        self.quantum
    }

    pub fn counter(&self, index: usize) -> i64 {
        self.counters[index]
    }

    /// 从 `start` 开始循环扫描 `n + 1` 次，首次访问不加 quantum；
    /// `eligible` 过滤掉不参与 DRR 的下标。
    fn serve(
        &mut self,
        queues: &mut [Subqueue],
        start: usize,
        eligible: impl Fn(usize) -> bool,
    ) -> Option<(usize, Packet)> {
        let n = queues.len();
        for i in 0..=n {
            let idx = (start + i) % n;
            if !eligible(idx) {
                continue;
            }
            if i != 0 {
                self.counters[idx] += self.quantum;
            }
            if self.counters[idx] <= 0 {
                continue;
            }
            match queues[idx].pop() {
                Some(pkt) => {
                    self.counters[idx] -= pkt.bytes() as i64;
                    return Some((idx, pkt));
                }
                None => self.counters[idx] = 0,
            }
        }
        None
    }
}

#[derive(Debug, Clone)]
pub enum Scheduler {
    /// 从上次服务的下一个队列开始循环查找第一个非空队列。
    RoundRobin,
    DeficitRoundRobin(Deficits),
    /// 下标越小优先级越高。高优先级持续有流量时低优先级会被饿死，这是预期行为。
    StrictPriority,
    /// 0、1 号队列严格优先，其余队列在二者都为空时按 DRR 轮转。
    HybridPriorityDrr(Deficits),
}

impl Scheduler {
    /// WRR 没有实现，返回 `None`。
    pub fn new(kind: SchedulerKind, quantum: u32) -> Option<Self> {
        match kind {
            SchedulerKind::RoundRobin => Some(Scheduler::RoundRobin),
            SchedulerKind::DeficitRoundRobin => {
                Some(Scheduler::DeficitRoundRobin(Deficits::new(quantum)))
            }
            SchedulerKind::WeightedRoundRobin => None,
            SchedulerKind::StrictPriority => Some(Scheduler::StrictPriority),
            SchedulerKind::HybridPriorityDrr => {
                Some(Scheduler::HybridPriorityDrr(Deficits::new(quantum)))
            }
        }
    }

    pub fn kind(&self) -> SchedulerKind {
        match self {
            Scheduler::RoundRobin => SchedulerKind::RoundRobin,
            Scheduler::DeficitRoundRobin(_) => SchedulerKind::DeficitRoundRobin,
            Scheduler::StrictPriority => SchedulerKind::StrictPriority,
            Scheduler::HybridPriorityDrr(_) => SchedulerKind::HybridPriorityDrr,
        }
    }

    pub fn deficits(&self) -> Option<&Deficits> {
        match self {
            Scheduler::DeficitRoundRobin(d) | Scheduler::HybridPriorityDrr(d) => Some(d),
            _ => None,
        }
    }

    /// 选出下一个要发送的包。`last` 是上一次出队的下标，成功时被更新。
    pub(crate) fn dequeue(
        &mut self,
        queues: &mut [Subqueue],
        last: &mut usize,
    ) -> Option<(usize, Packet)> {
        let n = queues.len();
        if n == 0 {
            return None;
        }
        let picked = match self {
            Scheduler::RoundRobin => (1..=n).find_map(|i| {
                let idx = (*last + i) % n;
                queues[idx].pop().map(|pkt| (idx, pkt))
            }),
            Scheduler::StrictPriority => {
                (0..n).find_map(|idx| queues[idx].pop().map(|pkt| (idx, pkt)))
            }
            Scheduler::DeficitRoundRobin(d) => d.serve(queues, *last, |_| true),
            Scheduler::HybridPriorityDrr(d) => {
                let strict = (0..n.min(2)).find_map(|idx| queues[idx].pop().map(|pkt| (idx, pkt)));
                match strict {
                    Some(hit) => Some(hit),
                    None => {
                        let start = d.cursor;
                        let hit = d.serve(queues, start, |idx| idx >= 2);
                        if let Some((idx, _)) = &hit {
                            d.cursor = *idx;
                        }
                        hit
                    }
                }
            }
        };
        if let Some((idx, _)) = &picked {
            *last = *idx;
        }
        picked
    }
}
