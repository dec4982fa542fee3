//! 准入策略
//!
//! 每种入队方式在配置时确定为 `AdmissionPolicy` 的一个变体；
//! 所有策略共享同一套计费与阈值接口。

use serde::Serialize;
use tracing::trace;

use crate::net::{Packet, PortId};
use crate::queue::{QCNT, Scheduler};
use crate::sim::SimTime;

use super::config::EnqueueMethod;
use super::switch::{EvictCause, SharedBufferSwitch, TimerRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionPolicy {
    CompleteSharing,
    DynamicThreshold,
    MultiLayerDynamicThreshold,
    PushOut,
    ActiveBufferManagement,
    FlowAwareBuffer,
    IntelligentBuffer,
}

impl From<EnqueueMethod> for AdmissionPolicy {
    fn from(m: EnqueueMethod) -> Self {
        match m {
            EnqueueMethod::Normal | EnqueueMethod::CompleteSharing => AdmissionPolicy::CompleteSharing,
            EnqueueMethod::DynamicThreshold => AdmissionPolicy::DynamicThreshold,
            EnqueueMethod::MultiLayerDynamicThreshold => AdmissionPolicy::MultiLayerDynamicThreshold,
            EnqueueMethod::PushOut => AdmissionPolicy::PushOut,
            EnqueueMethod::ActiveBufferManagement => AdmissionPolicy::ActiveBufferManagement,
            EnqueueMethod::FlowAwareBuffer => AdmissionPolicy::FlowAwareBuffer,
            EnqueueMethod::IntelligentBuffer => AdmissionPolicy::IntelligentBuffer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// 共享池剩余空间不够。
    BufferFull,
    /// 子队列占用会超过阈值。
    OverThreshold,
    /// push-out 找不到可驱逐的包。
    NoVictim,
    /// IB 的概率提前丢弃。
    EarlyDrop,
    InvalidQueue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// 接纳到 `index` 号子队列（IB 可能把短流改放到 0 号）。
    Admit { index: usize },
    Drop(DropReason),
}

type Admission = Result<usize, DropReason>;

impl SharedBufferSwitch {
    /// 对一个不走静态预留的到达做准入判断。接纳时调用方负责入队和计费。
    pub(crate) fn admit(&mut self, port: usize, pkt: &Packet, index: usize, now: SimTime) -> Verdict {
        let size = pkt.bytes();
        let result = match self.policy() {
            AdmissionPolicy::CompleteSharing => self.complete_sharing(port, index, size),
            AdmissionPolicy::DynamicThreshold => self.dynamic_threshold(port, index, size),
            AdmissionPolicy::MultiLayerDynamicThreshold => self.multi_layer(port, index, size),
            AdmissionPolicy::PushOut => self.push_out(port, index, size, now),
            AdmissionPolicy::ActiveBufferManagement => self.active_buffer(port, pkt, index),
            AdmissionPolicy::FlowAwareBuffer => self.flow_aware(port, pkt, index, now),
            AdmissionPolicy::IntelligentBuffer => self.intelligent(port, pkt, index, now),
        };
        let verdict = match result {
            Ok(index) => Verdict::Admit { index },
            Err(reason) => Verdict::Drop(reason),
        };
        trace!(port, index, size, ?verdict, "准入判断");
        verdict
    }

    fn remaining(&self, port: usize) -> u64 {
        self.groups[self.ports[port].group.0].account.remaining()
    }

    fn complete_sharing(&self, port: usize, index: usize, size: u64) -> Admission {
        if self.remaining(port) < size {
            return Err(DropReason::BufferFull);
        }
        Ok(index)
    }

    /// 动态阈值：放得下，且入队后子队列占用不超过 `alpha × 剩余空间`。
    fn dynamic_threshold(&self, port: usize, index: usize, size: u64) -> Admission {
        self.complete_sharing(port, index, size)?;
        let threshold = self.port_threshold(PortId(port), index) as u64;
        if self.ports[port].occupancy(index) + size > threshold {
            return Err(DropReason::OverThreshold);
        }
        Ok(index)
    }

    /// 多层动态阈值：空队列总能进一个包；首次调用时启动令牌补充。
    fn multi_layer(&mut self, port: usize, index: usize, size: u64) -> Admission {
        let gid = self.ports[port].group;
        let bandwidth = self.ports[port].spec.bandwidth_bps;
        let k = self.config().ports_per_group;
        if let Some(after) = self.groups[gid.0].tokens.arm(bandwidth, k) {
            self.request_timer(TimerRequest::TokenRefill { group: gid, after });
        }
        self.complete_sharing(port, index, size)?;
        let occ = self.ports[port].occupancy(index);
        let threshold = self.port_threshold(PortId(port), index) as u64;
        if occ != 0 && occ + size > threshold {
            return Err(DropReason::OverThreshold);
        }
        Ok(index)
    }

    /// 共享池不够时，从组内最长子队列驱逐，直到放得下或找不到受害者。
    fn push_out(&mut self, port: usize, index: usize, size: u64, now: SimTime) -> Admission {
        let gid = self.ports[port].group.0;
        while self.groups[gid].account.used_buffer() + size > self.groups[gid].account.max_buffer() {
            if self.push_out_one(port, index, now).is_none() {
                return Err(DropReason::NoVictim);
            }
        }
        Ok(index)
    }

    /// ABM：阈值按出队速率和同优先级拥塞端口数缩放。
    fn active_buffer(&mut self, port: usize, pkt: &Packet, index: usize) -> Admission {
        if self.ports[port].abm.arm() {
            self.refresh_abm(port);
            let after = SimTime::from_nanos(self.config().abm.update_interval_ns);
            self.request_timer(TimerRequest::AbmUpdate {
                port: PortId(port),
                after,
            });
        }
        self.update_saturation(port, index);

        let size = pkt.bytes();
        let alpha = match self.config().abm.alpha_unsched {
            Some(a) if pkt.unsched => a,
            _ => self.groups[self.ports[port].group.0].account.queue_alpha(index),
        };
        let threshold = self.threshold_with_alpha(port, index, alpha) as u64;
        if self.ports[port].occupancy(index) + size > threshold {
            return Err(DropReason::OverThreshold);
        }
        self.complete_sharing(port, index, size)
    }

    /// FAB：窗口内发送量少的流使用特权 alpha。
    fn flow_aware(&mut self, port: usize, pkt: &Packet, index: usize, now: SimTime) -> Admission {
        let size = pkt.bytes();
        let fab = &self.config().fab;
        let window = SimTime::from_nanos(fab.window_ns);
        let (limit, privileged) = (fab.threshold_bytes, fab.privileged_alpha);
        let sent = self.ports[port].flows.observe(pkt.flow_id, size, now, window);
        let account = &self.groups[self.ports[port].group.0].account;
        let alpha = if sent < limit {
            privileged
        } else {
            account.queue_alpha(index)
        };
        let threshold = account.threshold_with_alpha(alpha) as u64;
        if self.ports[port].occupancy(index) + size > threshold {
            return Err(DropReason::OverThreshold);
        }
        self.complete_sharing(port, index, size)
    }

    /// IB：短流改放 0 号子队列只做动态阈值检查，其余流再经过 AFD 概率丢弃。
    fn intelligent(&mut self, port: usize, pkt: &Packet, index: usize, now: SimTime) -> Admission {
        let size = pkt.bytes();
        let ib = self.config().ib.clone();
        let p = &mut self.ports[port];
        let q_now: [u64; QCNT] = std::array::from_fn(|i| p.queue.bytes(i));
        p.ib.maybe_roll(now, &ib, |i| q_now[i]);
        let pkts = p
            .flows
            .observe(pkt.flow_id, 1, now, SimTime::from_nanos(ib.dpp_window_ns));

        if ib.enable_dpp && pkts < ib.dpp_threshold_pkts {
            return self.dynamic_threshold(port, 0, size);
        }

        let p = &mut self.ports[port];
        let drop_p = p.ib.drop_probability(index, size);
        let q_bytes = p.queue.bytes(index);
        self.dynamic_threshold(port, index, size)?;
        if self.ports[port]
            .ib
            .early_drop(drop_p, q_bytes, ib.early_drop_floor_bytes)
        {
            return Err(DropReason::EarlyDrop);
        }
        Ok(index)
    }

    /// 驱逐组内最长的子队列（长度相同时取后扫描到的）一个包。
    ///
    /// 严格优先级调度下不驱逐比到达包优先级更高的队列；最长队列不超过
    /// 静态预留时也不驱逐。
    pub(crate) fn push_out_one(&mut self, port: usize, index: usize, now: SimTime) -> Option<u64> {
        let (victim_port, victim_index, longest) = self.longest_in_group(port);
        let strict = matches!(
            self.ports[port].queue.scheduler(),
            Scheduler::StrictPriority
        );
        if strict && victim_index < index {
            trace!(victim_index, index, "不驱逐更高优先级的队列");
            return None;
        }
        if longest <= self.config().static_buffer_bytes {
            return None;
        }
        self.evict(victim_port, victim_index, EvictCause::PushOut, now)
    }

    /// 组内最长的子队列：(端口, 下标, 字节数)。
    pub(crate) fn longest_in_group(&self, port: usize) -> (usize, usize, u64) {
        let range = self.groups[self.ports[port].group.0].ports.clone();
        let mut best = (port, 0, 0);
        for p in range {
            let q = &self.ports[p].queue;
            for i in 0..q.active() {
                let len = q.bytes(i);
                if len >= best.2 {
                    best = (p, i, len);
                }
            }
        }
        best
    }
}
