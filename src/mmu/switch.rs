//! 共享缓冲交换机
//!
//! 所有端口和缓冲组放在两个扁平数组里，用 `PortId` / `GroupId` 互相引用。
//! 交换机不持有仿真器：需要调度的周期任务和发生过的驱逐先记在这里，
//! 由外层（`crate::net::Network`）取走后处理。

use std::ops::Range;

use serde::Serialize;
use tracing::{debug, info, trace};

use crate::net::{GroupId, Packet, PortId};
use crate::queue::{QueueEnd, Scheduler};
use crate::sim::SimTime;

use super::account::{BufferAccount, THRESHOLD_CAP, clamp_threshold};
use super::admission::{AdmissionPolicy, DropReason, Verdict};
use super::config::{ConfigError, DequeueMethod, DropType, MmuConfig};
use super::port::{Port, PortSpec};
use super::tokens::TokenBucket;

/// 共用一个共享池的一组端口。
#[derive(Debug)]
pub struct BufferGroup {
    pub id: GroupId,
    pub ports: Range<usize>,
    pub account: BufferAccount,
    pub tokens: TokenBucket,
    /// 令牌驱逐的轮询位置 (端口, 子队列)。
    pub(crate) evict_cursor: (usize, usize),
    pub(crate) last_head_drop: Option<SimTime>,
}

/// 需要外层调度的周期任务。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerRequest {
    TokenRefill { group: GroupId, after: SimTime },
    AbmUpdate { port: PortId, after: SimTime },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictCause {
    PushOut,
    HeadDrop,
    Token,
    LongToken,
}

/// 一次驱逐：被移出的包以及它原来所在的位置。
#[derive(Debug, Clone)]
pub struct Eviction {
    pub at: SimTime,
    pub port: PortId,
    pub index: usize,
    pub cause: EvictCause,
    pub pkt: Packet,
}

#[derive(Debug)]
pub enum EnqueueOutcome {
    Queued {
        index: usize,
        ecn_marked: bool,
        from_static: bool,
    },
    Dropped {
        index: usize,
        reason: DropReason,
        pkt: Packet,
    },
}

impl EnqueueOutcome {
    pub fn is_queued(&self) -> bool {
        matches!(self, EnqueueOutcome::Queued { .. })
    }
}

/// 某个子队列的瞬时状态，用于遥测记录。
#[derive(Debug, Clone, Copy, Serialize)]
pub struct QueueSnapshot {
    pub q_bytes: u64,
    pub occupancy: u64,
    pub threshold: u32,
    pub priority: usize,
    pub priority_bytes: u64,
    pub priority_threshold: u64,
}

#[derive(Debug)]
pub struct SharedBufferSwitch {
    cfg: MmuConfig,
    policy: AdmissionPolicy,
    pub(crate) ports: Vec<Port>,
    pub(crate) groups: Vec<BufferGroup>,
    timers: Vec<TimerRequest>,
    evictions: Vec<Eviction>,
    timers_stopped: bool,
}

impl SharedBufferSwitch {
    pub fn new(cfg: MmuConfig, specs: &[PortSpec]) -> Result<Self, ConfigError> {
        cfg.validate()?;
        if specs.is_empty() {
            return Err(ConfigError::NoPorts);
        }
        if let Some(port) = specs.iter().position(|s| s.bandwidth_bps == 0) {
            return Err(ConfigError::ZeroBandwidth { port });
        }
        let k = cfg.ports_per_group;
        let n_groups = specs.len().div_ceil(k);
        let groups = (0..n_groups)
            .map(|g| {
                let ports = g * k..((g + 1) * k).min(specs.len());
                BufferGroup {
                    id: GroupId(g),
                    account: BufferAccount::new(&cfg, ports.len()),
                    tokens: TokenBucket::new(&cfg.tokens),
                    evict_cursor: (ports.start, 0),
                    last_head_drop: None,
                    ports,
                }
            })
            .collect();
        let mut ports = Vec::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            let scheduler =
                Scheduler::new(cfg.scheduler, cfg.drr_quantum).ok_or(ConfigError::UnsupportedScheduler)?;
            ports.push(Port::new(PortId(i), GroupId(i / k), *spec, &cfg, scheduler));
        }
        let policy = AdmissionPolicy::from(cfg.enqueue_method);
        info!(
            ports = specs.len(),
            groups = n_groups,
            max_buffer = cfg.max_buffer_bytes,
            ?policy,
            scheduler = ?cfg.scheduler,
            "🧱 创建共享缓冲交换机"
        );
        Ok(Self {
            cfg,
            policy,
            ports,
            groups,
            timers: Vec::new(),
            evictions: Vec::new(),
            timers_stopped: false,
        })
    }

    pub fn config(&self) -> &MmuConfig {
        &self.cfg
    }

    pub fn policy(&self) -> AdmissionPolicy {
        self.policy
    }

    pub fn num_ports(&self) -> usize {
        self.ports.len()
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn port(&self, id: PortId) -> &Port {
        &self.ports[id.0]
    }

    pub fn groups(&self) -> &[BufferGroup] {
        &self.groups
    }

    pub fn group(&self, id: GroupId) -> &BufferGroup {
        &self.groups[id.0]
    }

    pub fn group_mut(&mut self, id: GroupId) -> &mut BufferGroup {
        &mut self.groups[id.0]
    }

    pub fn group_of(&self, port: PortId) -> GroupId {
        self.ports[port.0].group
    }

    /// 与 `port` 共用共享池的所有端口（含自身）。
    pub fn siblings(&self, port: PortId) -> Range<usize> {
        self.groups[self.group_of(port).0].ports.clone()
    }

    pub fn priority_of(&self, port: PortId, index: usize) -> usize {
        self.groups[self.group_of(port).0].account.priority_of(index)
    }

    /// 端口上子队列的当前阈值。ABM 在动态阈值基础上按出队速率和拥塞端口数缩放。
    pub fn port_threshold(&self, port: PortId, index: usize) -> u32 {
        let alpha = self.groups[self.group_of(port).0].account.queue_alpha(index);
        self.threshold_with_alpha(port.0, index, alpha)
    }

    pub(crate) fn threshold_with_alpha(&self, port: usize, index: usize, alpha: f64) -> u32 {
        let p = &self.ports[port];
        let account = &self.groups[p.group.0].account;
        match self.policy {
            AdmissionPolicy::ActiveBufferManagement => {
                let prio = account.priority_of(index);
                let raw = alpha * account.remaining() as f64 / p.abm.congested(prio) as f64
                    * p.abm.rate(prio);
                if raw > u32::MAX as f64 {
                    THRESHOLD_CAP
                } else {
                    clamp_threshold(raw)
                }
            }
            _ => account.threshold_with_alpha(alpha),
        }
    }

    pub fn queue_snapshot(&self, port: PortId, index: usize) -> QueueSnapshot {
        let p = &self.ports[port.0];
        let account = &self.groups[p.group.0].account;
        QueueSnapshot {
            q_bytes: p.queue.bytes(index),
            occupancy: p.occupancy(index),
            threshold: self.port_threshold(port, index),
            priority: account.priority_of(index),
            priority_bytes: account.priority_used(index),
            priority_threshold: account.priority_threshold(index),
        }
    }

    pub fn take_timer_requests(&mut self) -> Vec<TimerRequest> {
        std::mem::take(&mut self.timers)
    }

    pub fn take_evictions(&mut self) -> Vec<Eviction> {
        std::mem::take(&mut self.evictions)
    }

    pub(crate) fn request_timer(&mut self, req: TimerRequest) {
        if !self.timers_stopped {
            self.timers.push(req);
        }
    }

    /// 把包放入端口的第 `index` 个子队列。
    ///
    /// 先做 ECN 判断，再看静态预留是否够用，不够时交给准入策略。
    #[tracing::instrument(skip(self, pkt), fields(pkt_id = pkt.id, size = pkt.size_bytes))]
    pub fn enqueue(&mut self, port: PortId, mut pkt: Packet, index: usize, now: SimTime) -> EnqueueOutcome {
        let size = pkt.bytes();
        if !self.ports[port.0].queue.in_range(index) {
            debug!(index, "子队列下标越界，丢弃");
            return self.drop_packet(port, index, DropReason::InvalidQueue, pkt);
        }

        let gid = self.group_of(port);
        let mut ecn_marked = false;
        if let Some(limit) = self.groups[gid.0].account.ecn_threshold() {
            let occ = self.ports[port.0].occupancy(index) + size;
            if occ > limit {
                ecn_marked = pkt.mark_ce_if_ect();
                trace!(occ, limit, ecn_marked, "超过 ECN 门限");
            }
        }

        let static_buffer = self.cfg.static_buffer_bytes;
        let p = &mut self.ports[port.0];
        if p.used_static(index) + size <= static_buffer {
            p.charge_static(index, size);
            p.stats.static_pkts += 1;
            return self.accept(port, index, pkt, ecn_marked, true);
        }

        match self.admit(port.0, &pkt, index, now) {
            Verdict::Admit { index: target } => {
                self.groups[gid.0].account.add_used(size, target);
                self.accept(port, target, pkt, ecn_marked, false)
            }
            Verdict::Drop(reason) => self.drop_packet(port, index, reason, pkt),
        }
    }

    fn accept(
        &mut self,
        port: PortId,
        index: usize,
        pkt: Packet,
        ecn_marked: bool,
        from_static: bool,
    ) -> EnqueueOutcome {
        let size = pkt.bytes();
        let p = &mut self.ports[port.0];
        if p.queue.enqueue(pkt, index).is_err() {
            // admit 只会返回活跃范围内的下标
            unreachable!("admitted into inactive subqueue {index}");
        }
        p.stats.enqueued_pkts += 1;
        p.stats.enqueued_bytes += size;
        if ecn_marked {
            p.stats.ecn_marked += 1;
        }
        trace!(?port, index, from_static, q_bytes = p.queue.bytes(index), "入队成功");
        EnqueueOutcome::Queued {
            index,
            ecn_marked,
            from_static,
        }
    }

    fn drop_packet(&mut self, port: PortId, index: usize, reason: DropReason, pkt: Packet) -> EnqueueOutcome {
        let p = &mut self.ports[port.0];
        p.stats.dropped_pkts += 1;
        p.stats.dropped_bytes += pkt.bytes();
        debug!(?port, index, ?reason, pkt_id = pkt.id, "🗑️ 丢弃数据包");
        EnqueueOutcome::Dropped { index, reason, pkt }
    }

    /// 包离开子队列后的计费：归还静态或共享部分，MLDT 下扣令牌。
    pub(crate) fn release(&mut self, port: usize, index: usize, size: u64) {
        let gid = self.ports[port].group.0;
        let shared = self.ports[port].release(index, size);
        if shared > 0 {
            let group = &mut self.groups[gid];
            group.account.delete_used(shared, index);
            if self.policy == AdmissionPolicy::MultiLayerDynamicThreshold {
                group.tokens.debit(shared);
            }
        }
    }

    /// 按调度器取出下一个要发送的包并完成计费，不改变发送状态。
    ///
    /// `DequeueMethod::Drop` 下永远返回 `None`。
    pub fn dequeue(&mut self, port: PortId, now: SimTime) -> Option<(usize, Packet)> {
        if self.cfg.dequeue_method == DequeueMethod::Drop {
            return None;
        }
        if self.cfg.drop_type == DropType::RoundRobinHeadDrop {
            self.head_drop_check(port.0, now);
        }
        let (index, pkt) = self.ports[port.0].queue.dequeue()?;
        let size = pkt.bytes();
        self.release(port.0, index, size);
        self.update_saturation(port.0, index);

        let p = &mut self.ports[port.0];
        let gid = p.group.0;
        let prio = self.groups[gid].account.priority_of(index);
        p.abm.record_dequeue(prio, size);
        p.stats.sent_pkts += 1;
        p.stats.sent_bytes += size;
        trace!(?port, index, pkt_id = pkt.id, "出队");
        Some((index, pkt))
    }

    /// 端口空闲时出队并转入 Busy；返回要发送的包。
    pub fn start_transmit(&mut self, port: PortId, now: SimTime) -> Option<(usize, Packet)> {
        if !self.ports[port.0].is_ready() {
            return None;
        }
        let picked = self.dequeue(port, now)?;
        self.ports[port.0].set_busy();
        Some(picked)
    }

    pub fn finish_transmit(&mut self, port: PortId) {
        self.ports[port.0].set_ready();
    }

    /// 共享占用达到阈值的一定比例时把 (端口, 子队列) 标记为饱和。
    pub(crate) fn update_saturation(&mut self, port: usize, index: usize) {
        let threshold = self.port_threshold(PortId(port), index) as f64;
        let occ = self.ports[port].occupancy(index) as f64;
        let saturated = occ >= self.cfg.saturation_fraction * threshold;
        let p = &self.ports[port];
        let group = &mut self.groups[p.group.0];
        let local = port - group.ports.start;
        group.account.set_saturated(local, index, saturated);
    }

    /// 从子队列（按配置的一端）驱逐一个包并完成计费。
    pub(crate) fn evict(&mut self, port: usize, index: usize, cause: EvictCause, now: SimTime) -> Option<u64> {
        let end: QueueEnd = self.cfg.evict_from;
        let pkt = self.ports[port].queue.evict(index, end)?;
        let size = pkt.bytes();
        self.release(port, index, size);
        self.update_saturation(port, index);
        let p = &mut self.ports[port];
        p.stats.evicted_pkts += 1;
        p.stats.evicted_bytes += size;
        debug!(port, index, ?cause, pkt_id = pkt.id, size, "🪓 驱逐数据包");
        self.evictions.push(Eviction {
            at: now,
            port: PortId(port),
            index,
            cause,
            pkt,
        });
        Some(size)
    }

    /// 令牌补充周期到达：补充令牌，有余额时按驱逐方式驱逐一个包。
    ///
    /// 返回是否应该继续调度下一次补充。
    pub fn token_tick(&mut self, group: GroupId, now: SimTime) -> bool {
        if !self.groups[group.0].tokens.should_continue(now) {
            debug!(?group, "令牌补充停止");
            return false;
        }
        self.groups[group.0].tokens.refill();
        if self.groups[group.0].tokens.can_evict() {
            match self.cfg.drop_type {
                DropType::Token => self.token_sweep(group.0, now),
                DropType::LongToken => self.long_token_sweep(group.0, now),
                DropType::None | DropType::RoundRobinHeadDrop => {}
            }
        }
        true
    }

    /// ABM 周期更新；返回是否继续调度。
    pub fn abm_tick(&mut self, port: PortId) -> bool {
        if self.timers_stopped {
            return false;
        }
        self.refresh_abm(port.0);
        true
    }

    pub(crate) fn refresh_abm(&mut self, port: usize) {
        let interval = SimTime::from_nanos(self.cfg.abm.update_interval_ns);
        let p = &mut self.ports[port];
        let account = &self.groups[p.group.0].account;
        p.abm.update(interval, p.spec.bandwidth_bps, |prio| account.congestion(prio));
    }

    /// 停止所有周期任务：令牌桶解除武装，之后的 tick 都返回 false。
    pub fn stop_timers(&mut self) {
        self.timers_stopped = true;
        self.timers.clear();
        for g in &mut self.groups {
            g.tokens.disarm();
        }
        info!("⏹️ 停止缓冲管理周期任务");
    }

    pub fn timers_stopped(&self) -> bool {
        self.timers_stopped
    }
}
