//! 交换机仿真外壳
//!
//! `Network` 持有共享缓冲交换机、流表、统计和遥测，把到达、发送完成和
//! 各类周期任务翻译成对 `SharedBufferSwitch` 的调用，再把交换机产生的
//! 定时请求和驱逐记录转成事件与统计。

use tracing::{debug, info, trace};

use super::classify::FlowTable;
use super::deliver_packet::DeliverPacket;
use super::id::{GroupId, PortId};
use super::packet::Packet;
use super::stats::Stats;
use super::timers::{AbmUpdate, ThroughputSample, TokenRefill};
use super::tx_complete::TxComplete;
use crate::mmu::{EnqueueOutcome, EvictCause, SharedBufferSwitch, TimerRequest};
use crate::sim::{SimTime, Simulator};
use crate::telemetry::{TelemetryEvent, TelemetryKind, TelemetryLog, TelemetryPortInfo};

/// 端口吞吐采样：每个窗口统计一次发送字节。
#[derive(Debug)]
struct ThroughputSampler {
    interval: SimTime,
    window_bytes: Vec<u64>,
    armed: Vec<bool>,
}

#[derive(Debug)]
pub struct Network {
    pub switch: SharedBufferSwitch,
    pub flows: FlowTable,
    pub stats: Stats,
    pub telemetry: Option<TelemetryLog>,
    throughput: Option<ThroughputSampler>,
    next_pkt_id: u64,
}

impl Network {
    pub fn new(switch: SharedBufferSwitch) -> Self {
        Self {
            switch,
            flows: FlowTable::default(),
            stats: Stats::default(),
            telemetry: None,
            throughput: None,
            next_pkt_id: 0,
        }
    }

    /// 开启遥测，队列记录每 `sample_every` 条保留一条。
    pub fn with_telemetry(mut self, sample_every: u64) -> Self {
        self.telemetry = Some(TelemetryLog::new(sample_every));
        self
    }

    /// 开启端口吞吐采样。端口第一次发送时启动。
    pub fn with_throughput_sampling(mut self, interval: SimTime) -> Self {
        let n = self.switch.num_ports();
        self.throughput = Some(ThroughputSampler {
            interval: SimTime::from_nanos(interval.as_nanos().max(1)),
            window_bytes: vec![0; n],
            armed: vec![false; n],
        });
        self
    }

    /// 创建数据包
    pub fn make_packet(&mut self, flow_id: u64, size_bytes: u32) -> Packet {
        let id = self.next_pkt_id;
        self.next_pkt_id = self.next_pkt_id.wrapping_add(1);
        Packet::new(id, flow_id, size_bytes)
    }

    fn telemetry_push(&mut self, ev: TelemetryEvent) {
        if let Some(t) = &mut self.telemetry {
            t.push(ev);
        }
    }

    pub fn emit_telemetry_meta(&mut self) {
        if self.telemetry.is_none() {
            return;
        }
        let ports = self
            .switch
            .ports()
            .iter()
            .map(|p| TelemetryPortInfo {
                id: p.id.0,
                group: p.group.0,
                bandwidth_bps: p.spec.bandwidth_bps,
                latency_ns: p.spec.latency_ns,
                active_queues: p.queue.active(),
            })
            .collect();
        let cfg = self.switch.config();
        let kind = TelemetryKind::Meta {
            ports,
            groups: self.switch.groups().len(),
            max_buffer_bytes: cfg.max_buffer_bytes,
            policy: self.switch.policy(),
            scheduler: cfg.scheduler,
        };
        self.telemetry_push(TelemetryEvent {
            t_ns: 0,
            pkt_id: None,
            flow_id: None,
            pkt_bytes: None,
            kind,
        });
    }

    /// 包到达出端口：分类、准入，然后尝试发送。
    #[tracing::instrument(skip(self, pkt, sim), fields(pkt_id = pkt.id, flow_id = pkt.flow_id))]
    pub fn on_arrival(&mut self, port: PortId, pkt: Packet, sim: &mut Simulator) {
        let now = sim.now();
        let index = self.flows.classify(&pkt);
        let (pkt_id, flow_id, pkt_bytes) = (pkt.id, pkt.flow_id, pkt.size_bytes);
        self.stats.arrived_pkts += 1;
        trace!(?port, index, "分类完成");

        match self.switch.enqueue(port, pkt, index, now) {
            EnqueueOutcome::Queued {
                index, ecn_marked, from_static,
            } => {
                self.stats.admitted_pkts += 1;
                if ecn_marked {
                    self.stats.ecn_marked += 1;
                }
                let queue = self.switch.queue_snapshot(port, index);
                self.telemetry_push(TelemetryEvent {
                    t_ns: now.as_nanos(),
                    pkt_id: Some(pkt_id),
                    flow_id: Some(flow_id),
                    pkt_bytes: Some(pkt_bytes),
                    kind: TelemetryKind::Enqueue {
                        port: port.0,
                        subqueue: index,
                        ecn_marked,
                        from_static,
                        queue,
                    },
                });
                self.drain_switch(sim);
                self.try_transmit(port, sim);
            }
            EnqueueOutcome::Dropped { index, reason, pkt } => {
                self.stats.dropped_pkts += 1;
                self.stats.dropped_bytes += pkt.bytes();
                if self.telemetry.is_some() {
                    let queue = if index < crate::queue::QCNT {
                        self.switch.queue_snapshot(port, index)
                    } else {
                        self.switch.queue_snapshot(port, 0)
                    };
                    self.telemetry_push(TelemetryEvent {
                        t_ns: now.as_nanos(),
                        pkt_id: Some(pkt_id),
                        flow_id: Some(flow_id),
                        pkt_bytes: Some(pkt_bytes),
                        kind: TelemetryKind::Drop {
                            port: port.0,
                            subqueue: index,
                            reason,
                            queue,
                        },
                    });
                    self.record_loss(port, now);
                }
                self.drain_switch(sim);
            }
        }
    }

    fn record_loss(&mut self, port: PortId, now: SimTime) {
        let groups = self.switch.groups();
        let usage = groups
            .iter()
            .map(|g| {
                let max = g.account.max_buffer();
                if max == 0 {
                    0.0
                } else {
                    g.account.used_buffer() as f64 / max as f64
                }
            })
            .collect();
        let sent_bytes = groups.iter().map(|g| g.account.sent_bytes()).collect();
        let group = self.switch.group_of(port).0;
        self.telemetry_push(TelemetryEvent {
            t_ns: now.as_nanos(),
            pkt_id: None,
            flow_id: None,
            pkt_bytes: None,
            kind: TelemetryKind::Loss {
                group,
                usage,
                sent_bytes,
            },
        });
    }

    /// 端口空闲时取下一个包开始发送，调度发送完成和送达事件。
    pub fn try_transmit(&mut self, port: PortId, sim: &mut Simulator) {
        let now = sim.now();
        let picked = self.switch.start_transmit(port, now);
        // 出队前的丢弃检查可能已经驱逐了包
        self.drain_switch(sim);
        let Some((index, pkt)) = picked else {
            return;
        };

        let p = self.switch.port(port);
        let depart = now + p.tx_time(pkt.bytes());
        let arrive = depart + p.latency();
        debug!(?port, index, pkt_id = pkt.id, ?depart, ?arrive, "📤 开始发送");

        if self.telemetry.is_some() {
            let queue = self.switch.queue_snapshot(port, index);
            self.telemetry_push(TelemetryEvent {
                t_ns: now.as_nanos(),
                pkt_id: Some(pkt.id),
                flow_id: Some(pkt.flow_id),
                pkt_bytes: Some(pkt.size_bytes),
                kind: TelemetryKind::Dequeue {
                    port: port.0,
                    subqueue: index,
                    depart_ns: depart.as_nanos(),
                    queue,
                },
            });
        }

        if let Some(tp) = &mut self.throughput {
            tp.window_bytes[port.0] += pkt.bytes();
            if !tp.armed[port.0] && !self.switch.timers_stopped() {
                tp.armed[port.0] = true;
                sim.schedule_in(tp.interval, ThroughputSample { port });
            }
        }

        sim.schedule(depart, TxComplete { port });
        sim.schedule(arrive, DeliverPacket { port, pkt });
    }

    pub fn on_tx_complete(&mut self, port: PortId, sim: &mut Simulator) {
        self.switch.finish_transmit(port);
        self.try_transmit(port, sim);
    }

    /// 包离开出端口链路
    pub(crate) fn on_delivered(&mut self, port: PortId, pkt: Packet, now: SimTime) {
        self.stats.delivered_pkts += 1;
        self.stats.delivered_bytes += pkt.bytes();
        self.telemetry_push(TelemetryEvent {
            t_ns: now.as_nanos(),
            pkt_id: Some(pkt.id),
            flow_id: Some(pkt.flow_id),
            pkt_bytes: Some(pkt.size_bytes),
            kind: TelemetryKind::Delivered { port: port.0 },
        });
    }

    /// 取走交换机积累的定时请求和驱逐记录。
    fn drain_switch(&mut self, sim: &mut Simulator) {
        for req in self.switch.take_timer_requests() {
            match req {
                TimerRequest::TokenRefill { group, after } => {
                    debug!(?group, ?after, "⏱️ 启动令牌补充");
                    sim.schedule_in(after, TokenRefill { group });
                }
                TimerRequest::AbmUpdate { port, after } => {
                    debug!(?port, ?after, "⏱️ 启动 ABM 周期更新");
                    sim.schedule_in(after, AbmUpdate { port });
                }
            }
        }
        for ev in self.switch.take_evictions() {
            match ev.cause {
                EvictCause::PushOut => self.stats.pushed_out += 1,
                EvictCause::HeadDrop => self.stats.head_dropped += 1,
                EvictCause::Token | EvictCause::LongToken => self.stats.token_evicted += 1,
            }
            self.telemetry_push(TelemetryEvent {
                t_ns: ev.at.as_nanos(),
                pkt_id: Some(ev.pkt.id),
                flow_id: Some(ev.pkt.flow_id),
                pkt_bytes: Some(ev.pkt.size_bytes),
                kind: TelemetryKind::Evict {
                    port: ev.port.0,
                    subqueue: ev.index,
                    cause: ev.cause,
                },
            });
        }
    }

    /// 令牌补充：先安排下一次，再执行本次补充与驱逐。
    pub fn on_token_refill(&mut self, group: GroupId, sim: &mut Simulator) {
        let now = sim.now();
        let tokens = &self.switch.group(group).tokens;
        if tokens.should_continue(now) {
            sim.schedule_in(tokens.interval(), TokenRefill { group });
        }
        self.switch.token_tick(group, now);
        self.drain_switch(sim);
    }

    pub fn on_abm_update(&mut self, port: PortId, sim: &mut Simulator) {
        if self.switch.timers_stopped() {
            return;
        }
        let interval = SimTime::from_nanos(self.switch.config().abm.update_interval_ns);
        sim.schedule_in(interval, AbmUpdate { port });
        self.switch.abm_tick(port);
    }

    pub fn on_throughput_sample(&mut self, port: PortId, sim: &mut Simulator) {
        let now = sim.now();
        let stopped = self.switch.timers_stopped();
        let Some(tp) = &mut self.throughput else {
            return;
        };
        let interval = tp.interval;
        let bytes = std::mem::take(&mut tp.window_bytes[port.0]);
        if stopped {
            tp.armed[port.0] = false;
        } else {
            sim.schedule_in(interval, ThroughputSample { port });
        }
        let gbps = bytes as f64 * 8.0 / interval.as_nanos() as f64;
        trace!(?port, bytes, gbps, "吞吐采样");
        self.telemetry_push(TelemetryEvent {
            t_ns: now.as_nanos(),
            pkt_id: None,
            flow_id: None,
            pkt_bytes: None,
            kind: TelemetryKind::Throughput {
                port: port.0,
                bytes,
                window_ns: interval.as_nanos(),
                gbps,
            },
        });
    }

    /// 停止所有周期任务。已经在事件队列里的任务触发时发现已停止，不再续期。
    pub fn stop_timers(&mut self) {
        self.switch.stop_timers();
        info!("⏹️ 周期任务已停止");
    }
}
