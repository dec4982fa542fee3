//! 演示和示例代码
//!
//! incast 场景：多个发送端同时向同一个出端口注入 TCP 流，另有一条 UDP
//! 背景流占用同组的另一个端口，两者争用同一个共享池。

use crate::mmu::{ConfigError, MmuConfig, PortSpec, SharedBufferSwitch};
use crate::net::{Ecn, NetWorld, Network, PacketArrival, PortId};
use crate::sim::{Event, SimTime, Simulator, World};

/// incast 场景配置选项
#[derive(Debug, Clone)]
pub struct IncastOpts {
    pub ports: usize,
    pub port_gbps: u64,
    pub link_latency: SimTime,
    pub senders: u64,
    pub pkts_per_sender: u64,
    pub pkt_bytes: u32,
    pub gap: SimTime,
    /// 每条流开头标记为“未调度”的包数（首个 RTT）。
    pub unsched_pkts: u64,
    pub target_port: usize,
    /// 背景 UDP 流的包数，0 表示不注入。
    pub background_pkts: u64,
    pub background_dscp: u8,
    pub until: SimTime,
}

impl Default for IncastOpts {
    fn default() -> Self {
        Self {
            ports: 8,
            port_gbps: 10,
            link_latency: SimTime::from_micros(2),
            senders: 4,
            pkts_per_sender: 200,
            pkt_bytes: 1500,
            gap: SimTime::from_nanos(300),
            unsched_pkts: 10,
            target_port: 0,
            background_pkts: 0,
            background_dscp: 0,
            until: SimTime::from_millis(10),
        }
    }
}

const TARGET_IP: u32 = 0x0a00_0001;
const SENDER_IP_BASE: u32 = 0x0a00_0100;
const BACKGROUND_IP: u32 = 0x0a00_0200;

/// 按 `ports` 个同速率端口搭建交换机。
pub fn build_switch(cfg: MmuConfig, opts: &IncastOpts) -> Result<NetWorld, ConfigError> {
    let bps = opts.port_gbps.saturating_mul(1_000_000_000);
    let specs = vec![PortSpec::new(bps, opts.link_latency.as_nanos()); opts.ports];
    let switch = SharedBufferSwitch::new(cfg, &specs)?;
    Ok(NetWorld::new(Network::new(switch)))
}

/// 登记流表并调度所有注入事件。发送端 `i` 的流放在子队列 `i % active`。
pub fn schedule_incast(sim: &mut Simulator, world: &mut NetWorld, opts: &IncastOpts) {
    let target = PortId(opts.target_port);
    let active = world.net.switch.port(target).queue.active();
    for i in 0..opts.senders {
        let src_ip = SENDER_IP_BASE + i as u32;
        let dst_port = 5000 + i as u16;
        world
            .net
            .flows
            .insert(src_ip, TARGET_IP, dst_port, i as usize % active);
        sim.schedule(
            SimTime::ZERO,
            InjectFlow {
                flow_id: i + 1,
                port: target,
                l4: L4Template::Tcp {
                    src_ip,
                    dst_ip: TARGET_IP,
                    src_port: 40000 + i as u16,
                    dst_port,
                },
                pkt_bytes: opts.pkt_bytes,
                remaining: opts.pkts_per_sender,
                unsched_left: opts.unsched_pkts,
                gap: opts.gap,
            },
        );
    }
    if opts.background_pkts > 0 && opts.ports > 1 {
        let port = PortId((opts.target_port + 1) % opts.ports);
        sim.schedule(
            SimTime::ZERO,
            InjectFlow {
                flow_id: 1000,
                port,
                l4: L4Template::Udp {
                    src_ip: BACKGROUND_IP,
                    dst_ip: TARGET_IP + 1,
                    dscp: opts.background_dscp,
                },
                pkt_bytes: opts.pkt_bytes,
                remaining: opts.background_pkts,
                unsched_left: 0,
                gap: opts.gap,
            },
        );
    }
}

/// 注入包的 L4 头模板
#[derive(Debug, Clone, Copy)]
pub enum L4Template {
    Tcp {
        src_ip: u32,
        dst_ip: u32,
        src_port: u16,
        dst_port: u16,
    },
    Udp { src_ip: u32, dst_ip: u32, dscp: u8 },
}

/// 流量注入事件
///
/// 用于周期性注入数据包
#[derive(Debug)]
pub struct InjectFlow {
    pub flow_id: u64,
    pub port: PortId,
    pub l4: L4Template,
    pub pkt_bytes: u32,
    pub remaining: u64,
    pub unsched_left: u64,
    pub gap: SimTime,
}

impl Event for InjectFlow {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let mut me = *self;
        let w = world
            .as_any_mut()
            .downcast_mut::<NetWorld>()
            .expect("world must be NetWorld");

        if me.remaining == 0 {
            return;
        }

        let pkt = w.net.make_packet(me.flow_id, me.pkt_bytes);
        let mut pkt = match me.l4 {
            L4Template::Tcp {
                src_ip,
                dst_ip,
                src_port,
                dst_port,
            } => pkt.tcp(src_ip, dst_ip, src_port, dst_port).with_ecn(Ecn::Ect0),
            L4Template::Udp { src_ip, dst_ip, dscp } => {
                pkt.udp(src_ip, dst_ip, 9, 9).with_dscp(dscp)
            }
        };
        if me.unsched_left > 0 {
            pkt = pkt.unscheduled();
            me.unsched_left -= 1;
        }
        // 到达与注入同一时刻
        sim.schedule(sim.now(), PacketArrival { port: me.port, pkt });

        me.remaining -= 1;
        if me.remaining > 0 {
            sim.schedule_in(me.gap, InjectFlow { ..me });
        }
    }
}
