//! 共享缓冲交换机仿真
//!
//! 多个发送端向同一出端口发起 incast，比较不同准入策略与调度方式下的
//! 丢包、驱逐和 ECN 标记情况。

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use mmu_sim::demo::{IncastOpts, build_switch, schedule_incast};
use mmu_sim::mmu::{DropType, EnqueueMethod, MmuConfig};
use mmu_sim::queue::SchedulerKind;
use mmu_sim::sim::{SimTime, Simulator};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(
    name = "shared-buffer-sim",
    about = "共享缓冲交换机仿真：incast 流量下的准入、调度与驱逐"
)]
struct Args {
    /// MMU 配置 JSON；未给出的字段使用默认值
    #[arg(long)]
    config: Option<PathBuf>,

    /// 覆盖入队方式
    #[arg(long, value_enum)]
    enqueue_method: Option<EnqueueMethod>,

    /// 覆盖调度方式
    #[arg(long, value_enum)]
    scheduler: Option<SchedulerKind>,

    /// 覆盖主动驱逐方式
    #[arg(long, value_enum)]
    drop_type: Option<DropType>,

    /// 覆盖每个缓冲组的共享池大小（字节）
    #[arg(long)]
    max_buffer_bytes: Option<u64>,

    /// 覆盖 ECN 标记门限（字节）
    #[arg(long)]
    ecn_threshold_bytes: Option<u64>,

    /// 覆盖每个子队列的静态预留（字节）
    #[arg(long)]
    static_buffer_bytes: Option<u64>,

    #[arg(long, default_value_t = 8)]
    ports: usize,
    #[arg(long, default_value_t = 10)]
    port_gbps: u64,
    /// 出端口链路传播时延（微秒）
    #[arg(long, default_value_t = 2)]
    link_latency_us: u64,
    #[arg(long, default_value_t = 4)]
    senders: u64,
    #[arg(long, default_value_t = 200)]
    pkts: u64,
    #[arg(long, default_value_t = 1500)]
    pkt_bytes: u32,
    /// 同一发送端两个 packet 的注入间隔（纳秒）
    #[arg(long, default_value_t = 300)]
    gap_ns: u64,
    #[arg(long, default_value_t = 10)]
    unsched_pkts: u64,
    #[arg(long, default_value_t = 0)]
    background_pkts: u64,
    #[arg(long, default_value_t = 0)]
    background_dscp: u8,

    /// 仿真运行到多少毫秒
    #[arg(long, default_value_t = 10)]
    until_ms: u64,

    /// 输出遥测 JSON 文件
    #[arg(long)]
    telemetry_json: Option<PathBuf>,

    /// 队列记录每 N 条保留一条
    #[arg(long, default_value_t = 1)]
    telemetry_every: u64,

    /// 端口吞吐采样窗口（微秒），0 表示关闭
    #[arg(long, default_value_t = 1000)]
    throughput_us: u64,
}

fn load_config(args: &Args) -> Result<MmuConfig, String> {
    let mut cfg = match &args.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .map_err(|e| format!("read {}: {e}", path.display()))?;
            serde_json::from_str::<MmuConfig>(&raw)
                .map_err(|e| format!("parse {}: {e}", path.display()))?
        }
        None => MmuConfig::default(),
    };
    if let Some(m) = args.enqueue_method {
        cfg.enqueue_method = m;
    }
    if let Some(s) = args.scheduler {
        cfg.scheduler = s;
    }
    if let Some(d) = args.drop_type {
        cfg.drop_type = d;
    }
    if let Some(v) = args.max_buffer_bytes {
        cfg.max_buffer_bytes = v;
    }
    if let Some(v) = args.ecn_threshold_bytes {
        cfg.ecn_threshold_bytes = Some(v);
    }
    if let Some(v) = args.static_buffer_bytes {
        cfg.static_buffer_bytes = v;
    }
    Ok(cfg)
}

fn main() -> ExitCode {
    // 初始化 tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let args = Args::parse();

    let cfg = match load_config(&args) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };

    let opts = IncastOpts {
        ports: args.ports,
        port_gbps: args.port_gbps,
        link_latency: SimTime::from_micros(args.link_latency_us),
        senders: args.senders,
        pkts_per_sender: args.pkts,
        pkt_bytes: args.pkt_bytes,
        gap: SimTime::from_nanos(args.gap_ns),
        unsched_pkts: args.unsched_pkts,
        target_port: 0,
        background_pkts: args.background_pkts,
        background_dscp: args.background_dscp,
        until: SimTime::from_millis(args.until_ms),
    };

    let mut world = match build_switch(cfg, &opts) {
        Ok(world) => world,
        Err(e) => {
            warn!(error = %e, "配置无效");
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };

    if args.telemetry_json.is_some() {
        world.net.telemetry = Some(mmu_sim::telemetry::TelemetryLog::new(args.telemetry_every));
        world.net.emit_telemetry_meta();
    }
    if args.throughput_us > 0 {
        world.net = world
            .net
            .with_throughput_sampling(SimTime::from_micros(args.throughput_us));
    }

    let mut sim = Simulator::default();
    schedule_incast(&mut sim, &mut world, &opts);

    sim.run_until(opts.until, &mut world);
    world.net.stop_timers();
    info!(pending = sim.pending(), "丢弃剩余事件");
    sim.clear();

    let s = &world.net.stats;
    println!(
        "done @ {:?}, arrived={}, admitted={}, dropped={}, ecn_marked={}, pushed_out={}, head_dropped={}, token_evicted={}, delivered_pkts={}, delivered_bytes={}",
        sim.now(),
        s.arrived_pkts,
        s.admitted_pkts,
        s.dropped_pkts,
        s.ecn_marked,
        s.pushed_out,
        s.head_dropped,
        s.token_evicted,
        s.delivered_pkts,
        s.delivered_bytes
    );
    for p in world.net.switch.ports().iter().filter(|p| p.stats.enqueued_pkts > 0) {
        println!(
            "port {}: enqueued={}, dropped={}, sent={}, evicted={}",
            p.id.0, p.stats.enqueued_pkts, p.stats.dropped_pkts, p.stats.sent_pkts, p.stats.evicted_pkts
        );
    }

    if let Some(path) = args.telemetry_json {
        if let Some(t) = world.net.telemetry.take() {
            let json = serde_json::to_string_pretty(&t.events).expect("serialize telemetry events");
            fs::write(&path, json).expect("write telemetry json");
            eprintln!("wrote telemetry events to {}", path.display());
        }
    }
    ExitCode::SUCCESS
}
