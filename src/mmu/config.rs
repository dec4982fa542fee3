//! 缓冲管理配置
//!
//! 所有字段都有默认值，JSON 配置只需写出要改的部分。

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::queue::{QCNT, QueueEnd, SchedulerKind};

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("weighted round robin scheduling is not implemented")]
    UnsupportedScheduler,
    #[error("active queue count must be in 1..={max}, got {got}")]
    ActiveQueues { got: usize, max: usize },
    #[error("queue {queue} maps to priority {priority}, expected < {max}")]
    PriorityOutOfRange {
        queue: usize,
        priority: usize,
        max: usize,
    },
    #[error("{what} alpha for index {index} must be finite and non-negative, got {value}")]
    InvalidAlpha {
        what: &'static str,
        index: usize,
        value: f64,
    },
    #[error("saturation fraction must be within (0, 1], got {0}")]
    InvalidSaturation(f64),
    #[error("ports_per_group must be positive")]
    ZeroPortsPerGroup,
    #[error("switch needs at least one port")]
    NoPorts,
    #[error("port {port} has zero bandwidth")]
    ZeroBandwidth { port: usize },
    #[error("drr quantum must be positive")]
    ZeroQuantum,
    #[error("token ceiling unit must be positive")]
    ZeroCeilingUnit,
    #[error("{what} interval must be positive")]
    ZeroInterval { what: &'static str },
}

/// 入队（准入）方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum EnqueueMethod {
    /// 只检查共享池是否放得下，与 `CompleteSharing` 相同。
    Normal,
    #[default]
    DynamicThreshold,
    MultiLayerDynamicThreshold,
    PushOut,
    ActiveBufferManagement,
    FlowAwareBuffer,
    IntelligentBuffer,
    CompleteSharing,
}

/// 出队方式；`Drop` 关闭发送路径。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DequeueMethod {
    #[default]
    Normal,
    Drop,
}

/// 主动驱逐方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum DropType {
    #[default]
    None,
    /// 每次出队前扫描本端口子队列，按时间间隔限频驱逐。
    RoundRobinHeadDrop,
    /// 令牌补充时在组内所有 (端口, 子队列) 上轮询驱逐一个包。
    Token,
    /// 令牌补充时驱逐组内最长子队列的一个包。
    LongToken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    pub max_tokens: i64,
    /// 每次补充增加的令牌数。
    pub increment: i64,
    /// 每释放这么多字节扣一个令牌（向上取整）。
    pub ceiling_bytes: u64,
    /// 补充周期 = 该大小的包在端口速率下的发送时间 / 每组端口数。
    pub reference_pkt_bytes: u64,
    /// 超过此时刻不再补充；`None` 表示直到显式停止。
    pub stop_after_ns: Option<u64>,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            max_tokens: 8,
            increment: 8,
            ceiling_bytes: 200,
            reference_pkt_bytes: 1500,
            stop_after_ns: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AbmConfig {
    /// 出队速率与拥塞端口数快照的更新周期。
    pub update_interval_ns: u64,
    /// 未调度包使用的 alpha；`None` 时与普通包相同。
    pub alpha_unsched: Option<f64>,
}

impl Default for AbmConfig {
    fn default() -> Self {
        Self {
            update_interval_ns: 1054 * 8 * 10 * 1000,
            alpha_unsched: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FabConfig {
    pub window_ns: u64,
    /// 窗口内发送少于此字节数的流享受 `privileged_alpha`。
    pub threshold_bytes: u64,
    pub privileged_alpha: f64,
}

impl Default for FabConfig {
    fn default() -> Self {
        Self {
            window_ns: 5_000_000,
            threshold_bytes: 15 * 1500,
            privileged_alpha: 1024.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IbConfig {
    /// 公平份额 MFair 的控制周期。
    pub afd_window_ns: u64,
    pub dpp_window_ns: u64,
    /// 窗口内包数少于此值的流视为短流。
    pub dpp_threshold_pkts: u64,
    /// 短流是否转入 0 号低时延队列。
    pub enable_dpp: bool,
    pub a1: f64,
    pub a2: f64,
    pub qref_bytes: u64,
    pub mfair_init_bytes: f64,
    /// 队列低于此长度时不做概率丢弃。
    pub early_drop_floor_bytes: u64,
    pub seed: u64,
}

impl Default for IbConfig {
    fn default() -> Self {
        Self {
            afd_window_ns: 50_000,
            dpp_window_ns: 5_000_000,
            dpp_threshold_pkts: 5,
            enable_dpp: false,
            a1: 1.8,
            a2: 1.7,
            qref_bytes: 15_000,
            mfair_init_bytes: 4_000_000.0,
            early_drop_floor_bytes: 150 * 1024,
            seed: 1,
        }
    }
}

/// 一台共享缓冲交换机的完整配置（所有缓冲组共用）。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MmuConfig {
    /// 每个缓冲组的共享池大小。
    pub max_buffer_bytes: u64,
    pub queue_alpha: [f64; QCNT],
    pub priority_alpha: [f64; QCNT],
    pub queue_to_priority: [usize; QCNT],
    pub enqueue_method: EnqueueMethod,
    pub dequeue_method: DequeueMethod,
    pub scheduler: SchedulerKind,
    pub drr_quantum: u32,
    pub active_queues: usize,
    /// 入队后占用超过该值时打 ECN 标记；`None` 关闭标记。
    pub ecn_threshold_bytes: Option<u64>,
    /// 每个子队列的私有静态预留。
    pub static_buffer_bytes: u64,
    /// 占用达到阈值的这一比例即视为饱和。
    pub saturation_fraction: f64,
    pub evict_from: QueueEnd,
    pub drop_type: DropType,
    pub head_drop_interval_ns: u64,
    pub ports_per_group: usize,
    pub tokens: TokenConfig,
    pub abm: AbmConfig,
    pub fab: FabConfig,
    pub ib: IbConfig,
}

impl Default for MmuConfig {
    fn default() -> Self {
        Self {
            max_buffer_bytes: 10_000,
            queue_alpha: [1.0; QCNT],
            priority_alpha: [10.0; QCNT],
            queue_to_priority: [0, 1, 2, 3, 4, 5, 6, 7],
            enqueue_method: EnqueueMethod::default(),
            dequeue_method: DequeueMethod::default(),
            scheduler: SchedulerKind::default(),
            drr_quantum: 2000,
            active_queues: QCNT,
            ecn_threshold_bytes: None,
            static_buffer_bytes: 0,
            saturation_fraction: 0.9,
            evict_from: QueueEnd::Head,
            drop_type: DropType::None,
            head_drop_interval_ns: 1_000_000_000,
            ports_per_group: 8,
            tokens: TokenConfig::default(),
            abm: AbmConfig::default(),
            fab: FabConfig::default(),
            ib: IbConfig::default(),
        }
    }
}

impl MmuConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler == SchedulerKind::WeightedRoundRobin {
            return Err(ConfigError::UnsupportedScheduler);
        }
        if self.active_queues == 0 || self.active_queues > QCNT {
            return Err(ConfigError::ActiveQueues {
                got: self.active_queues,
                max: QCNT,
            });
        }
        for (queue, &priority) in self.queue_to_priority.iter().enumerate() {
            if priority >= QCNT {
                return Err(ConfigError::PriorityOutOfRange {
                    queue,
                    priority,
                    max: QCNT,
                });
            }
        }
        let alphas = self
            .queue_alpha
            .iter()
            .map(|a| ("queue", a))
            .chain(self.priority_alpha.iter().map(|a| ("priority", a)));
        for (i, (what, &value)) in alphas.enumerate() {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidAlpha {
                    what,
                    index: i % QCNT,
                    value,
                });
            }
        }
        if !(self.saturation_fraction > 0.0 && self.saturation_fraction <= 1.0) {
            return Err(ConfigError::InvalidSaturation(self.saturation_fraction));
        }
        if self.ports_per_group == 0 {
            return Err(ConfigError::ZeroPortsPerGroup);
        }
        if self.drr_quantum == 0 {
            return Err(ConfigError::ZeroQuantum);
        }
        if self.tokens.ceiling_bytes == 0 {
            return Err(ConfigError::ZeroCeilingUnit);
        }
        if self.abm.update_interval_ns == 0 {
            return Err(ConfigError::ZeroInterval { what: "abm update" });
        }
        if self.ib.afd_window_ns == 0 {
            return Err(ConfigError::ZeroInterval { what: "afd window" });
        }
        Ok(())
    }
}
