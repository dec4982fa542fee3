//! 共享缓冲管理（MMU）
//!
//! 缓冲组计费、各类准入策略、令牌桶与主动驱逐，以及把它们和端口多队列
//! 组合起来的 `SharedBufferSwitch`。

mod account;
mod admission;
mod config;
mod evict;
mod meters;
mod port;
mod switch;
mod tokens;

pub use account::{BufferAccount, THRESHOLD_CAP};
pub use admission::{AdmissionPolicy, DropReason, Verdict};
pub use config::{
    AbmConfig, ConfigError, DequeueMethod, DropType, EnqueueMethod, FabConfig, IbConfig, MmuConfig,
    TokenConfig,
};
pub use meters::{AbmMeter, FlowMeter, IbController};
pub use port::{Port, PortSpec, PortStats, TxState};
pub use switch::{
    BufferGroup, EnqueueOutcome, EvictCause, Eviction, QueueSnapshot, SharedBufferSwitch, TimerRequest,
};
pub use tokens::{ArmState, TokenBucket};
