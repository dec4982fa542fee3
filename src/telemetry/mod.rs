//! 缓冲管理遥测记录
//!
//! 结构化的 JSON 事件：入队、出队、丢弃、驱逐、丢包快照和吞吐采样。
//! 输出格式由调用方决定，这里只负责收集。

mod types;

pub use types::{TelemetryEvent, TelemetryKind, TelemetryLog, TelemetryPortInfo};
