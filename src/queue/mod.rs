//! 队列机制
//!
//! 子队列、端口多队列与调度策略。缓冲准入不在这里，见 `crate::mmu`。

mod multi;
mod scheduler;
mod subqueue;

pub use multi::{MultiQueue, QCNT};
pub use scheduler::{Deficits, Scheduler, SchedulerKind};
pub use subqueue::{QueueEnd, Subqueue};
