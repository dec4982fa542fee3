//! 仿真核心模块
//!
//! 单线程离散事件引擎：仿真时间、事件、世界与调度器。

mod event;
mod scheduled_event;
mod simulator;
mod time;
mod world;

pub use event::Event;
pub use scheduled_event::ScheduledEvent;
pub use simulator::Simulator;
pub use time::SimTime;
pub use world::World;
