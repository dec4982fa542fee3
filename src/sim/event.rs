//! 事件 trait
//!
//! 仿真中一切状态变化都由事件驱动：到达、发送完成、周期性定时器。

use super::simulator::Simulator;
use super::world::World;

/// 可被调度执行的事件。`self: Box<Self>` 让事件在执行时拿回自身所有权，
/// 周期性事件可以直接把自己重新调度出去。
pub trait Event: Send + 'static {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World);
}
