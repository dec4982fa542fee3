//! 世界 trait
//!
//! 事件通过 `World` 访问业务层状态（交换机、统计、遥测）。

use super::simulator::Simulator;
use std::any::Any;

/// 仿真世界：由业务层实现，事件内部通过 `as_any_mut` 向下转型。
pub trait World: Any {
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// 每个事件执行完毕后回调一次。
    fn on_tick(&mut self, _sim: &mut Simulator) {}
}
