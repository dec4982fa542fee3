//! 周期任务事件
//!
//! 每个事件执行时先把下一次调度出去再做本次工作；停止后不再续期。

use super::id::{GroupId, PortId};
use super::net_world::NetWorld;
use crate::sim::{Event, Simulator, World};

fn net_world(world: &mut dyn World) -> &mut NetWorld {
    world
        .as_any_mut()
        .downcast_mut::<NetWorld>()
        .expect("world must be NetWorld")
}

/// 缓冲组的令牌补充。
#[derive(Debug)]
pub struct TokenRefill {
    pub group: GroupId,
}

impl Event for TokenRefill {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        net_world(world).net.on_token_refill(self.group, sim);
    }
}

/// ABM 出队速率与拥塞端口数快照的更新。
#[derive(Debug)]
pub struct AbmUpdate {
    pub port: PortId,
}

impl Event for AbmUpdate {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        net_world(world).net.on_abm_update(self.port, sim);
    }
}

/// 端口吞吐采样。
#[derive(Debug)]
pub struct ThroughputSample {
    pub port: PortId,
}

impl Event for ThroughputSample {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        net_world(world).net.on_throughput_sample(self.port, sim);
    }
}
