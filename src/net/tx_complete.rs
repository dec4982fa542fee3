//! 发送完成事件（用于驱动端口出队）

use super::id::PortId;
use super::net_world::NetWorld;
use crate::sim::{Event, Simulator, World};

/// 事件：端口完成一次序列化发送后，在 depart 时刻触发，尝试发送队列中的下一个 packet。
#[derive(Debug)]
pub struct TxComplete {
    pub port: PortId,
}

impl Event for TxComplete {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let TxComplete { port } = *self;
        let w = world
            .as_any_mut()
            .downcast_mut::<NetWorld>()
            .expect("world must be NetWorld");
        w.net.on_tx_complete(port, sim);
    }
}
