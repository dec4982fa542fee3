//! 数据包到达事件

use super::id::PortId;
use super::net_world::NetWorld;
use super::packet::Packet;
use crate::sim::{Event, Simulator, World};

/// 事件：一个 packet 到达交换机，要从 `port` 转发出去。
#[derive(Debug)]
pub struct PacketArrival {
    pub port: PortId,
    pub pkt: Packet,
}

impl Event for PacketArrival {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let PacketArrival { port, pkt } = *self;
        let w = world
            .as_any_mut()
            .downcast_mut::<NetWorld>()
            .expect("world must be NetWorld");
        w.net.on_arrival(port, pkt, sim);
    }
}
