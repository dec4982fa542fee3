//! 数据包交付事件
//!
//! 包在出端口链路上传播结束后交给下游（仿真里即计入统计）。

use super::id::PortId;
use super::net_world::NetWorld;
use super::packet::Packet;
use crate::sim::{Event, Simulator, World};
use tracing::{debug, trace};

/// 事件：一个 packet 离开某个出端口的链路。
#[derive(Debug)]
pub struct DeliverPacket {
    pub port: PortId,
    pub pkt: Packet,
}

impl Event for DeliverPacket {
    #[tracing::instrument(skip(self, sim, world), fields(pkt_id = self.pkt.id, flow_id = self.pkt.flow_id, port = ?self.port))]
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let DeliverPacket { port, pkt } = *self;

        debug!(
            size_bytes = pkt.size_bytes,
            ecn = ?pkt.ecn,
            now = ?sim.now(),
            "📨 数据包送达"
        );

        let w = world
            .as_any_mut()
            .downcast_mut::<NetWorld>()
            .expect("world must be NetWorld");
        w.net.on_delivered(port, pkt, sim.now());

        trace!("DeliverPacket::execute 完成");
    }
}
