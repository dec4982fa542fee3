//! 交换机仿真模块
//!
//! 数据包、流分类，以及把缓冲管理核心接到事件驱动仿真上的 `Network` 和各类事件。

mod arrival;
mod classify;
mod deliver_packet;
mod id;
mod net_world;
mod network;
mod packet;
mod stats;
mod timers;
mod tx_complete;

pub use arrival::PacketArrival;
pub use classify::FlowTable;
pub use deliver_packet::DeliverPacket;
pub use id::{GroupId, PortId};
pub use net_world::NetWorld;
pub use network::Network;
pub use packet::{Ecn, L4Proto, Packet};
pub use stats::Stats;
pub use timers::{AbmUpdate, ThroughputSample, TokenRefill};
pub use tx_complete::TxComplete;
