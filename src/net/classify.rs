//! 流分类
//!
//! UDP 包按 DSCP 直接选子队列；TCP 包按流表查找，查不到（例如 ACK）放 0 号。
//! 流表的键是 `src_ip ^ dst_ip ^ dst_port`，不同的流可能撞到同一个键，
//! 这时后插入的覆盖先插入的。

use std::collections::HashMap;

use tracing::trace;

use super::packet::{L4Proto, Packet};

#[derive(Debug, Clone, Default)]
pub struct FlowTable {
    map: HashMap<u32, usize>,
}

impl FlowTable {
    pub fn key(src_ip: u32, dst_ip: u32, dst_port: u16) -> u32 {
        src_ip ^ dst_ip ^ u32::from(dst_port)
    }

    /// 把一条 TCP 流绑定到子队列 `index`。
    pub fn insert(&mut self, src_ip: u32, dst_ip: u32, dst_port: u16, index: usize) {
        let key = Self::key(src_ip, dst_ip, dst_port);
        if let Some(old) = self.map.insert(key, index) {
            trace!(key, old, index, "流表键冲突，覆盖旧映射");
        }
    }

    pub fn lookup(&self, src_ip: u32, dst_ip: u32, dst_port: u16) -> Option<usize> {
        self.map.get(&Self::key(src_ip, dst_ip, dst_port)).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// 给包选择子队列下标。结果可能超出端口的活跃范围，由入队时拒绝。
    pub fn classify(&self, pkt: &Packet) -> usize {
        match pkt.proto {
            L4Proto::Udp => usize::from(pkt.dscp),
            L4Proto::Tcp => self
                .lookup(pkt.src_ip, pkt.dst_ip, pkt.dst_port)
                .unwrap_or(0),
            L4Proto::Other => 0,
        }
    }
}
