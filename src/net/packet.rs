//! 数据包类型
//!
//! 交换机只关心分类与计费需要的字段：大小、L4 元组、DSCP、ECN 码点和
//! “未调度”标记（发送端首个 RTT 内的字节）。

use serde::{Deserialize, Serialize};

/// IP 头中的 ECN 码点。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ecn {
    #[default]
    NotEct,
    Ect1,
    Ect0,
    Ce,
}

impl Ecn {
    pub fn is_ect(self) -> bool {
        matches!(self, Ecn::Ect0 | Ecn::Ect1)
    }

    pub fn is_ce(self) -> bool {
        self == Ecn::Ce
    }
}

/// 传输层协议。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum L4Proto {
    Tcp,
    Udp,
    #[default]
    Other,
}

#[derive(Debug, Clone)]
pub struct Packet {
    pub id: u64,
    pub flow_id: u64,
    pub size_bytes: u32,
    pub src_ip: u32,
    pub dst_ip: u32,
    pub src_port: u16,
    pub dst_port: u16,
    pub proto: L4Proto,
    pub dscp: u8,
    pub ecn: Ecn,
    pub unsched: bool,
}

impl Packet {
    pub fn new(id: u64, flow_id: u64, size_bytes: u32) -> Self {
        Self {
            id,
            flow_id,
            size_bytes,
            src_ip: 0,
            dst_ip: 0,
            src_port: 0,
            dst_port: 0,
            proto: L4Proto::Other,
            dscp: 0,
            ecn: Ecn::NotEct,
            unsched: false,
        }
    }

    pub fn tcp(mut self, src_ip: u32, dst_ip: u32, src_port: u16, dst_port: u16) -> Self {
        self.proto = L4Proto::Tcp;
        self.src_ip = src_ip;
        self.dst_ip = dst_ip;
        self.src_port = src_port;
        self.dst_port = dst_port;
        self
    }

    pub fn udp(mut self, src_ip: u32, dst_ip: u32, src_port: u16, dst_port: u16) -> Self {
        self.proto = L4Proto::Udp;
        self.src_ip = src_ip;
        self.dst_ip = dst_ip;
        self.src_port = src_port;
        self.dst_port = dst_port;
        self
    }

    pub fn with_dscp(mut self, dscp: u8) -> Self {
        self.dscp = dscp;
        self
    }

    pub fn with_ecn(mut self, ecn: Ecn) -> Self {
        self.ecn = ecn;
        self
    }

    pub fn unscheduled(mut self) -> Self {
        self.unsched = true;
        self
    }

    pub fn bytes(&self) -> u64 {
        self.size_bytes as u64
    }

    /// ECT(0)/ECT(1) 的包改写为 CE；返回是否发生了标记。
    pub fn mark_ce_if_ect(&mut self) -> bool {
        if self.ecn.is_ect() {
            self.ecn = Ecn::Ce;
            true
        } else {
            false
        }
    }
}
