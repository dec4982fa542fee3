//! 子队列：无界 FIFO，带字节计数
//!
//! 子队列本身从不拒绝入队，容量控制由上层的准入策略负责。

use std::collections::VecDeque;

use crate::net::Packet;

/// 驱逐时从哪一端取包。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueEnd {
    /// 队头（最早入队的包），与正常出队取同一个包。
    #[default]
    Head,
    /// 队尾（最新入队的包）。
    Tail,
}

#[derive(Debug, Default)]
pub struct Subqueue {
    bytes: u64,
    q: VecDeque<Packet>,
}

impl Subqueue {
    pub fn push(&mut self, pkt: Packet) {
        self.bytes = self.bytes.saturating_add(pkt.bytes());
        self.q.push_back(pkt);
    }

    pub fn pop(&mut self) -> Option<Packet> {
        self.take(QueueEnd::Head)
    }

    pub fn take(&mut self, end: QueueEnd) -> Option<Packet> {
        let pkt = match end {
            QueueEnd::Head => self.q.pop_front(),
            QueueEnd::Tail => self.q.pop_back(),
        }?;
        self.bytes -= pkt.bytes();
        Some(pkt)
    }

    pub fn peek(&self) -> Option<&Packet> {
        self.q.front()
    }

    pub fn len(&self) -> usize {
        self.q.len()
    }

    pub fn is_empty(&self) -> bool {
        self.q.is_empty()
    }

    /// 当前排队字节数（含静态预留部分）。
    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}
