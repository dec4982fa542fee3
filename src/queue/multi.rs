//! 多队列：每个端口一组固定数量的子队列
//!
//! `MultiQueue` 只是机制：按下标入队、按调度器出队。准入控制在上一层的
//! 缓冲管理里完成，这里的子队列不设上限。

use tracing::trace;

use crate::net::Packet;

use super::scheduler::Scheduler;
use super::subqueue::{QueueEnd, Subqueue};

/// 每个端口的子队列个数。
pub const QCNT: usize = 8;

#[derive(Debug)]
pub struct MultiQueue {
    queues: Vec<Subqueue>,
    active: usize,
    enqueue_cursor: usize,
    dequeue_cursor: usize,
    scheduler: Scheduler,
}

impl MultiQueue {
    /// `active` 会被限制在 `1..=QCNT`。
    pub fn new(active: usize, scheduler: Scheduler) -> Self {
        let active = active.clamp(1, QCNT);
        Self {
            queues: (0..QCNT).map(|_| Subqueue::default()).collect(),
            active,
            enqueue_cursor: 0,
            dequeue_cursor: active - 1,
            scheduler,
        }
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// 上一次出队（或被调度器选中）的子队列下标。
    pub fn last_dequeued(&self) -> usize {
        self.dequeue_cursor
    }

    /// 子队列是否在活跃范围内。
    pub fn in_range(&self, index: usize) -> bool {
        index < self.active
    }

    pub fn subqueue(&self, index: usize) -> &Subqueue {
        &self.queues[index]
    }

    pub fn bytes(&self, index: usize) -> u64 {
        self.queues[index].bytes()
    }

    pub fn total_bytes(&self) -> u64 {
        self.queues.iter().map(Subqueue::bytes).sum()
    }

    pub fn len(&self) -> usize {
        self.queues.iter().map(Subqueue::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.iter().all(Subqueue::is_empty)
    }

    /// 入队到指定子队列；下标超出活跃范围时把包原样退回。
    pub fn enqueue(&mut self, pkt: Packet, index: usize) -> Result<(), Packet> {
        if !self.in_range(index) {
            return Err(pkt);
        }
        trace!(index, pkt_id = pkt.id, size = pkt.size_bytes, "子队列入队");
        self.queues[index].push(pkt);
        Ok(())
    }

    /// 轮询入队：依次放入各活跃子队列，返回实际使用的下标。
    pub fn enqueue_rr(&mut self, pkt: Packet) -> Result<usize, Packet> {
        let index = self.enqueue_cursor % self.active;
        self.enqueue(pkt, index)?;
        self.enqueue_cursor = (index + 1) % self.active;
        Ok(index)
    }

    /// 按配置的调度策略出队，返回 (子队列下标, 包)。
    pub fn dequeue(&mut self) -> Option<(usize, Packet)> {
        let active = self.active;
        let picked = self
            .scheduler
            .dequeue(&mut self.queues[..active], &mut self.dequeue_cursor);
        if let Some((index, pkt)) = &picked {
            trace!(index, pkt_id = pkt.id, "调度出队");
        }
        picked
    }

    /// 直接从指定子队列队头取包，不经过调度器。
    pub fn dequeue_at(&mut self, index: usize) -> Option<Packet> {
        if !self.in_range(index) {
            return None;
        }
        self.queues[index].pop()
    }

    /// 驱逐：从指定子队列的一端移除一个包。
    pub fn evict(&mut self, index: usize, end: QueueEnd) -> Option<Packet> {
        if !self.in_range(index) {
            return None;
        }
        self.queues[index].take(end)
    }

    /// 只作用于 0 号子队列，供追踪/统计钩子取样使用。
    pub fn remove(&mut self) -> Option<Packet> {
        self.queues[0].pop()
    }

    /// 只查看 0 号子队列的队头。
    pub fn peek(&self) -> Option<&Packet> {
        self.queues[0].peek()
    }
}
