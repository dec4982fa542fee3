//! 共享缓冲计费
//!
//! 一个缓冲组（若干端口）共用一个 `BufferAccount`：共享池占用、按优先级
//! 汇总的占用、各 (端口, 优先级) 的饱和状态以及每个优先级的拥塞端口数。

use tracing::trace;

use crate::queue::QCNT;

use super::config::MmuConfig;

/// 阈值上限留出一个最大包的余量，避免比较时溢出。
pub const THRESHOLD_CAP: u32 = u32::MAX - 1500;

#[derive(Debug, Clone)]
pub struct BufferAccount {
    max_buffer: u64,
    used_buffer: u64,
    queue_alpha: [f64; QCNT],
    priority_alpha: [f64; QCNT],
    queue_to_priority: [usize; QCNT],
    priority_used: [u64; QCNT],
    /// `saturated[组内端口下标][子队列]`。
    saturated: Vec<[bool; QCNT]>,
    congestion: [u32; QCNT],
    ecn_threshold: Option<u64>,
    sent_bytes: u64,
}

/// 把一个非负实数换算成 32 位阈值，负数与 NaN 归零。
pub(crate) fn clamp_threshold(raw: f64) -> u32 {
    if raw.is_nan() || raw <= 0.0 {
        0
    } else if raw >= u32::MAX as f64 {
        u32::MAX
    } else {
        raw as u32
    }
}

impl BufferAccount {
    pub fn new(cfg: &MmuConfig, ports: usize) -> Self {
        Self {
            max_buffer: cfg.max_buffer_bytes,
            used_buffer: 0,
            queue_alpha: cfg.queue_alpha,
            priority_alpha: cfg.priority_alpha,
            queue_to_priority: cfg.queue_to_priority,
            priority_used: [0; QCNT],
            saturated: vec![[false; QCNT]; ports],
            congestion: [0; QCNT],
            ecn_threshold: cfg.ecn_threshold_bytes,
            sent_bytes: 0,
        }
    }

    pub fn max_buffer(&self) -> u64 {
        self.max_buffer
    }

    pub fn used_buffer(&self) -> u64 {
        self.used_buffer
    }

    /// 直接设置池大小与占用，主要给测试和外部校准用。
    pub fn set_buffer(&mut self, max: u64, used: u64) {
        self.max_buffer = max;
        self.used_buffer = used.min(max);
    }

    pub fn remaining(&self) -> u64 {
        self.max_buffer.saturating_sub(self.used_buffer)
    }

    pub fn ecn_threshold(&self) -> Option<u64> {
        self.ecn_threshold
    }

    pub fn queue_alpha(&self, queue: usize) -> f64 {
        self.queue_alpha[queue]
    }

    pub fn priority_of(&self, queue: usize) -> usize {
        self.queue_to_priority[queue]
    }

    /// 映射到 `queue` 所在优先级的所有子队列的共享占用之和。
    pub fn priority_used(&self, queue: usize) -> u64 {
        self.priority_used[self.priority_of(queue)]
    }

    /// 动态阈值：`alpha[queue] × 剩余空间`，不为负。
    pub fn queue_threshold(&self, queue: usize) -> u32 {
        self.threshold_with_alpha(self.queue_alpha[queue])
    }

    pub fn threshold_with_alpha(&self, alpha: f64) -> u32 {
        clamp_threshold(alpha * self.remaining() as f64)
    }

    /// 优先级阈值，可能超过 32 位。
    pub fn priority_threshold(&self, queue: usize) -> u64 {
        let raw = self.priority_alpha[self.priority_of(queue)] * self.remaining() as f64;
        if raw.is_nan() || raw <= 0.0 {
            0
        } else if raw >= u64::MAX as f64 {
            u64::MAX
        } else {
            raw as u64
        }
    }

    pub fn add_used(&mut self, size: u64, queue: usize) {
        self.used_buffer += size;
        debug_assert!(
            self.used_buffer <= self.max_buffer,
            "shared pool overcommitted: {} > {}",
            self.used_buffer,
            self.max_buffer
        );
        let p = self.priority_of(queue);
        self.priority_used[p] += size;
        trace!(size, queue, used = self.used_buffer, "共享池占用增加");
    }

    /// 释放共享占用。释放超过已占用量说明计费出错，直接 panic。
    pub fn delete_used(&mut self, size: u64, queue: usize) {
        let p = self.priority_of(queue);
        assert!(
            size <= self.used_buffer && size <= self.priority_used[p],
            "shared pool underflow: releasing {size} from used={} priority[{p}]={}",
            self.used_buffer,
            self.priority_used[p]
        );
        self.used_buffer -= size;
        self.priority_used[p] -= size;
        self.sent_bytes += size;
        trace!(size, queue, used = self.used_buffer, "共享池占用释放");
    }

    /// 经由共享池发出（或被驱逐）的累计字节数。
    pub fn sent_bytes(&self) -> u64 {
        self.sent_bytes
    }

    /// 设置 (端口, 子队列) 的饱和位，变化时调整子队列所属优先级的计数。
    /// 重复设置同一个值不改变计数。
    pub fn set_saturated(&mut self, port: usize, queue: usize, saturated: bool) {
        if port >= self.saturated.len() {
            self.saturated.resize(port + 1, [false; QCNT]);
        }
        let slot = &mut self.saturated[port][queue];
        if *slot == saturated {
            return;
        }
        *slot = saturated;
        let priority = self.queue_to_priority[queue];
        if saturated {
            self.congestion[priority] += 1;
        } else {
            self.congestion[priority] -= 1;
        }
        trace!(port, queue, priority, saturated, n = self.congestion[priority], "饱和状态变化");
    }

    pub fn is_saturated(&self, port: usize, queue: usize) -> bool {
        self.saturated.get(port).is_some_and(|row| row[queue])
    }

    /// 映射到该优先级的饱和 (端口, 子队列) 个数。
    pub fn congestion(&self, priority: usize) -> u32 {
        self.congestion[priority]
    }

    /// 用作除数的拥塞端口数，至少为 1。
    pub fn congestion_divisor(&self, priority: usize) -> u32 {
        self.congestion[priority].max(1)
    }
}
