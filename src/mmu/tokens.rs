//! 多层动态阈值的令牌桶
//!
//! 令牌按固定周期补充，共享池每释放一些字节就扣除令牌；余额为正时允许
//! 在组内主动驱逐一个超阈值的包。余额可以为负，补充时再慢慢还上。

use tracing::debug;

use crate::sim::SimTime;

use super::config::TokenConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmState {
    /// 还没有任何发送尝试。
    FirstInvocation,
    Armed,
    /// 显式停止后不再补充。
    Disarmed,
}

#[derive(Debug, Clone)]
pub struct TokenBucket {
    tokens: i64,
    max_tokens: i64,
    increment: i64,
    ceiling_bytes: u64,
    reference_pkt_bytes: u64,
    interval: SimTime,
    stop_after: Option<SimTime>,
    state: ArmState,
}

impl TokenBucket {
    pub fn new(cfg: &TokenConfig) -> Self {
        Self {
            tokens: 0,
            max_tokens: cfg.max_tokens,
            increment: cfg.increment,
            ceiling_bytes: cfg.ceiling_bytes.max(1),
            reference_pkt_bytes: cfg.reference_pkt_bytes,
            interval: SimTime::from_nanos(1),
            stop_after: cfg.stop_after_ns.map(SimTime::from_nanos),
            state: ArmState::FirstInvocation,
        }
    }

    pub fn tokens(&self) -> i64 {
        self.tokens
    }

    pub fn state(&self) -> ArmState {
        self.state
    }

    pub fn interval(&self) -> SimTime {
        self.interval
    }

    /// 补充周期：参考包在 `bandwidth_bps` 下的发送时间除以组内端口数，至少 1ns。
    pub fn refill_interval(&self, bandwidth_bps: u64, ports: usize) -> SimTime {
        let tx = SimTime::tx_time(self.reference_pkt_bytes, bandwidth_bps).as_nanos();
        SimTime::from_nanos((tx / ports.max(1) as u64).max(1))
    }

    /// 首次调用时进入 Armed 并返回补充周期，之后都返回 `None`。
    pub fn arm(&mut self, bandwidth_bps: u64, ports: usize) -> Option<SimTime> {
        if self.state != ArmState::FirstInvocation {
            return None;
        }
        self.state = ArmState::Armed;
        self.interval = self.refill_interval(bandwidth_bps, ports);
        debug!(interval = ?self.interval, "令牌桶启动");
        Some(self.interval)
    }

    pub fn disarm(&mut self) {
        self.state = ArmState::Disarmed;
    }

    /// 补充事件是否还应继续调度下一次。
    pub fn should_continue(&self, now: SimTime) -> bool {
        self.state == ArmState::Armed && self.stop_after.is_none_or(|stop| now < stop)
    }

    pub fn refill(&mut self) {
        self.tokens = (self.tokens + self.increment).min(self.max_tokens);
    }

    /// 按释放的字节扣除 `ceil(bytes / ceiling)` 个令牌。
    pub fn debit(&mut self, bytes: u64) {
        if bytes == 0 {
            return;
        }
        self.tokens -= bytes.div_ceil(self.ceiling_bytes) as i64;
    }

    pub fn can_evict(&self) -> bool {
        self.tokens > 0
    }
}
