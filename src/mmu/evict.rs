//! 主动驱逐：轮询队头丢弃与令牌驱逐

use tracing::trace;

use crate::sim::SimTime;

use super::switch::{EvictCause, SharedBufferSwitch};

impl SharedBufferSwitch {
    /// 子队列的共享占用是否已经超过阈值。
    pub fn over_threshold(&self, port: usize, index: usize) -> bool {
        self.ports[port].occupancy(index) > self.port_threshold(crate::net::PortId(port), index) as u64
    }

    /// 出队前的检查：从端口的轮询位置开始扫描子队列，驱逐超阈值的包。
    ///
    /// 同组内两次驱逐至少间隔 `head_drop_interval_ns`；一轮扫描没有发现
    /// 超阈值的队列时，把轮询位置移到扫描结束处的下一个。
    pub(crate) fn head_drop_check(&mut self, port: usize, now: SimTime) {
        let interval = SimTime::from_nanos(self.config().head_drop_interval_ns);
        let gid = self.ports[port].group.0;
        let n = self.ports[port].queue.active();
        loop {
            let start = self.ports[port].head_drop_cursor;
            let mut found = false;
            let mut check = start;
            for i in 0..n {
                check = (start + i) % n;
                if !self.over_threshold(port, check) {
                    continue;
                }
                found = true;
                if let Some(last) = self.groups[gid].last_head_drop {
                    if now.since(last) < interval {
                        trace!(port, check, "队头丢弃仍在冷却");
                        return;
                    }
                }
                if self.evict(port, check, EvictCause::HeadDrop, now).is_some() {
                    self.groups[gid].last_head_drop = Some(now);
                }
            }
            if !found {
                self.ports[port].head_drop_cursor = (check + 1) % n;
                break;
            }
        }
    }

    /// 令牌驱逐：从上次驱逐的位置之后按 (端口, 子队列) 轮询整个组，
    /// 驱逐第一个超阈值子队列的一个包。
    pub(crate) fn token_sweep(&mut self, group: usize, now: SimTime) {
        let range = self.groups[group].ports.clone();
        let (lp, lq) = self.groups[group].evict_cursor;
        let (mut p, mut q) = (lp, lq);
        loop {
            q += 1;
            if q >= self.ports[p].queue.active() {
                q = 0;
                p += 1;
                if p >= range.end {
                    p = range.start;
                }
            }
            if self.over_threshold(p, q) && self.evict(p, q, EvictCause::Token, now).is_some() {
                self.groups[group].evict_cursor = (p, q);
                return;
            }
            if (p, q) == (lp, lq) {
                return;
            }
        }
    }

    /// 长队列令牌驱逐：只看组内最长的子队列。
    pub(crate) fn long_token_sweep(&mut self, group: usize, now: SimTime) {
        let first = self.groups[group].ports.start;
        let (port, index, longest) = self.longest_in_group(first);
        if longest <= self.config().static_buffer_bytes {
            return;
        }
        if self.over_threshold(port, index) {
            self.evict(port, index, EvictCause::LongToken, now);
        }
    }
}
