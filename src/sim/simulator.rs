//! 仿真器
//!
//! 维护当前时间与事件队列；所有事件在同一线程内按因果顺序逐个执行完毕。

use super::event::Event;
use super::scheduled_event::ScheduledEvent;
use super::time::SimTime;
use super::world::World;
use std::collections::BinaryHeap;
use tracing::{debug, info, trace};

#[derive(Default)]
pub struct Simulator {
    now: SimTime,
    next_seq: u64,
    executed: u64,
    q: BinaryHeap<ScheduledEvent>,
}

impl Simulator {
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// 尚未执行的事件数量。
    pub fn pending(&self) -> usize {
        self.q.len()
    }

    /// 已执行的事件总数。
    pub fn executed(&self) -> u64 {
        self.executed
    }

    /// 在绝对时间 `at` 调度事件。早于当前时间的请求按当前时间处理。
    pub fn schedule<E: Event>(&mut self, at: SimTime, ev: E) {
        let at = at.max(self.now);
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        let label = std::any::type_name::<E>();
        trace!(now = ?self.now, at = ?at, seq, event_type = label, "调度事件");
        self.q.push(ScheduledEvent {
            at,
            seq,
            label,
            ev: Box::new(ev),
        });
    }

    /// 在 `delay` 之后调度事件。
    pub fn schedule_in<E: Event>(&mut self, delay: SimTime, ev: E) {
        let at = self.now + delay;
        self.schedule(at, ev);
    }

    /// 丢弃所有待执行事件，返回被丢弃的数量。
    ///
    /// 仿真拆除时显式调用；周期性任务不会因此自动停下来，它们的
    /// 拥有者需要先解除武装。
    pub fn clear(&mut self) -> usize {
        let n = self.q.len();
        self.q.clear();
        debug!(discarded = n, "清空事件队列");
        n
    }

    fn step(&mut self, item: ScheduledEvent, world: &mut dyn World) {
        self.now = item.at;
        self.executed = self.executed.wrapping_add(1);
        trace!(now = ?self.now, seq = item.seq, event_type = item.label, "执行事件");
        item.ev.execute(self, world);
        world.on_tick(self);
    }

    /// 运行直到事件队列为空或到达 `until`（含 `until` 时刻的事件）。
    pub fn run_until(&mut self, until: SimTime, world: &mut dyn World) {
        while let Some(top) = self.q.peek() {
            if top.at > until {
                break;
            }
            let Some(item) = self.q.pop() else { break };
            self.step(item, world);
        }
        self.now = self.now.max(until);
    }

    /// 运行所有事件直到队列为空。
    #[tracing::instrument(skip(self, world))]
    pub fn run(&mut self, world: &mut dyn World) {
        info!(pending = self.q.len(), "▶️  开始运行仿真");
        let start = self.executed;
        while let Some(item) = self.q.pop() {
            self.step(item, world);
        }
        info!(
            total_events = self.executed - start,
            final_time = ?self.now,
            "✅ 仿真完成"
        );
    }
}
