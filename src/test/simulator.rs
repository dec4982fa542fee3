use crate::sim::{Event, SimTime, Simulator, World};
use std::any::Any;

/// 记录事件执行顺序的世界；事件像 `NetWorld` 的事件一样向下转型后写入。
#[derive(Default)]
struct LogWorld {
    seen: Vec<(u64, u32)>,
    ticks: usize,
}

impl World for LogWorld {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn on_tick(&mut self, _sim: &mut Simulator) {
        self.ticks += 1;
    }
}

fn log_world(world: &mut dyn World) -> &mut LogWorld {
    world
        .as_any_mut()
        .downcast_mut::<LogWorld>()
        .expect("world must be LogWorld")
}

/// 把 (当前时间, id) 记到世界里。
struct Mark(u32);

impl Event for Mark {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        log_world(world).seen.push((sim.now().as_nanos(), self.0));
    }
}

/// 记录自己后在 `delay` 之后调度下一个 `Mark`，类似周期任务的续期。
struct MarkThenFollow {
    id: u32,
    next: u32,
    delay: SimTime,
}

impl Event for MarkThenFollow {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        log_world(world).seen.push((sim.now().as_nanos(), self.id));
        sim.schedule_in(self.delay, Mark(self.next));
    }
}

#[test]
fn events_run_by_time_and_ties_keep_insertion_order() {
    let mut sim = Simulator::default();
    sim.schedule(SimTime(10), Mark(1));
    sim.schedule(SimTime(5), Mark(2));
    sim.schedule(SimTime(10), Mark(3));
    assert_eq!(sim.pending(), 3);

    let mut world = LogWorld::default();
    sim.run(&mut world);

    assert_eq!(world.seen, vec![(5, 2), (10, 1), (10, 3)]);
    assert_eq!(world.ticks, 3);
    assert_eq!(sim.executed(), 3);
    assert_eq!(sim.now(), SimTime(10));
}

#[test]
fn follow_up_at_the_same_instant_runs_after_the_current_event() {
    let mut sim = Simulator::default();
    sim.schedule(
        SimTime(4),
        MarkThenFollow {
            id: 1,
            next: 2,
            delay: SimTime::ZERO,
        },
    );
    sim.schedule(SimTime(4), Mark(3));

    let mut world = LogWorld::default();
    sim.run(&mut world);

    // 续期的事件序号更大，排在同一时刻已有的事件之后
    assert_eq!(world.seen, vec![(4, 1), (4, 3), (4, 2)]);
}

#[test]
fn run_until_includes_the_boundary_and_leaves_later_events_pending() {
    let mut sim = Simulator::default();
    sim.schedule(SimTime::ZERO, Mark(1));
    sim.schedule(SimTime(5), Mark(2));
    sim.schedule(SimTime(6), Mark(3));

    let mut world = LogWorld::default();
    sim.run_until(SimTime(5), &mut world);
    assert_eq!(world.seen, vec![(0, 1), (5, 2)]);
    assert_eq!(sim.pending(), 1);
    assert_eq!(sim.now(), SimTime(5));

    sim.run_until(SimTime(20), &mut world);
    assert_eq!(world.seen.last(), Some(&(6, 3)));
    // 没有事件时时钟也推进到边界
    assert_eq!(sim.now(), SimTime(20));
}

#[test]
fn periodic_follow_ups_only_run_inside_the_horizon() {
    let mut sim = Simulator::default();
    sim.schedule(
        SimTime(100),
        MarkThenFollow {
            id: 1,
            next: 2,
            delay: SimTime(50),
        },
    );

    let mut world = LogWorld::default();
    sim.run_until(SimTime(120), &mut world);
    assert_eq!(world.seen, vec![(100, 1)]);
    assert_eq!(sim.pending(), 1);

    assert_eq!(sim.clear(), 1);
    sim.run(&mut world);
    assert_eq!(world.seen.len(), 1);
}

#[test]
fn scheduling_in_the_past_runs_at_current_time() {
    let mut sim = Simulator::default();
    let mut world = LogWorld::default();
    sim.run_until(SimTime(100), &mut world);
    sim.schedule(SimTime(10), Mark(1));
    sim.run(&mut world);

    assert_eq!(world.seen, vec![(100, 1)]);
    assert_eq!(sim.now(), SimTime(100));
}

#[test]
fn clear_discards_pending_events() {
    let mut sim = Simulator::default();
    for id in 0..3 {
        sim.schedule_in(SimTime(u64::from(id)), Mark(id));
    }
    assert_eq!(sim.clear(), 3);
    assert_eq!(sim.pending(), 0);

    let mut world = LogWorld::default();
    sim.run(&mut world);
    assert!(world.seen.is_empty());
    assert_eq!(world.ticks, 0);
    assert_eq!(sim.executed(), 0);
}
