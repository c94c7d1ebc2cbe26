//! Tests for the deterministic kernel.

use proptest::prelude::*;

use crate::deterministic::{
    ChannelId, Process, ProcessContext, RandomSource, Scheduler, SimRng, SimulationError, Suspend,
};

/// Log of (time, label) pairs written by test processes.
type Trace = Vec<(f64, String)>;

struct Ticker {
    label: String,
    delays: Vec<f64>,
}

impl Ticker {
    fn new(label: &str, delays: &[f64]) -> Self {
        Self {
            label: label.to_string(),
            delays: delays.iter().rev().copied().collect(),
        }
    }
}

impl Process<Trace> for Ticker {
    fn name(&self) -> &str {
        &self.label
    }

    fn resume(&mut self, ctx: &mut ProcessContext<'_, Trace>) -> Result<Suspend, SimulationError> {
        let now = ctx.now();
        ctx.world.push((now, self.label.clone()));
        Ok(match self.delays.pop() {
            Some(delay) => Suspend::After(delay),
            None => Suspend::Finished,
        })
    }
}

const READY: ChannelId = ChannelId("test.ready");

struct Waiter {
    label: String,
    waited: bool,
}

impl Process<Trace> for Waiter {
    fn name(&self) -> &str {
        &self.label
    }

    fn resume(&mut self, ctx: &mut ProcessContext<'_, Trace>) -> Result<Suspend, SimulationError> {
        if !self.waited {
            self.waited = true;
            return Ok(Suspend::Wait(READY));
        }
        let now = ctx.now();
        ctx.world.push((now, self.label.clone()));
        Ok(Suspend::Finished)
    }
}

struct Notifier {
    at: f64,
    fired: bool,
}

impl Process<Trace> for Notifier {
    fn name(&self) -> &str {
        "notifier"
    }

    fn resume(&mut self, ctx: &mut ProcessContext<'_, Trace>) -> Result<Suspend, SimulationError> {
        if !self.fired {
            self.fired = true;
            return Ok(Suspend::Until(self.at));
        }
        ctx.notify(READY)?;
        let now = ctx.now();
        ctx.world.push((now, "notify".to_string()));
        Ok(Suspend::Finished)
    }
}

struct Parent {
    spawned: bool,
}

impl Process<Trace> for Parent {
    fn name(&self) -> &str {
        "parent"
    }

    fn resume(&mut self, ctx: &mut ProcessContext<'_, Trace>) -> Result<Suspend, SimulationError> {
        let now = ctx.now();
        ctx.world.push((now, "parent".to_string()));
        if self.spawned {
            return Ok(Suspend::Finished);
        }
        self.spawned = true;
        ctx.spawn(Ticker::new("child", &[]))?;
        Ok(Suspend::After(0.0))
    }
}

struct Failing;

impl Process<Trace> for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    fn resume(&mut self, _ctx: &mut ProcessContext<'_, Trace>) -> Result<Suspend, SimulationError> {
        Err(SimulationError::UnknownUser {
            user_id: "u_missing".to_string(),
        })
    }
}

fn labels(trace: &Trace) -> Vec<&str> {
    trace.iter().map(|(_, label)| label.as_str()).collect()
}

#[test]
fn test_equal_due_times_resume_fifo() {
    let mut sim = Scheduler::new(Trace::new());
    for label in ["a", "b", "c"] {
        sim.spawn(Ticker::new(label, &[5.0])).unwrap();
    }
    sim.run_until(10.0).unwrap();

    let trace = sim.world();
    assert_eq!(labels(trace), vec!["a", "b", "c", "a", "b", "c"]);
    assert!(trace[3..].iter().all(|(t, _)| *t == 5.0));
}

#[test]
fn test_clock_ends_at_horizon() {
    let mut sim = Scheduler::new(Trace::new());
    sim.spawn(Ticker::new("slow", &[100.0])).unwrap();

    let report = sim.run_until(50.0).unwrap();
    assert_eq!(sim.now(), 50.0);
    assert_eq!(report.resumptions, 1);
    assert_eq!(report.live_processes, 1);

    // Pending work survives to the next run
    let report = sim.run_until(200.0).unwrap();
    assert_eq!(report.resumptions, 1);
    assert_eq!(report.live_processes, 0);
    assert_eq!(sim.world().last().map(|(t, _)| *t), Some(100.0));
}

#[test]
fn test_wakeup_at_horizon_runs() {
    let mut sim = Scheduler::new(Trace::new());
    sim.spawn(Ticker::new("edge", &[10.0])).unwrap();
    sim.run_until(10.0).unwrap();
    assert_eq!(sim.world().len(), 2);
}

#[test]
fn test_spawned_child_runs_before_parent_reschedule() {
    let mut sim = Scheduler::new(Trace::new());
    sim.spawn(Parent { spawned: false }).unwrap();
    sim.run_until(1.0).unwrap();
    assert_eq!(labels(sim.world()), vec!["parent", "child", "parent"]);
    assert_eq!(sim.stats().spawned, 2);
    assert_eq!(sim.stats().finished, 2);
}

#[test]
fn test_wait_channel_wakes_in_arrival_order() {
    let mut sim = Scheduler::new(Trace::new());
    sim.spawn(Waiter {
        label: "first".to_string(),
        waited: false,
    })
    .unwrap();
    sim.spawn(Waiter {
        label: "second".to_string(),
        waited: false,
    })
    .unwrap();
    sim.spawn(Notifier {
        at: 3.0,
        fired: false,
    })
    .unwrap();

    sim.run_until(10.0).unwrap();
    // One notify wakes exactly one waiter
    assert_eq!(labels(sim.world()), vec!["notify", "first"]);
    assert_eq!(sim.world()[1].0, 3.0);
    assert_eq!(sim.live_processes(), 1);
}

#[test]
fn test_process_error_is_fatal() {
    let mut sim = Scheduler::new(Trace::new());
    sim.spawn(Ticker::new("before", &[1.0, 1.0])).unwrap();
    sim.spawn(Failing).unwrap();

    let result = sim.run_until(10.0);
    match result {
        Err(SimulationError::ProcessFailed { name, at, source }) => {
            assert_eq!(name, "failing");
            assert_eq!(at, 0.0);
            assert!(matches!(*source, SimulationError::UnknownUser { .. }));
        }
        other => panic!("expected ProcessFailed, got {other:?}"),
    }
    // Nothing after the failure ran
    assert_eq!(labels(sim.world()), vec!["before"]);
}

#[test]
fn test_negative_delay_is_rejected() {
    let mut sim = Scheduler::new(Trace::new());
    sim.spawn(Ticker::new("bad", &[-1.0])).unwrap();
    assert!(matches!(
        sim.run_until(5.0),
        Err(SimulationError::InvalidDelay { .. })
    ));
}

#[test]
fn test_horizon_cannot_move_backwards() {
    let mut sim = Scheduler::new(Trace::new());
    sim.run_until(5.0).unwrap();
    assert!(matches!(
        sim.run_until(1.0),
        Err(SimulationError::TimeReversal { .. })
    ));
}

struct Jitter {
    label: String,
    steps: u32,
}

impl Process<(Trace, SimRng)> for Jitter {
    fn name(&self) -> &str {
        &self.label
    }

    fn resume(
        &mut self,
        ctx: &mut ProcessContext<'_, (Trace, SimRng)>,
    ) -> Result<Suspend, SimulationError> {
        let now = ctx.now();
        let (trace, rng) = &mut *ctx.world;
        trace.push((now, self.label.clone()));
        if self.steps == 0 {
            return Ok(Suspend::Finished);
        }
        self.steps -= 1;
        // Coarse delays force frequent ties
        Ok(Suspend::After((rng.random() * 4.0).floor()))
    }
}

fn run_jitter(seed: u64, processes: u32) -> Trace {
    let mut sim = Scheduler::new((Trace::new(), SimRng::from_seed(seed)));
    for i in 0..processes {
        sim.spawn(Jitter {
            label: format!("j{i}"),
            steps: 20,
        })
        .unwrap();
    }
    sim.run_until(1_000.0).unwrap();
    sim.into_world().0
}

proptest! {
    #[test]
    fn prop_same_seed_same_trace(seed in any::<u64>(), processes in 1u32..8) {
        prop_assert_eq!(run_jitter(seed, processes), run_jitter(seed, processes));
    }

    #[test]
    fn prop_time_never_decreases(seed in any::<u64>(), processes in 1u32..8) {
        let trace = run_jitter(seed, processes);
        prop_assert!(trace.windows(2).all(|pair| pair[0].0 <= pair[1].0));
    }
}
