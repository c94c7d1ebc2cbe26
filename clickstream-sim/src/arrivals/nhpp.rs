//! Non-homogeneous Poisson arrivals sampled by thinning.
//!
//! Candidates are drawn at the dominating rate implied by the peak of the
//! intraday shape and accepted with probability `shape(t) / shape_max`.
//! Each day is sampled independently: a candidate past the end of the day
//! is discarded and sampling resumes at the next day boundary.

use clickstream_core::config::{BaselineArrivalsConfig, IntradayCurveConfig};
use clickstream_core::Payload;

use crate::deterministic::{Process, ProcessContext, RandomSource, SimulationError, Suspend};
use crate::intents::{INTENTS_AVAILABLE, QueueFull, SPACE_AVAILABLE, SessionIntent};
use crate::world::SimWorld;

pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Default resolution of the intraday grid.
pub const DEFAULT_GRID_MINUTES: u32 = 1;

const BASELINE_SOURCE: &str = "baseline";
const BASELINE_CHANNEL: &str = "direct";

/// Intraday intensity shape tabulated on a fixed grid.
#[derive(Debug, Clone, PartialEq)]
pub struct IntradayShape {
    grid_minutes: u32,
    values: Vec<f64>,
    max: f64,
    integral_hours: f64,
}

impl IntradayShape {
    /// Tabulates `floor + exp(-0.5 * ((hour - peak) / spread)^2)` at the
    /// midpoint of every grid bucket.
    ///
    /// # Errors
    ///
    /// - `SimulationError::InvalidModel` - If the spread or grid is not positive,
    ///   or the shape integrates to zero
    pub fn gaussian(curve: &IntradayCurveConfig, grid_minutes: u32) -> Result<Self, SimulationError> {
        let invalid = |reason: String| SimulationError::InvalidModel {
            component: "arrivals",
            reason,
        };
        if curve.spread_hours.is_nan() || curve.spread_hours <= 0.0 {
            return Err(invalid(format!(
                "spread_hours must be > 0, got {}",
                curve.spread_hours
            )));
        }
        let buckets = 24 * 60 / grid_minutes.max(1);
        if grid_minutes == 0 || buckets == 0 {
            return Err(invalid(format!("invalid grid of {grid_minutes} minutes")));
        }

        let values: Vec<f64> = (0..buckets)
            .map(|i| {
                let hour = (f64::from(i) + 0.5) * f64::from(grid_minutes) / 60.0;
                let z = (hour - curve.peak_hour) / curve.spread_hours;
                curve.floor + (-0.5 * z * z).exp()
            })
            .collect();
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let integral_hours = values.iter().sum::<f64>() * f64::from(grid_minutes) / 60.0;
        if integral_hours.is_nan() || integral_hours <= 0.0 || max <= 0.0 {
            return Err(invalid(format!(
                "intraday curve must integrate to > 0, got {integral_hours}"
            )));
        }

        Ok(Self {
            grid_minutes,
            values,
            max,
            integral_hours,
        })
    }

    /// Shape value of the bucket containing `second_in_day`.
    pub fn at_second(&self, second_in_day: f64) -> f64 {
        let second = second_in_day.clamp(0.0, SECONDS_PER_DAY - 1e-9);
        let idx = (second / 60.0 / f64::from(self.grid_minutes)) as usize;
        self.values[idx.min(self.values.len() - 1)]
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Approximate integral of the shape over the day, in shape-hours.
    pub fn integral_hours(&self) -> f64 {
        self.integral_hours
    }
}

#[derive(Debug)]
enum State {
    Sampling,
    /// Accepted candidate waiting for its arrival time
    Arriving,
    /// Intent rejected by a full queue
    Blocked(SessionIntent),
}

/// Baseline arrivals process.
#[derive(Debug)]
pub struct NhppArrivals {
    daily_expected: f64,
    shape: IntradayShape,
    /// Dominating rate in intents per second
    rate_max: f64,
    num_days: u32,
    day: u32,
    /// Time of the latest candidate
    cursor: f64,
    state: State,
}

impl NhppArrivals {
    /// # Errors
    ///
    /// - `SimulationError::InvalidModel` - If the expected count is not finite or the
    ///   intraday shape is invalid
    pub fn new(config: &BaselineArrivalsConfig, num_days: u32) -> Result<Self, SimulationError> {
        Self::with_grid(config, num_days, DEFAULT_GRID_MINUTES)
    }

    /// # Errors
    ///
    /// See [`NhppArrivals::new`].
    pub fn with_grid(
        config: &BaselineArrivalsConfig,
        num_days: u32,
        grid_minutes: u32,
    ) -> Result<Self, SimulationError> {
        let daily_expected = config.daily_expected_intents;
        if !daily_expected.is_finite() {
            return Err(SimulationError::InvalidModel {
                component: "arrivals",
                reason: format!("daily_expected_intents must be finite, got {daily_expected}"),
            });
        }

        let shape = IntradayShape::gaussian(&config.intraday_curve, grid_minutes)?;
        let rate_max = daily_expected * shape.max() / shape.integral_hours() / 3600.0;

        Ok(Self {
            daily_expected,
            shape,
            rate_max,
            num_days,
            day: 0,
            cursor: 0.0,
            state: State::Sampling,
        })
    }

    /// Dominating rate in intents per second.
    pub fn rate_max(&self) -> f64 {
        self.rate_max
    }

    pub fn shape(&self) -> &IntradayShape {
        &self.shape
    }

    /// Draws candidates until one is accepted or the day runs out.
    fn sample(&mut self, now: f64, rng: &mut dyn RandomSource) -> Suspend {
        loop {
            let day_start = f64::from(self.day) * SECONDS_PER_DAY;
            let day_end = day_start + SECONDS_PER_DAY;

            let candidate = self.cursor + rng.expovariate(self.rate_max);
            if candidate >= day_end {
                self.day += 1;
                self.cursor = day_end;
                if self.day >= self.num_days {
                    tracing::debug!(days = self.num_days, "Baseline arrivals finished");
                    return Suspend::Finished;
                }
                return Suspend::Until(day_end.max(now));
            }

            self.cursor = candidate;
            let accept_p = self.shape.at_second(candidate - day_start) / self.shape.max();
            if rng.random() < accept_p {
                self.state = State::Arriving;
                return Suspend::Until(candidate.max(now));
            }
        }
    }

    fn publish(
        &mut self,
        ctx: &mut ProcessContext<'_, SimWorld>,
        intent: SessionIntent,
    ) -> Result<bool, SimulationError> {
        match ctx.world.intents.try_publish(intent) {
            Ok(()) => {
                ctx.world.stats.intents_published += 1;
                ctx.notify(INTENTS_AVAILABLE)?;
                self.state = State::Sampling;
                Ok(true)
            }
            Err(QueueFull(intent)) => {
                tracing::trace!(intent_id = %intent.intent_id, "Intent queue full, producer blocked");
                self.state = State::Blocked(intent);
                Ok(false)
            }
        }
    }

    fn new_intent(world: &mut SimWorld, now: f64) -> SessionIntent {
        SessionIntent {
            intent_id: world.ids.next_id("intent"),
            ts_utc: world.run.timestamp_at(now),
            sim_time_s: now,
            intent_source: BASELINE_SOURCE.to_string(),
            channel: BASELINE_CHANNEL.to_string(),
            audience_id: None,
            payload: Payload::new(),
        }
    }
}

impl Process<SimWorld> for NhppArrivals {
    fn name(&self) -> &str {
        "baseline_arrivals"
    }

    fn resume(&mut self, ctx: &mut ProcessContext<'_, SimWorld>) -> Result<Suspend, SimulationError> {
        if self.daily_expected <= 0.0 || self.rate_max.is_nan() || self.rate_max <= 0.0 || self.num_days == 0 {
            return Ok(Suspend::Finished);
        }

        let now = ctx.now();
        match std::mem::replace(&mut self.state, State::Sampling) {
            State::Sampling => {}
            State::Arriving => {
                let intent = Self::new_intent(ctx.world, now);
                if !self.publish(ctx, intent)? {
                    return Ok(Suspend::Wait(SPACE_AVAILABLE));
                }
            }
            State::Blocked(intent) => {
                if !self.publish(ctx, intent)? {
                    return Ok(Suspend::Wait(SPACE_AVAILABLE));
                }
            }
        }

        Ok(self.sample(now, &mut *ctx.world.rng))
    }
}

#[cfg(test)]
mod tests {
    use clickstream_core::MemoryEventStore;

    use super::*;
    use crate::deterministic::{Scheduler, SimRng};
    use crate::intents::IntentQueue;

    fn config(daily: f64, peak: f64, spread: f64) -> BaselineArrivalsConfig {
        BaselineArrivalsConfig {
            daily_expected_intents: daily,
            intraday_curve: IntradayCurveConfig {
                peak_hour: peak,
                spread_hours: spread,
                floor: 0.05,
            },
            ..BaselineArrivalsConfig::default()
        }
    }

    fn run(config: &BaselineArrivalsConfig, days: u32, capacity: Option<usize>) -> Scheduler<SimWorld> {
        let store = MemoryEventStore::new();
        let mut world = SimWorld::for_tests(Box::new(SimRng::from_seed(2024)), &store);
        world.intents = IntentQueue::new(capacity);
        let mut scheduler = Scheduler::new(world);
        scheduler.spawn(NhppArrivals::new(config, days).unwrap()).unwrap();
        scheduler.run_until(f64::from(days) * SECONDS_PER_DAY).unwrap();
        scheduler
    }

    fn arrival_times(scheduler: &mut Scheduler<SimWorld>) -> Vec<f64> {
        std::iter::from_fn(|| scheduler.world_mut().intents.try_take())
            .map(|intent| intent.sim_time_s)
            .collect()
    }

    #[test]
    fn test_shape_peaks_at_configured_hour() {
        let shape = IntradayShape::gaussian(&config(1.0, 12.0, 3.0).intraday_curve, 1).unwrap();
        assert!((shape.max() - 1.05).abs() < 1e-3);
        assert!(shape.at_second(12.0 * 3600.0) > shape.at_second(3.0 * 3600.0));
        assert_eq!(shape.at_second(-5.0), shape.at_second(0.0));
        assert_eq!(shape.at_second(1e9), shape.at_second(SECONDS_PER_DAY - 1.0));
        // floor * 24h plus the Gaussian area sqrt(2 pi) * spread
        let expected = 0.05 * 24.0 + (2.0 * std::f64::consts::PI).sqrt() * 3.0;
        assert!((shape.integral_hours() - expected).abs() < 0.01);
    }

    #[test]
    fn test_invalid_shapes_are_rejected() {
        assert!(IntradayShape::gaussian(&config(1.0, 12.0, 0.0).intraday_curve, 1).is_err());
        assert!(IntradayShape::gaussian(&config(1.0, 12.0, 3.0).intraday_curve, 0).is_err());
        assert!(NhppArrivals::new(&config(f64::NAN, 12.0, 3.0), 1).is_err());
    }

    #[test]
    fn test_zero_expected_intents_emit_nothing() {
        let mut scheduler = run(&config(0.0, 12.0, 3.0), 3, None);
        assert!(arrival_times(&mut scheduler).is_empty());
        assert_eq!(scheduler.world().stats.intents_published, 0);
        assert_eq!(scheduler.now(), 3.0 * SECONDS_PER_DAY);
    }

    #[test]
    fn test_negative_expected_intents_emit_nothing() {
        let mut scheduler = run(&config(-5.0, 12.0, 3.0), 2, None);
        assert!(arrival_times(&mut scheduler).is_empty());
        assert_eq!(scheduler.now(), 2.0 * SECONDS_PER_DAY);
    }

    #[test]
    fn test_arrivals_follow_intraday_peak() {
        let mut scheduler = run(&config(800.0, 12.0, 2.5), 1, None);
        let times = arrival_times(&mut scheduler);

        let in_window = |from: f64, to: f64| {
            times
                .iter()
                .filter(|&&t| t >= from * 3600.0 && t < to * 3600.0)
                .count()
        };
        assert!(in_window(11.0, 13.0) > in_window(2.0, 4.0));
        assert!((600..1000).contains(&times.len()), "got {} intents", times.len());
    }

    #[test]
    fn test_arrivals_are_ordered_and_within_horizon() {
        let mut scheduler = run(&config(200.0, 12.0, 3.0), 3, None);
        let times = arrival_times(&mut scheduler);
        assert!(times.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(times.iter().all(|&t| (0.0..3.0 * SECONDS_PER_DAY).contains(&t)));

        for day in 0..3 {
            let start = f64::from(day) * SECONDS_PER_DAY;
            assert!(times.iter().any(|&t| t >= start && t < start + SECONDS_PER_DAY));
        }
    }

    #[test]
    fn test_intents_are_baseline_direct() {
        let mut scheduler = run(&config(50.0, 12.0, 3.0), 1, None);
        let world = scheduler.world_mut();
        let first = world.intents.try_take().unwrap();
        assert_eq!(first.intent_source, "baseline");
        assert_eq!(first.channel, "direct");
        assert_eq!(first.intent_id, "intent_test_00000001");
        assert_eq!(first.ts_utc, world.run.timestamp_at(first.sim_time_s));
    }

    #[test]
    fn test_full_queue_blocks_producer() {
        let mut scheduler = run(&config(200.0, 12.0, 3.0), 1, Some(1));
        let world = scheduler.world();
        assert_eq!(world.intents.len(), 1);
        assert_eq!(world.stats.intents_published, 1);
        // Producer is parked on the space channel
        assert_eq!(scheduler.live_processes(), 1);
    }
}
