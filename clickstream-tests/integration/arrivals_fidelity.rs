//! Arrival volume and intraday shape as seen in the event log.

use clickstream_core::{Event, EventType};

use crate::common::{config_for_days, config_with, of_type, run_in_memory};

fn hour_of_day(event: &Event) -> f64 {
    (event.sim_time_s % 86_400.0) / 3600.0
}

fn arrivals(daily: f64, extra: &str) -> String {
    format!(
        r#"
[arrivals.baseline_arrivals]
model = "nhpp"
daily_expected_intents = {daily}

[arrivals.baseline_arrivals.intraday_curve]
peak_hour = 12.0
spread_hours = 2.5
floor = 0.05

{extra}
"#
    )
}
