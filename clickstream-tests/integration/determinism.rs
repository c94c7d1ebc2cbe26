//! Reproducibility of whole runs.

use clickstream_core::{Event, EventType, SimulationConfig};
use proptest::prelude::*;

use crate::common::{SHOP, config_for_days, config_with, of_type, run_in_memory};

type Row = (
    String,
    String,
    f64,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<f64>,
    Option<String>,
    Option<String>,
);

fn rows(events: &[Event]) -> Vec<Row> {
    events
        .iter()
        .map(|e| {
            (
                e.event_id.clone(),
                e.event_type.as_str().to_string(),
                e.sim_time_s,
                e.user_id.clone(),
                e.session_id.clone(),
                e.page.clone(),
                e.value_num,
                e.value_str.clone(),
                e.payload_json(),
            )
        })
        .collect()
}
