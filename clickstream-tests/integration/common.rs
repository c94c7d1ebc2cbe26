//! Shared helpers for building configurations and running them in memory.

use std::collections::BTreeMap;

use clickstream_core::{Event, EventType, MemoryEventStore, SimulationConfig};
use clickstream_sim::{RunSummary, run_with_sink};

/// Configuration with a fixed run id, one day and the given extra sections.
pub fn config_with(sections: &str) -> SimulationConfig {
    config_for_days(1, sections)
}

pub fn config_for_days(num_days: u32, sections: &str) -> SimulationConfig {
    let text = format!(
        r#"
[run]
run_id = "itest"
seed = 1234
start_date = "2026-03-01"
num_days = {num_days}

[storage]
path = "unused.sqlite"

{sections}
"#
    );
    SimulationConfig::from_toml_str(&text).unwrap()
}

/// A small site with every terminal path reachable.
pub const SHOP: &str = r#"
[arrivals.baseline_arrivals]
daily_expected_intents = 300

[site_graph]
strict = true

[site_graph.pages.home]
dropoff_p = 0.2
transitions = [["product", 3.0], ["pricing", 1.0]]

[site_graph.pages.product]
dropoff_p = 0.25
transitions = [["cart", 1.0], ["home", 1.0]]

[site_graph.pages.pricing]
dropoff_p = 0.3
transitions = [["product", 1.0]]

[site_graph.pages.cart]
dropoff_p = 0.1
transitions = []

[sessions]
inactivity_timeout_minutes = 2
max_steps = 6

[sessions.inter_page_time]
dist = "exponential"
mean_seconds = 30

[conversion]
"#;

/// Runs `config` into a fresh in-memory store.
pub fn run_in_memory(config: &SimulationConfig) -> (RunSummary, Vec<Event>) {
    let store = MemoryEventStore::new();
    let summary = run_with_sink(config, Box::new(store.clone())).unwrap();
    (summary, store.events())
}

pub fn of_type(events: &[Event], event_type: EventType) -> Vec<&Event> {
    events.iter().filter(|e| e.event_type == event_type).collect()
}

/// Events grouped by session id, in emission order.
pub fn by_session(events: &[Event]) -> BTreeMap<String, Vec<&Event>> {
    let mut sessions: BTreeMap<String, Vec<&Event>> = BTreeMap::new();
    for event in events {
        if let Some(session_id) = &event.session_id {
            sessions.entry(session_id.clone()).or_default().push(event);
        }
    }
    sessions
}
