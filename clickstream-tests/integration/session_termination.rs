//! Every session ends once, for a known reason, and nothing follows its end.

use clickstream_core::{Event, EventType};
use clickstream_sim::SessionEndReason;

use crate::common::{SHOP, by_session, config_with, of_type, run_in_memory};

const FEW_ARRIVALS: &str = r#"
[arrivals.baseline_arrivals]
daily_expected_intents = 40
"#;

fn sessions_config(pages: &str, sessions: &str) -> String {
    format!("{FEW_ARRIVALS}\n[site_graph]\nstrict = true\n\n{pages}\n[sessions]\n{sessions}\n")
}

fn end_reasons(events: &[Event]) -> Vec<String> {
    of_type(events, EventType::SessionEnd)
        .iter()
        .map(|e| e.value_str.clone().unwrap())
        .collect()
}
