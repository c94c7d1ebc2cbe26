//! Returning-user selection.

use chrono::{Duration, TimeZone, Utc};
use clickstream_core::config::{UserSelectionConfig, UsersConfig};
use clickstream_core::EventType;
use clickstream_sim::{SimRng, UserStateStore};

use crate::common::{config_with, of_type, run_in_memory};

fn share_config(share: f64) -> String {
    format!(
        r#"
[arrivals.baseline_arrivals]
daily_expected_intents = 150

[users]
new_user_share = {share:?}
"#
    )
}
