//! Event records produced by the simulation.
//!
//! Every component emits the same fixed-shape [`Event`]. Fields that do not
//! apply to an event type stay `None`, and anything that does not fit a
//! column goes into the optional payload map, which is encoded with sorted
//! keys so identical maps always serialize to identical text.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::canonical_json;

/// Free-form metadata attached to an event. Sorted by key.
pub type Payload = BTreeMap<String, Value>;

/// Kinds of events written to the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RunStarted,
    RunFinished,
    SessionIntent,
    UserCreated,
    SessionStart,
    PageView,
    DropOff,
    Conversion,
    SessionEnd,
}

impl EventType {
    /// Column value stored in `event_type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::RunStarted => "run_started",
            EventType::RunFinished => "run_finished",
            EventType::SessionIntent => "session_intent",
            EventType::UserCreated => "user_created",
            EventType::SessionStart => "session_start",
            EventType::PageView => "page_view",
            EventType::DropOff => "drop_off",
            EventType::Conversion => "conversion",
            EventType::SessionEnd => "session_end",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single row of the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub run_id: String,
    pub event_id: String,
    pub ts_utc: DateTime<Utc>,
    pub sim_time_s: f64,
    pub event_type: EventType,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub intent_source: Option<String>,
    pub channel: Option<String>,
    pub page: Option<String>,
    pub value_num: Option<f64>,
    pub value_str: Option<String>,
    pub payload: Option<Payload>,
}

impl Event {
    /// Completes a draft with the identity and timing assigned at emission.
    pub fn from_draft(
        draft: EventDraft,
        run_id: impl Into<String>,
        event_id: impl Into<String>,
        ts_utc: DateTime<Utc>,
        sim_time_s: f64,
    ) -> Self {
        let payload = if draft.payload.is_empty() {
            None
        } else {
            Some(draft.payload)
        };

        Self {
            run_id: run_id.into(),
            event_id: event_id.into(),
            ts_utc,
            sim_time_s,
            event_type: draft.event_type,
            user_id: draft.user_id,
            session_id: draft.session_id,
            intent_source: draft.intent_source,
            channel: draft.channel,
            page: draft.page,
            value_num: draft.value_num,
            value_str: draft.value_str,
            payload,
        }
    }

    /// Compact sorted-key JSON of the payload, or `None` when there is none.
    pub fn payload_json(&self) -> Option<String> {
        self.payload
            .as_ref()
            .filter(|payload| !payload.is_empty())
            .map(|payload| {
                let object: serde_json::Map<String, Value> = payload
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                canonical_json(&Value::Object(object))
            })
    }

    /// Timestamp as stored in cold storage.
    pub fn ts_utc_text(&self) -> String {
        self.ts_utc
            .to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
    }
}

/// The domain part of an event, before the emitter stamps identity and time.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub event_type: EventType,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub intent_source: Option<String>,
    pub channel: Option<String>,
    pub page: Option<String>,
    pub value_num: Option<f64>,
    pub value_str: Option<String>,
    pub payload: Payload,
}

impl EventDraft {
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            user_id: None,
            session_id: None,
            intent_source: None,
            channel: None,
            page: None,
            value_num: None,
            value_str: None,
            payload: Payload::new(),
        }
    }

    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Sets intent source and channel together; session events always carry both.
    pub fn origin(mut self, intent_source: impl Into<String>, channel: impl Into<String>) -> Self {
        self.intent_source = Some(intent_source.into());
        self.channel = Some(channel.into());
        self
    }

    pub fn page(mut self, page: impl Into<String>) -> Self {
        self.page = Some(page.into());
        self
    }

    pub fn value_num(mut self, value: f64) -> Self {
        self.value_num = Some(value);
        self
    }

    pub fn value_str(mut self, value: impl Into<String>) -> Self {
        self.value_str = Some(value.into());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Merges every entry of `payload`, overwriting existing keys.
    pub fn with_payload(mut self, payload: &Payload) -> Self {
        self.payload
            .extend(payload.iter().map(|(key, value)| (key.clone(), value.clone())));
        self
    }
}
