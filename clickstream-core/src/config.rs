//! Centralized configuration for Clickstream.
//!
//! The run configuration is read from a TOML document. `run` and `storage`
//! are required; every feature section is optional and its absence disables
//! the feature without error. All checks run eagerly in
//! [`SimulationConfig::validate`] so a bad configuration aborts the run before
//! any simulated time advances.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use sha1::{Digest, Sha1};

use crate::canonical::canonical_json;
use crate::tracing_setup::CliLogLevel;

/// Number of hex characters kept from the configuration digest.
pub const RUN_ID_LENGTH: usize = 12;

/// Literal `run_id` that requests derivation from the configuration content.
pub const AUTO_RUN_ID: &str = "auto";

/// Configuration loading and validation failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read from disk
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        /// Path that was requested
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Document is not valid TOML or does not match the expected shape
    #[error("Failed to parse config: {reason}")]
    Parse {
        /// Parser message, including unsupported model or distribution names
        reason: String,
    },

    /// A field holds a value outside its allowed range
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        /// Dotted path of the offending field
        field: String,
        /// Why the value was rejected
        reason: String,
    },

    /// Start date could not be interpreted
    #[error("Invalid start_date {value:?}: expected YYYY-MM-DD or RFC 3339")]
    InvalidStartDate {
        /// Raw start date string
        value: String,
    },
}

impl ConfigError {
    fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Complete run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub run: RunConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub arrivals: Option<ArrivalsConfig>,
    #[serde(default)]
    pub users: Option<UsersConfig>,
    #[serde(default)]
    pub site_graph: Option<SiteGraphConfig>,
    #[serde(default)]
    pub sessions: Option<SessionsConfig>,
    #[serde(default)]
    pub conversion: Option<ConversionConfig>,
    #[serde(default)]
    pub intent_resolver: Option<IntentResolverConfig>,
    /// Parsed source document, kept for run-id derivation.
    #[serde(skip)]
    raw: serde_json::Value,
}

/// Run identity and horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_run_id")]
    pub run_id: String,
    pub seed: u64,
    pub start_date: String,
    pub num_days: u32,
}

fn default_run_id() -> String {
    AUTO_RUN_ID.to_string()
}

/// Cold storage location and flush policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(alias = "duckdb_path", alias = "sqlite_path")]
    pub path: PathBuf,
    #[serde(default = "default_true")]
    pub clean_slate: bool,
    #[serde(default)]
    pub flush: FlushConfig,
}

/// Flush thresholds for the persistence buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlushConfig {
    /// Flush as soon as this many events are buffered (0 disables the count trigger)
    pub every_n_events: usize,
    /// Logical seconds between timer flushes
    pub or_every_seconds: f64,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            every_n_events: 5000,
            or_every_seconds: 30.0,
        }
    }
}

/// Diagnostic logging level.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Arrival processes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArrivalsConfig {
    #[serde(default, alias = "baseline_intents")]
    pub baseline_arrivals: Option<BaselineArrivalsConfig>,
}

/// Supported arrival models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrivalModelKind {
    /// Non-homogeneous Poisson process sampled by thinning
    #[default]
    Nhpp,
}

/// Baseline (non-marketing) session intents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineArrivalsConfig {
    pub model: ArrivalModelKind,
    /// Mean number of intents per simulated day
    pub daily_expected_intents: f64,
    pub intraday_curve: IntradayCurveConfig,
}

impl Default for BaselineArrivalsConfig {
    fn default() -> Self {
        Self {
            model: ArrivalModelKind::Nhpp,
            daily_expected_intents: 0.0,
            intraday_curve: IntradayCurveConfig::default(),
        }
    }
}

/// Gaussian-peak intraday intensity shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntradayCurveConfig {
    pub peak_hour: f64,
    pub spread_hours: f64,
    pub floor: f64,
}

impl Default for IntradayCurveConfig {
    fn default() -> Self {
        Self {
            peak_hour: 12.0,
            spread_hours: 3.0,
            floor: 0.05,
        }
    }
}

/// User population behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UsersConfig {
    /// Probability that a resolved intent creates a brand-new user
    pub new_user_share: f64,
    pub selection: UserSelectionConfig,
    pub propensity_init: PropensityInitConfig,
    pub discovery_mode: DiscoveryModeConfig,
}

impl Default for UsersConfig {
    fn default() -> Self {
        Self {
            new_user_share: 0.6,
            selection: UserSelectionConfig::default(),
            propensity_init: PropensityInitConfig::default(),
            discovery_mode: DiscoveryModeConfig::default(),
        }
    }
}

/// Strategies for picking a returning user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserSelectionMode {
    #[default]
    RecencyPropensityWeighted,
}

/// Returning-user weighting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSelectionConfig {
    pub mode: UserSelectionMode,
    pub recency_half_life_hours: f64,
    pub propensity_weight: f64,
    pub recency_weight: f64,
}

impl Default for UserSelectionConfig {
    fn default() -> Self {
        Self {
            mode: UserSelectionMode::RecencyPropensityWeighted,
            recency_half_life_hours: 18.0,
            propensity_weight: 0.5,
            recency_weight: 0.5,
        }
    }
}

/// Distributions a new user's propensity can be drawn from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropensityDist {
    #[default]
    Uniform,
    Beta,
}

/// Initial propensity distribution. Non-positive beta parameters fall back
/// to uniform at sampling time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PropensityInitConfig {
    pub dist: PropensityDist,
    pub alpha: f64,
    pub beta: f64,
}

impl Default for PropensityInitConfig {
    fn default() -> Self {
        Self {
            dist: PropensityDist::Uniform,
            alpha: 2.0,
            beta: 6.0,
        }
    }
}

/// Behavior penalties for freshly created users.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryModeConfig {
    pub enabled: bool,
    /// Completed sessions after which a user leaves discovery mode (0 never graduates)
    pub graduation_sessions: u32,
    pub dropoff_multiplier: f64,
    pub conversion_logit_shift: f64,
}

impl Default for DiscoveryModeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            graduation_sessions: 2,
            dropoff_multiplier: 1.25,
            conversion_logit_shift: -0.8,
        }
    }
}

/// Website pages and their transitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteGraphConfig {
    /// Reject transitions that point at pages which are not defined
    pub strict: bool,
    pub pages: BTreeMap<String, PageConfig>,
}

/// A single page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    pub dropoff_p: f64,
    /// Ordered `[target, weight]` pairs
    pub transitions: Vec<(String, f64)>,
}

/// Session traversal rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Inactivity timeout; 0 disables the timeout rule
    pub inactivity_timeout_minutes: f64,
    /// Page-view cap; `None` means unlimited
    #[serde(deserialize_with = "deserialize_max_steps")]
    pub max_steps: Option<u32>,
    pub entry_page: String,
    pub inter_page_time: InterPageTimeConfig,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_minutes: 30.0,
            max_steps: Some(12),
            entry_page: "home".to_string(),
            inter_page_time: InterPageTimeConfig::default(),
        }
    }
}

impl SessionsConfig {
    /// Inactivity timeout in seconds.
    pub fn inactivity_timeout_seconds(&self) -> f64 {
        self.inactivity_timeout_minutes * 60.0
    }
}

fn deserialize_max_steps<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StepCap {
        Limit(u32),
        Keyword(String),
    }

    match StepCap::deserialize(deserializer)? {
        StepCap::Limit(limit) => Ok(Some(limit)),
        StepCap::Keyword(word) => match word.to_ascii_lowercase().as_str() {
            "unlimited" | "none" => Ok(None),
            _ => Err(D::Error::custom(format!(
                "max_steps must be an integer or \"unlimited\", got {word:?}"
            ))),
        },
    }
}

/// Inter-page delay distributions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterPageDist {
    #[default]
    Fixed,
    Exponential,
}

/// Inter-page delay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterPageTimeConfig {
    pub dist: InterPageDist,
    pub fixed_seconds: f64,
    pub mean_seconds: f64,
}

impl Default for InterPageTimeConfig {
    fn default() -> Self {
        Self {
            dist: InterPageDist::Fixed,
            fixed_seconds: 10.0,
            mean_seconds: 10.0,
        }
    }
}

/// Supported conversion models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionModelKind {
    #[default]
    Logistic,
}

/// Logistic conversion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    pub model: ConversionModelKind,
    pub cap: f64,
    pub base_logit: f64,
    pub propensity_coef: f64,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            model: ConversionModelKind::Logistic,
            cap: 0.35,
            base_logit: -3.0,
            propensity_coef: 2.0,
        }
    }
}

/// Intent resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentResolverConfig {
    /// When false the resolver drains intents without resolving them
    pub enabled: bool,
    /// Bounded intent queue capacity; `None` is unbounded
    pub queue_capacity: Option<usize>,
}

impl Default for IntentResolverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            queue_capacity: None,
        }
    }
}

fn default_true() -> bool {
    true
}

impl SimulationConfig {
    /// Reads and validates a TOML configuration file.
    ///
    /// # Errors
    ///
    /// - `ConfigError::Read` - File could not be read
    /// - `ConfigError::Parse` - Document is malformed
    /// - `ConfigError::InvalidValue` - A value failed validation
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parses and validates a TOML configuration document.
    ///
    /// # Errors
    ///
    /// - `ConfigError::Parse` - Document is malformed or names an unsupported model
    /// - `ConfigError::InvalidValue` - A value failed validation
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let document: toml::Value = toml::from_str(text).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        let raw = serde_json::to_value(&document).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;

        let mut config = document
            .try_into::<SimulationConfig>()
            .map_err(|e| ConfigError::Parse {
                reason: e.to_string(),
            })?;
        config.raw = raw;
        config.validate()?;
        Ok(config)
    }

    /// Returns the document the configuration was parsed from.
    ///
    /// Configurations built in code have no source document; their typed
    /// representation is used instead.
    pub fn raw_document(&self) -> serde_json::Value {
        if self.raw.is_null() {
            serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
        } else {
            self.raw.clone()
        }
    }

    /// Resolves the run identifier, deriving it from content for `"auto"`.
    pub fn resolve_run_id(&self) -> String {
        if self.run.run_id == AUTO_RUN_ID {
            derive_run_id(&self.raw_document(), RUN_ID_LENGTH)
        } else {
            self.run.run_id.clone()
        }
    }

    /// Simulation horizon in logical seconds.
    pub fn horizon_seconds(&self) -> f64 {
        f64::from(self.run.num_days) * 86_400.0
    }

    /// Session traversal runs only when both a site graph and session rules exist.
    pub fn sessions_enabled(&self) -> bool {
        self.site_graph.is_some() && self.sessions.is_some()
    }

    /// Checks every configured section.
    ///
    /// # Errors
    ///
    /// - `ConfigError::InvalidValue` - First value found outside its allowed range
    /// - `ConfigError::InvalidStartDate` - Start date could not be parsed
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.run.validate()?;
        self.storage.validate()?;
        self.logging
            .level
            .parse::<CliLogLevel>()
            .map_err(|reason| ConfigError::invalid("logging.level", reason))?;

        if let Some(baseline) = self
            .arrivals
            .as_ref()
            .and_then(|arrivals| arrivals.baseline_arrivals.as_ref())
        {
            baseline.validate()?;
        }
        if let Some(users) = &self.users {
            users.validate()?;
        }
        if let Some(graph) = &self.site_graph {
            graph.validate()?;
        }
        if let Some(sessions) = &self.sessions {
            sessions.validate()?;
            let strict_graph = self.site_graph.as_ref().filter(|graph| graph.strict);
            if strict_graph.is_some_and(|graph| !graph.pages.contains_key(&sessions.entry_page)) {
                return Err(ConfigError::invalid(
                    "sessions.entry_page",
                    format!("page {:?} is not defined in site_graph", sessions.entry_page),
                ));
            }
        }
        if let Some(conversion) = &self.conversion {
            require_probability("conversion.cap", conversion.cap)?;
            require_finite("conversion.base_logit", conversion.base_logit)?;
            require_finite("conversion.propensity_coef", conversion.propensity_coef)?;
        }
        if self
            .intent_resolver
            .as_ref()
            .is_some_and(|resolver| resolver.queue_capacity == Some(0))
        {
            return Err(ConfigError::invalid(
                "intent_resolver.queue_capacity",
                "must be at least 1 when set",
            ));
        }

        Ok(())
    }
}

impl RunConfig {
    /// Parses `start_date` as a UTC instant.
    ///
    /// # Errors
    ///
    /// - `ConfigError::InvalidStartDate` - Neither a date nor a timestamp
    pub fn start_datetime(&self) -> Result<DateTime<Utc>, ConfigError> {
        let value = self.start_date.trim();
        if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            return Ok(date.and_time(NaiveTime::MIN).and_utc());
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
            return Ok(naive.and_utc());
        }
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| ConfigError::InvalidStartDate {
                value: self.start_date.clone(),
            })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.run_id.trim().is_empty() {
            return Err(ConfigError::invalid("run.run_id", "must not be empty"));
        }
        if self.num_days == 0 {
            return Err(ConfigError::invalid("run.num_days", "must be > 0"));
        }
        self.start_datetime()?;
        Ok(())
    }
}

impl StorageConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::invalid("storage.path", "must not be empty"));
        }
        let interval = self.flush.or_every_seconds;
        if !interval.is_finite() || interval <= 0.0 {
            return Err(ConfigError::invalid(
                "storage.flush.or_every_seconds",
                format!("must be a positive number of seconds, got {interval}"),
            ));
        }
        Ok(())
    }
}

impl BaselineArrivalsConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let field = "arrivals.baseline_arrivals";
        let expected = self.daily_expected_intents;
        if !expected.is_finite() {
            return Err(ConfigError::invalid(
                format!("{field}.daily_expected_intents"),
                format!("must be finite, got {expected}"),
            ));
        }

        let curve = &self.intraday_curve;
        require_finite(&format!("{field}.intraday_curve.peak_hour"), curve.peak_hour)?;
        if !curve.spread_hours.is_finite() || curve.spread_hours <= 0.0 {
            return Err(ConfigError::invalid(
                format!("{field}.intraday_curve.spread_hours"),
                "must be > 0",
            ));
        }
        if !curve.floor.is_finite() || curve.floor < 0.0 {
            return Err(ConfigError::invalid(
                format!("{field}.intraday_curve.floor"),
                "must be >= 0",
            ));
        }
        Ok(())
    }
}

impl UsersConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        require_probability("users.new_user_share", self.new_user_share)?;

        let selection = &self.selection;
        let half_life = selection.recency_half_life_hours;
        if !half_life.is_finite() || half_life <= 0.0 {
            return Err(ConfigError::invalid(
                "users.selection.recency_half_life_hours",
                "must be > 0",
            ));
        }
        require_non_negative("users.selection.propensity_weight", selection.propensity_weight)?;
        require_non_negative("users.selection.recency_weight", selection.recency_weight)?;

        let discovery = &self.discovery_mode;
        require_non_negative(
            "users.discovery_mode.dropoff_multiplier",
            discovery.dropoff_multiplier,
        )?;
        require_finite(
            "users.discovery_mode.conversion_logit_shift",
            discovery.conversion_logit_shift,
        )?;
        Ok(())
    }
}

impl SiteGraphConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, page) in &self.pages {
            let field = format!("site_graph.pages.{name}");
            if name.trim().is_empty() {
                return Err(ConfigError::invalid("site_graph.pages", "page names must not be empty"));
            }
            require_probability(&format!("{field}.dropoff_p"), page.dropoff_p)?;

            for (idx, (target, weight)) in page.transitions.iter().enumerate() {
                let entry = format!("{field}.transitions[{idx}]");
                if target.trim().is_empty() {
                    return Err(ConfigError::invalid(entry, "target must be a non-empty string"));
                }
                require_non_negative(&entry, *weight)?;
                if self.strict && !self.pages.contains_key(target) {
                    return Err(ConfigError::invalid(
                        entry,
                        format!("references unknown page {target:?}"),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl SessionsConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        require_non_negative(
            "sessions.inactivity_timeout_minutes",
            self.inactivity_timeout_minutes,
        )?;
        if self.entry_page.trim().is_empty() {
            return Err(ConfigError::invalid("sessions.entry_page", "must not be empty"));
        }
        require_non_negative(
            "sessions.inter_page_time.fixed_seconds",
            self.inter_page_time.fixed_seconds,
        )?;
        require_finite(
            "sessions.inter_page_time.mean_seconds",
            self.inter_page_time.mean_seconds,
        )?;

        // An unlimited walk with no delay never yields to the scheduler
        if self.max_steps.is_none() && self.inter_page_time.is_always_zero() {
            return Err(ConfigError::invalid(
                "sessions.max_steps",
                "\"unlimited\" requires a positive inter_page_time",
            ));
        }
        Ok(())
    }
}

impl InterPageTimeConfig {
    /// True when every sampled delay is zero.
    pub fn is_always_zero(&self) -> bool {
        match self.dist {
            InterPageDist::Fixed => self.fixed_seconds <= 0.0,
            InterPageDist::Exponential => self.mean_seconds <= 0.0,
        }
    }
}

fn require_finite(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be finite, got {value}")))
    }
}

fn require_non_negative(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be >= 0, got {value}")))
    }
}

fn require_probability(field: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be in [0, 1], got {value}")))
    }
}

/// Derives a run identifier from configuration content.
///
/// Identical documents always produce the same identifier; any change to the
/// content produces a different one.
pub fn derive_run_id(document: &serde_json::Value, length: usize) -> String {
    let digest = Sha1::digest(canonical_json(document).as_bytes());
    let mut run_id = hex::encode(digest);
    run_id.truncate(length);
    run_id
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [run]
        seed = 7
        start_date = "2026-01-01"
        num_days = 2

        [storage]
        path = "out/events.sqlite"
    "#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = SimulationConfig::from_toml_str(MINIMAL).unwrap();

        assert_eq!(config.run.run_id, AUTO_RUN_ID);
        assert!(config.storage.clean_slate);
        assert_eq!(config.storage.flush.every_n_events, 5000);
        assert_eq!(config.storage.flush.or_every_seconds, 30.0);
        assert_eq!(config.logging.level, "info");
        assert!(config.arrivals.is_none());
        assert!(!config.sessions_enabled());
        assert_eq!(config.horizon_seconds(), 172_800.0);
    }

    #[test]
    fn test_auto_run_id_is_content_derived() {
        let first = SimulationConfig::from_toml_str(MINIMAL).unwrap();
        let second = SimulationConfig::from_toml_str(MINIMAL).unwrap();
        let changed =
            SimulationConfig::from_toml_str(&MINIMAL.replace("seed = 7", "seed = 8")).unwrap();

        let id = first.resolve_run_id();
        assert_eq!(id.len(), RUN_ID_LENGTH);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id, second.resolve_run_id());
        assert_ne!(id, changed.resolve_run_id());
    }

    #[test]
    fn test_run_id_ignores_key_order() {
        let reordered = r#"
            [storage]
            path = "out/events.sqlite"

            [run]
            num_days = 2
            start_date = "2026-01-01"
            seed = 7
        "#;
        let first = SimulationConfig::from_toml_str(MINIMAL).unwrap();
        let second = SimulationConfig::from_toml_str(reordered).unwrap();
        assert_eq!(first.resolve_run_id(), second.resolve_run_id());
    }

    #[test]
    fn test_literal_run_id_is_kept() {
        let text = MINIMAL.replace("seed = 7", "seed = 7\nrun_id = \"nightly\"");
        let config = SimulationConfig::from_toml_str(&text).unwrap();
        assert_eq!(config.resolve_run_id(), "nightly");
    }

    #[test]
    fn test_derive_run_id_matches_sha1_prefix() {
        let document = serde_json::json!({"b": 1, "a": 2});
        // sha1 of {"a":2,"b":1}
        let full = hex::encode(Sha1::digest(br#"{"a":2,"b":1}"#));
        assert_eq!(derive_run_id(&document, 12), full[..12]);
    }

    #[test]
    fn test_start_date_formats() {
        let mut run = RunConfig {
            run_id: "r".to_string(),
            seed: 1,
            start_date: "2026-03-04".to_string(),
            num_days: 1,
        };
        let date = run.start_datetime().unwrap();
        assert_eq!(date.to_rfc3339(), "2026-03-04T00:00:00+00:00");

        run.start_date = "2026-03-04T10:00:00+02:00".to_string();
        assert_eq!(
            run.start_datetime().unwrap().to_rfc3339(),
            "2026-03-04T08:00:00+00:00"
        );

        run.start_date = "yesterday".to_string();
        assert!(matches!(
            run.start_datetime(),
            Err(ConfigError::InvalidStartDate { .. })
        ));
    }

    #[test]
    fn test_feature_sections_parse() {
        let text = format!(
            "{MINIMAL}\n{}",
            r#"
            [arrivals.baseline_arrivals]
            model = "nhpp"
            daily_expected_intents = 800

            [arrivals.baseline_arrivals.intraday_curve]
            peak_hour = 12
            spread_hours = 2.5

            [users.propensity_init]
            dist = "beta"
            alpha = 2
            beta = 6

            [site_graph.pages.home]
            dropoff_p = 0.25
            transitions = [["product", 0.55], ["pricing", 0.25]]

            [site_graph.pages.product]
            dropoff_p = 0.3

            [sessions]
            max_steps = "unlimited"

            [sessions.inter_page_time]
            dist = "exponential"
            mean_seconds = 20

            [conversion]
            cap = 0.5

            [intent_resolver]
            enabled = false
            queue_capacity = 16
        "#
        );
        let config = SimulationConfig::from_toml_str(&text).unwrap();

        let baseline = config.arrivals.unwrap().baseline_arrivals.unwrap();
        assert_eq!(baseline.daily_expected_intents, 800.0);
        assert_eq!(baseline.intraday_curve.spread_hours, 2.5);
        assert_eq!(baseline.intraday_curve.floor, 0.05);

        let users = config.users.unwrap();
        assert_eq!(users.propensity_init.dist, PropensityDist::Beta);
        assert_eq!(users.new_user_share, 0.6);

        let graph = config.site_graph.unwrap();
        assert_eq!(
            graph.pages["home"].transitions,
            vec![("product".to_string(), 0.55), ("pricing".to_string(), 0.25)]
        );
        assert!(graph.pages["product"].transitions.is_empty());

        let sessions = config.sessions.unwrap();
        assert_eq!(sessions.max_steps, None);
        assert_eq!(sessions.inter_page_time.dist, InterPageDist::Exponential);
        assert_eq!(sessions.inactivity_timeout_seconds(), 1800.0);

        assert_eq!(config.conversion.unwrap().cap, 0.5);
        let resolver = config.intent_resolver.unwrap();
        assert!(!resolver.enabled);
        assert_eq!(resolver.queue_capacity, Some(16));
    }

    #[test]
    fn test_missing_required_section_is_parse_error() {
        let result = SimulationConfig::from_toml_str("[run]\nseed = 1\nstart_date = \"2026-01-01\"\nnum_days = 1\n");
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_unsupported_model_is_rejected() {
        let text = format!(
            "{MINIMAL}\n[arrivals.baseline_arrivals]\nmodel = \"piecewise\"\n"
        );
        assert!(matches!(
            SimulationConfig::from_toml_str(&text),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        let cases = [
            "[users]\nnew_user_share = 1.5\n",
            "[arrivals.baseline_arrivals.intraday_curve]\nspread_hours = 0\n",
            "[arrivals.baseline_arrivals]\ndaily_expected_intents = nan\n",
            "[site_graph.pages.home]\ndropoff_p = 2.0\n",
            "[site_graph.pages.home]\ntransitions = [[\"x\", -1.0]]\n",
            "[conversion]\ncap = 1.2\n",
            "[intent_resolver]\nqueue_capacity = 0\n",
        ];
        for case in cases {
            let text = format!("{MINIMAL}\n{case}");
            assert!(
                matches!(
                    SimulationConfig::from_toml_str(&text),
                    Err(ConfigError::InvalidValue { .. })
                ),
                "expected rejection for {case}"
            );
        }
    }

    #[test]
    fn test_strict_graph_rejects_unknown_targets() {
        let text = format!(
            "{MINIMAL}\n[site_graph]\nstrict = true\n[site_graph.pages.home]\ntransitions = [[\"missing\", 1.0]]\n"
        );
        assert!(matches!(
            SimulationConfig::from_toml_str(&text),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_bad_max_steps_keyword_is_rejected() {
        let text = format!("{MINIMAL}\n[sessions]\nmax_steps = \"forever\"\n");
        assert!(matches!(
            SimulationConfig::from_toml_str(&text),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_unlimited_steps_need_a_delay() {
        let zero_delays = [
            "[sessions]\nmax_steps = \"unlimited\"\n[sessions.inter_page_time]\ndist = \"fixed\"\nfixed_seconds = 0\n",
            "[sessions]\nmax_steps = \"unlimited\"\n[sessions.inter_page_time]\ndist = \"exponential\"\nmean_seconds = 0\n",
        ];
        for case in zero_delays {
            let text = format!("{MINIMAL}\n{case}");
            assert!(
                matches!(
                    SimulationConfig::from_toml_str(&text),
                    Err(ConfigError::InvalidValue { .. })
                ),
                "expected rejection for {case}"
            );
        }

        let capped = format!(
            "{MINIMAL}\n[sessions]\nmax_steps = 5\n[sessions.inter_page_time]\nfixed_seconds = 0\n"
        );
        assert!(SimulationConfig::from_toml_str(&capped).is_ok());

        let delayed = format!(
            "{MINIMAL}\n[sessions]\nmax_steps = \"unlimited\"\n[sessions.inter_page_time]\nfixed_seconds = 2\n"
        );
        assert!(SimulationConfig::from_toml_str(&delayed).is_ok());
    }

    #[test]
    fn test_zero_num_days_is_rejected() {
        let text = MINIMAL.replace("num_days = 2", "num_days = 0");
        assert!(matches!(
            SimulationConfig::from_toml_str(&text),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
