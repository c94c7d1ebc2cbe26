//! In-memory registry of simulated users.
//!
//! Users are created on first reference and kept for the whole run. The
//! store never suspends; callers hand it the shared random source for every
//! stochastic decision.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use clickstream_core::config::{PropensityDist, PropensityInitConfig, UsersConfig};

use crate::deterministic::{RandomSource, SimulationError};
use crate::distributions;

/// State of one simulated user.
#[derive(Debug, Clone, PartialEq)]
pub struct UserState {
    pub user_id: String,
    pub created_ts_utc: DateTime<Utc>,
    pub last_seen_ts_utc: DateTime<Utc>,
    pub sessions_count: u32,
    /// Conversion propensity in `[0, 1]`
    pub propensity: f64,
    pub discovery_mode: bool,
    pub discovery_sessions_count: u32,
    pub discovery_dropoff_multiplier: f64,
    pub discovery_conversion_logit_shift: f64,
}

/// Owns every user of a run.
#[derive(Debug, Clone)]
pub struct UserStateStore {
    config: UsersConfig,
    users: Vec<UserState>,
    index: HashMap<String, usize>,
    next_seq: u64,
}

impl UserStateStore {
    pub fn new(config: UsersConfig) -> Self {
        Self {
            config,
            users: Vec::new(),
            index: HashMap::new(),
            next_seq: 0,
        }
    }

    pub fn config(&self) -> &UsersConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn get(&self, user_id: &str) -> Option<&UserState> {
        self.index.get(user_id).map(|&idx| &self.users[idx])
    }

    /// Users in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &UserState> {
        self.users.iter()
    }

    /// Resolves the user behind a new intent. Returns the user and whether
    /// it was created by this call.
    ///
    /// The first intent always creates a user without drawing. Later intents
    /// draw once to choose between a new and a returning user.
    pub fn get_or_create_for_intent(
        &mut self,
        now: DateTime<Utc>,
        rng: &mut dyn RandomSource,
    ) -> (&UserState, bool) {
        if self.users.is_empty() || rng.random() < self.config.new_user_share {
            let idx = self.create_user(now, rng);
            return (&self.users[idx], true);
        }

        match self.select_existing_index(now, rng) {
            Some(idx) => (&self.users[idx], false),
            None => {
                let idx = self.create_user(now, rng);
                (&self.users[idx], true)
            }
        }
    }

    /// Picks a returning user weighted by recency and propensity.
    ///
    /// Falls back to a uniform pick when every weight is zero. Returns `None`
    /// only when the store is empty.
    pub fn select_existing(
        &self,
        now: DateTime<Utc>,
        rng: &mut dyn RandomSource,
    ) -> Option<&UserState> {
        self.select_existing_index(now, rng)
            .map(|idx| &self.users[idx])
    }

    /// Records the end of a session for `user_id`.
    ///
    /// # Errors
    ///
    /// - `SimulationError::UnknownUser` - If no user with that id exists
    pub fn mark_session_end(
        &mut self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), SimulationError> {
        let graduation = self.config.discovery_mode.graduation_sessions;
        let idx = *self
            .index
            .get(user_id)
            .ok_or_else(|| SimulationError::UnknownUser {
                user_id: user_id.to_string(),
            })?;
        let user = &mut self.users[idx];

        user.last_seen_ts_utc = now;
        user.sessions_count += 1;
        if user.discovery_mode {
            user.discovery_sessions_count += 1;
            if graduation > 0 && user.discovery_sessions_count >= graduation {
                user.discovery_mode = false;
                tracing::debug!(user_id, sessions = user.sessions_count, "User left discovery mode");
            }
        }
        Ok(())
    }

    fn select_existing_index(&self, now: DateTime<Utc>, rng: &mut dyn RandomSource) -> Option<usize> {
        if self.users.is_empty() {
            return None;
        }

        let weights: Vec<f64> = self.users.iter().map(|user| self.weight(user, now)).collect();
        if weights.iter().sum::<f64>() <= 0.0 {
            let idx = (rng.random() * self.users.len() as f64) as usize;
            return Some(idx.min(self.users.len() - 1));
        }
        rng.weighted_index(&weights)
    }

    fn weight(&self, user: &UserState, now: DateTime<Utc>) -> f64 {
        let selection = &self.config.selection;
        let half_life_hours = selection.recency_half_life_hours.max(1e-9);
        let age_seconds = (now - user.last_seen_ts_utc)
            .num_microseconds()
            .map_or(0.0, |micros| micros as f64 / 1_000_000.0)
            .max(0.0);
        let age_hours = age_seconds / 3600.0;

        let recency = (-std::f64::consts::LN_2 * age_hours / half_life_hours).exp();
        let propensity = user.propensity.clamp(0.0, 1.0);

        (selection.recency_weight * recency + selection.propensity_weight * propensity).max(0.0)
    }

    fn create_user(&mut self, now: DateTime<Utc>, rng: &mut dyn RandomSource) -> usize {
        self.next_seq += 1;
        let user_id = format!("u_{:010}", self.next_seq);
        let discovery = &self.config.discovery_mode;

        let user = UserState {
            user_id: user_id.clone(),
            created_ts_utc: now,
            last_seen_ts_utc: now,
            sessions_count: 0,
            propensity: initial_propensity(&self.config.propensity_init, rng),
            discovery_mode: discovery.enabled,
            discovery_sessions_count: 0,
            discovery_dropoff_multiplier: discovery.dropoff_multiplier,
            discovery_conversion_logit_shift: discovery.conversion_logit_shift,
        };
        tracing::debug!(user_id = %user.user_id, propensity = user.propensity, "Created user");

        let idx = self.users.len();
        self.users.push(user);
        self.index.insert(user_id, idx);
        idx
    }
}

fn initial_propensity(config: &PropensityInitConfig, rng: &mut dyn RandomSource) -> f64 {
    match config.dist {
        PropensityDist::Uniform => rng.random(),
        PropensityDist::Beta => match distributions::beta(rng, config.alpha, config.beta) {
            Some(draw) => draw,
            None => rng.random(),
        },
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::deterministic::SimRng;
    use crate::deterministic::scripted::ScriptedRng;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_first_intent_always_creates() {
        let mut store = UserStateStore::new(UsersConfig::default());
        // Only the uniform propensity draw
        let mut rng = ScriptedRng::new([0.4]);

        let (user, created) = store.get_or_create_for_intent(t0(), &mut rng);
        assert!(created);
        assert_eq!(user.user_id, "u_0000000001");
        assert_eq!(user.propensity, 0.4);
        assert!(user.discovery_mode);
        assert_eq!(user.created_ts_utc, user.last_seen_ts_utc);
        assert_eq!(rng.draws(), 1);
    }

    #[test]
    fn test_new_user_share_splits_new_and_returning() {
        let mut store = UserStateStore::new(UsersConfig::default());
        let mut rng = ScriptedRng::new([0.4, 0.1, 0.7, 0.9, 0.3, 0.2]);

        store.get_or_create_for_intent(t0(), &mut rng);
        // 0.1 < 0.6 creates, 0.7 is propensity
        let (user, created) = store.get_or_create_for_intent(t0(), &mut rng);
        assert!(created);
        assert_eq!(user.user_id, "u_0000000002");

        // 0.9 >= 0.6 selects existing, 0.3 picks by weight
        let (user, created) = store.get_or_create_for_intent(t0(), &mut rng);
        assert!(!created);
        assert_eq!(user.user_id, "u_0000000001");
        assert_eq!(store.len(), 2);
        assert_eq!(rng.remaining(), 1);
    }

    #[test]
    fn test_selection_favors_recent_users() {
        let config = UsersConfig {
            new_user_share: 0.0,
            ..UsersConfig::default()
        };
        let mut store = UserStateStore::new(config);
        let mut rng = ScriptedRng::new([0.5, 0.5]);
        store.get_or_create_for_intent(t0(), &mut rng);
        store.create_user(t0(), &mut rng);

        let later = t0() + Duration::hours(54);
        store.mark_session_end("u_0000000002", later).unwrap();

        // Equal propensity, so only recency separates the two users
        let stale = store.weight(&store.users[0], later);
        let fresh = store.weight(&store.users[1], later);
        assert!(fresh > stale);
        assert!((fresh - (0.5 + 0.25)).abs() < 1e-12);
        // Three half-lives
        assert!((stale - (0.5 * 0.125 + 0.25)).abs() < 1e-12);
    }

    #[test]
    fn test_zero_weights_fall_back_to_uniform() {
        let mut config = UsersConfig::default();
        config.selection.recency_weight = 0.0;
        config.selection.propensity_weight = 0.0;
        let mut store = UserStateStore::new(config);

        let mut rng = ScriptedRng::new([0.1, 0.2, 0.3]);
        store.create_user(t0(), &mut rng);
        store.create_user(t0(), &mut rng);
        store.create_user(t0(), &mut rng);

        let mut rng = ScriptedRng::new([0.7]);
        let user = store.select_existing(t0(), &mut rng).unwrap();
        assert_eq!(user.user_id, "u_0000000003");
        assert_eq!(rng.draws(), 1);
    }

    #[test]
    fn test_discovery_graduation() {
        let mut store = UserStateStore::new(UsersConfig::default());
        let mut rng = ScriptedRng::new([0.5]);
        store.get_or_create_for_intent(t0(), &mut rng);

        store.mark_session_end("u_0000000001", t0()).unwrap();
        let user = store.get("u_0000000001").unwrap();
        assert!(user.discovery_mode);
        assert_eq!(user.discovery_sessions_count, 1);

        let later = t0() + Duration::minutes(5);
        store.mark_session_end("u_0000000001", later).unwrap();
        let user = store.get("u_0000000001").unwrap();
        assert!(!user.discovery_mode);
        assert_eq!(user.sessions_count, 2);
        assert_eq!(user.last_seen_ts_utc, later);

        // Graduated users stop counting discovery sessions
        store.mark_session_end("u_0000000001", later).unwrap();
        assert_eq!(store.get("u_0000000001").unwrap().discovery_sessions_count, 2);
    }

    #[test]
    fn test_zero_graduation_never_graduates() {
        let mut config = UsersConfig::default();
        config.discovery_mode.graduation_sessions = 0;
        let mut store = UserStateStore::new(config);
        let mut rng = ScriptedRng::new([0.5]);
        store.get_or_create_for_intent(t0(), &mut rng);

        for _ in 0..5 {
            store.mark_session_end("u_0000000001", t0()).unwrap();
        }
        assert!(store.get("u_0000000001").unwrap().discovery_mode);
    }

    #[test]
    fn test_unknown_user_is_an_error() {
        let mut store = UserStateStore::new(UsersConfig::default());
        assert!(matches!(
            store.mark_session_end("u_9999999999", t0()),
            Err(SimulationError::UnknownUser { .. })
        ));
    }

    #[test]
    fn test_beta_propensity_in_range() {
        let mut config = UsersConfig::default();
        config.propensity_init.dist = PropensityDist::Beta;
        let mut store = UserStateStore::new(config);
        let mut rng = SimRng::from_seed(3);
        for _ in 0..200 {
            store.create_user(t0(), &mut rng);
        }
        assert!(store.iter().all(|u| (0.0..=1.0).contains(&u.propensity)));
    }

    #[test]
    fn test_invalid_beta_falls_back_to_uniform() {
        let mut config = UsersConfig::default();
        config.propensity_init.dist = PropensityDist::Beta;
        config.propensity_init.alpha = 0.0;
        let mut store = UserStateStore::new(config);
        let mut rng = ScriptedRng::new([0.42]);
        store.create_user(t0(), &mut rng);
        assert_eq!(store.get("u_0000000001").unwrap().propensity, 0.42);
    }
}
