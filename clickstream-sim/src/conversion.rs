//! Logistic conversion response.

use clickstream_core::config::{ConversionConfig, ConversionModelKind};

use crate::deterministic::{RandomSource, SimulationError};

/// Capped logistic model of the chance a session converts.
///
/// `p = min(cap, sigmoid(base_logit + propensity_coef * propensity + logit_shift))`
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionModel {
    cap: f64,
    base_logit: f64,
    propensity_coef: f64,
}

impl ConversionModel {
    /// Builds the model from its configuration section.
    ///
    /// # Errors
    ///
    /// - `SimulationError::InvalidModel` - If cap is outside `[0, 1]`
    pub fn from_config(config: &ConversionConfig) -> Result<Self, SimulationError> {
        match config.model {
            ConversionModelKind::Logistic => {}
        }
        if !(0.0..=1.0).contains(&config.cap) {
            return Err(SimulationError::InvalidModel {
                component: "conversion",
                reason: format!("cap must be in [0, 1], got {}", config.cap),
            });
        }
        Ok(Self {
            cap: config.cap,
            base_logit: config.base_logit,
            propensity_coef: config.propensity_coef,
        })
    }

    pub fn cap(&self) -> f64 {
        self.cap
    }

    /// Conversion probability. Propensity is clamped to `[0, 1]`.
    pub fn probability(&self, propensity: f64, logit_shift: f64) -> f64 {
        let propensity = propensity.clamp(0.0, 1.0);
        let logit = self.base_logit + self.propensity_coef * propensity + logit_shift;
        sigmoid(logit).min(self.cap).clamp(0.0, 1.0)
    }

    /// Draws once and returns whether the session converts, with the probability used.
    pub fn should_convert(
        &self,
        propensity: f64,
        logit_shift: f64,
        rng: &mut dyn RandomSource,
    ) -> (bool, f64) {
        let p = self.probability(propensity, logit_shift);
        (rng.random() < p, p)
    }
}

fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}
