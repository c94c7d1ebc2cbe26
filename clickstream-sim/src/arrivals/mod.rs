//! Arrival processes that publish session intents.

pub mod nhpp;

use clickstream_core::config::{ArrivalModelKind, BaselineArrivalsConfig};

pub use nhpp::{IntradayShape, NhppArrivals, SECONDS_PER_DAY};

use crate::deterministic::{Process, ProcessContext, SimulationError, Suspend};
use crate::world::SimWorld;

/// Baseline arrival process selected by configuration.
#[derive(Debug)]
pub enum BaselineArrivals {
    Nhpp(NhppArrivals),
}

impl BaselineArrivals {
    /// # Errors
    ///
    /// - `SimulationError::InvalidModel` - If the selected model rejects its parameters
    pub fn from_config(config: &BaselineArrivalsConfig, num_days: u32) -> Result<Self, SimulationError> {
        match config.model {
            ArrivalModelKind::Nhpp => Ok(BaselineArrivals::Nhpp(NhppArrivals::new(config, num_days)?)),
        }
    }
}

impl Process<SimWorld> for BaselineArrivals {
    fn name(&self) -> &str {
        match self {
            BaselineArrivals::Nhpp(model) => model.name(),
        }
    }

    fn resume(&mut self, ctx: &mut ProcessContext<'_, SimWorld>) -> Result<Suspend, SimulationError> {
        match self {
            BaselineArrivals::Nhpp(model) => model.resume(ctx),
        }
    }
}
