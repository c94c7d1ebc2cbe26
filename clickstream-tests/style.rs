//! Style Enforcement Tests
//!
//! Checks source-level rules that clippy cannot express.
//!
//! - `determinism_enforcement` - Simulation code draws randomness and time only
//!   from the run's seeded services

#[path = "style/determinism_enforcement.rs"]
mod determinism_enforcement;
