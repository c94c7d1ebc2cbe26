//! Integration tests for Clickstream
//!
//! These tests run whole simulations through the public API and check the
//! properties of the resulting event logs: reproducibility, arrival shape,
//! session termination, user selection, flush behavior and the SQLite store.

#[path = "integration/common.rs"]
mod common;

#[path = "integration/arrivals_fidelity.rs"]
mod arrivals_fidelity;
#[path = "integration/determinism.rs"]
mod determinism;
#[path = "integration/end_to_end_sqlite.rs"]
mod end_to_end_sqlite;
#[path = "integration/persistence_flush.rs"]
mod persistence_flush;
#[path = "integration/session_termination.rs"]
mod session_termination;
#[path = "integration/user_selection.rs"]
mod user_selection;
