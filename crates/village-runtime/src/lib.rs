#![deny(warnings)]

//! Runtime for the village simulation: offline catch-up and the session that
//! ties loading, live ticking and saving together.

pub mod catchup;
pub mod session;

pub use catchup::OfflineReport;
pub use session::{now_epoch_ms, ResearchError, Simulation};
