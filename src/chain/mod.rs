//! Option-chain snapshots and the repair run over them.

pub mod atm;
pub mod config;
pub mod controller;
pub mod corrector;
pub mod history;
pub mod snapshot;
pub mod stats;
pub mod types;
