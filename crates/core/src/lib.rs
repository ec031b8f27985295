//! Veilnet Core Types
//!
//! This crate defines the identifiers, error type, configuration and clock
//! helpers shared by the lease set crates.

pub mod config;
mod error;
pub mod time;
mod types;

pub use config::{LeaseSetConfig, TunnelTimings};
pub use error::*;
pub use types::*;
