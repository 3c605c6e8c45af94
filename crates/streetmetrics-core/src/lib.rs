//! StreetMetrics Core - Domain models, error taxonomy and configuration
//!
//! This crate contains the district/segment/rollup domain types, the layered
//! configuration and the upstream source port shared by every other crate.

pub mod config;
pub mod error;
pub mod models;
pub mod ports;

pub use error::{ErrorKind, Result, StreetmetricsError};
