//! StreetMetrics Store - Storage ports and adapters
//!
//! This crate defines the storage ports the refresh pipeline writes through
//! and provides an in-memory adapter plus a PostgreSQL adapter. Every adapter
//! stages a district's tables into a new generation and publishes it with a
//! single pointer flip, so readers never see a half-written refresh.

pub mod memory;
pub mod ports;
pub mod postgres;

pub use memory::MemoryRefreshStore;
pub use ports::{DistrictStore, GenerationStore, GenerationTicket, RefreshLogStore, RefreshStore};
