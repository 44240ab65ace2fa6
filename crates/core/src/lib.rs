//! Core types and shared functionality for geofresh.
//!
//! This crate provides:
//! - The lookup service and its atomically swapped database artifact
//! - Release calendar arithmetic for refresh scheduling
//! - Unified error types
//! - Configuration structures

pub mod config;
pub mod database;
pub mod error;
pub mod lookup;
pub mod schedule;
pub mod validators;

pub use config::{AppConfig, ConfigError};
pub use database::{DatabaseLoader, GeoDatabase, MaxMindLoader, Record};
pub use error::Error;
pub use lookup::{Artifact, LookupOutcome, LookupService, ServiceState};
pub use schedule::{Clock, ReleaseSchedule, SystemClock};
pub use validators::Validators;
