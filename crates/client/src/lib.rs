//! Refresh pipeline for geofresh.
//!
//! This crate provides the HTTP transport, conditional request construction,
//! validator tracking, the fetch-and-install refresher and the scheduler that
//! drives it.

pub mod refresher;
pub mod request;
pub mod scheduler;
pub mod transport;
pub mod validators;

#[cfg(test)]
mod test_support;

pub use refresher::{RefreshOutcome, RefreshSettings, Refresher};
pub use request::RequestBuilder;
pub use scheduler::{Scheduler, SchedulerHandle};
pub use transport::{DownloadRequest, DownloadResponse, HttpTransport, Transport, TransportConfig};
pub use validators::ValidatorStore;
