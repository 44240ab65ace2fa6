//! Address lookups against the currently installed database.
//!
//! The installed [`Artifact`] sits behind an `ArcSwapOption`: readers take a
//! guard with a single atomic load and finish their query against that
//! artifact even if a refresh installs a newer one meanwhile. The old
//! artifact is released when its last guard drops.

use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};

use crate::database::{GeoDatabase, Record};
use crate::validators::Validators;

/// A loaded database plus where it came from.
pub struct Artifact {
    db: Arc<dyn GeoDatabase>,
    path: PathBuf,
    validators: Validators,
    loaded_at: DateTime<Utc>,
}

impl Artifact {
    pub fn new(db: Arc<dyn GeoDatabase>, path: impl Into<PathBuf>, validators: Validators) -> Self {
        Self { db, path: path.into(), validators, loaded_at: Utc::now() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validators of the response that produced the file, empty when the
    /// artifact was booted from a file left by a previous process.
    pub fn validators(&self) -> &Validators {
        &self.validators
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn database(&self) -> &dyn GeoDatabase {
        self.db.as_ref()
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("db", &self.db.describe())
            .field("path", &self.path)
            .field("validators", &self.validators)
            .field("loaded_at", &self.loaded_at)
            .finish()
    }
}

/// Liveness of the lookup service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServiceState {
    /// No database installed yet.
    Idle = 0,
    /// A database is installed and serving.
    Ready = 1,
    /// A download is in flight; lookups use the installed database, if any.
    Refreshing = 2,
}

impl ServiceState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ServiceState::Ready,
            2 => ServiceState::Refreshing,
            _ => ServiceState::Idle,
        }
    }
}

/// Result of a single lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Found(Record),
    /// Address is unknown to the database or not a valid IP literal.
    NotFound,
    /// No database has been installed yet.
    NotReady,
}

/// Serves lookups and owns the installed artifact.
pub struct LookupService {
    current: ArcSwapOption<Artifact>,
    state: AtomicU8,
}

impl Default for LookupService {
    fn default() -> Self {
        Self::new()
    }
}

impl LookupService {
    pub fn new() -> Self {
        Self { current: ArcSwapOption::empty(), state: AtomicU8::new(ServiceState::Idle as u8) }
    }

    pub fn state(&self) -> ServiceState {
        ServiceState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Look up an address string. Never blocks on a refresh.
    pub fn lookup(&self, address: &str) -> LookupOutcome {
        let guard = self.current.load();
        let Some(artifact) = &*guard else {
            return LookupOutcome::NotReady;
        };

        let ip: IpAddr = match address.trim().parse() {
            Ok(ip) => ip,
            Err(_) => {
                tracing::debug!(address, "not an IP address");
                return LookupOutcome::NotFound;
            }
        };

        match artifact.db.lookup(ip) {
            Ok(Some(record)) => LookupOutcome::Found(record),
            Ok(None) => LookupOutcome::NotFound,
            Err(e) => {
                tracing::warn!(%ip, error = %e, "database lookup failed");
                LookupOutcome::NotFound
            }
        }
    }

    /// Currently installed artifact, if any.
    pub fn current(&self) -> Option<Arc<Artifact>> {
        self.current.load_full()
    }

    /// Atomically replace the installed artifact, returning the previous one.
    pub fn install(&self, artifact: Artifact) -> Option<Arc<Artifact>> {
        tracing::info!(path = %artifact.path.display(), database = %artifact.db.describe(), "installing database");
        let previous = self.current.swap(Some(Arc::new(artifact)));
        if self.state() == ServiceState::Idle {
            self.set_state(ServiceState::Ready);
        }
        previous
    }

    /// Mark a refresh cycle as started.
    pub fn begin_refresh(&self) {
        self.set_state(ServiceState::Refreshing);
    }

    /// Mark a refresh cycle as finished; state follows artifact presence.
    pub fn finish_refresh(&self) {
        let state = if self.current.load().is_some() { ServiceState::Ready } else { ServiceState::Idle };
        self.set_state(state);
    }

    fn set_state(&self, state: ServiceState) {
        self.state.store(state as u8, Ordering::Release);
    }
}
