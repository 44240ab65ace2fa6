//! One fetch-and-install cycle.
//!
//! ### Protocol
//! 1. Build a request from local file presence and remembered validators.
//! 2. Send it within the configured timeout.
//! 3. `304` leaves everything as is. `200` is written to a staging file next
//!    to the database, loaded, renamed over the database file, its validators
//!    are remembered and the new artifact is installed. Anything else is a
//!    failure that leaves the installed artifact and the validators untouched.
//!
//! A download that fails to load does not update the validators, so the
//! next cycle downloads it again in full.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use geofresh_core::{AppConfig, Artifact, ConfigError, DatabaseLoader, Error, GeoDatabase, LookupService, Validators};
use reqwest::StatusCode;

use crate::request::RequestBuilder;
use crate::transport::{DownloadResponse, Transport};
use crate::validators::ValidatorStore;

/// Suffix of the staging file a download is written to before the rename.
const STAGING_SUFFIX: &str = ".download";

/// Settings the refresher needs from the application config.
#[derive(Debug, Clone)]
pub struct RefreshSettings {
    pub base_url: String,
    pub db_path: PathBuf,
    pub timeout: Duration,
}

impl RefreshSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: config.require_base_url()?.to_string(),
            db_path: config.db_path.clone(),
            timeout: config.timeout(),
        })
    }
}

/// What a successful cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new database was downloaded and installed.
    Installed,
    /// The origin confirmed the local copy is current.
    NotModified,
}

/// Downloads the database and hands new versions to the lookup service.
pub struct Refresher {
    transport: Arc<dyn Transport>,
    loader: Arc<dyn DatabaseLoader>,
    service: Arc<LookupService>,
    requests: RequestBuilder,
    validators: ValidatorStore,
    db_path: PathBuf,
    timeout: Duration,
}

impl Refresher {
    pub fn new(
        settings: RefreshSettings, transport: Arc<dyn Transport>, loader: Arc<dyn DatabaseLoader>,
        service: Arc<LookupService>,
    ) -> Result<Self, Error> {
        Ok(Self {
            transport,
            loader,
            service,
            requests: RequestBuilder::new(&settings.base_url)?,
            validators: ValidatorStore::new(),
            db_path: settings.db_path,
            timeout: settings.timeout,
        })
    }

    pub fn service(&self) -> &Arc<LookupService> {
        &self.service
    }

    pub fn validators(&self) -> &Validators {
        self.validators.current()
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Install the database file left by a previous run, if there is one.
    ///
    /// Returns `Ok(false)` when there is no local file.
    pub async fn boot_from_local(&self) -> Result<bool, Error> {
        if !is_file(&self.db_path).await {
            tracing::info!(path = %self.db_path.display(), "no local database, waiting for first download");
            return Ok(false);
        }

        let db = self.load(self.db_path.clone()).await?;
        self.service.install(Artifact::new(db, &self.db_path, Validators::default()));
        Ok(true)
    }

    /// Run one cycle with state transitions and logging.
    ///
    /// Failures are logged and returned; they never touch the installed artifact.
    pub async fn run_cycle(&mut self) -> Result<RefreshOutcome, Error> {
        self.service.begin_refresh();
        let result = self.refresh().await;
        self.service.finish_refresh();

        match &result {
            Ok(RefreshOutcome::Installed) => tracing::info!(path = %self.db_path.display(), "database updated"),
            Ok(RefreshOutcome::NotModified) => tracing::info!("database is up to date"),
            Err(e) => tracing::warn!(error = %e, transient = e.is_transient(), "database refresh failed"),
        }

        result
    }

    /// Fetch and, if the origin has a new version, install it.
    pub async fn refresh(&mut self) -> Result<RefreshOutcome, Error> {
        let local_file_exists = is_file(&self.db_path).await;
        let request = self.requests.build(local_file_exists, self.validators.current());

        tracing::debug!(url = %request.url, conditional = request.is_conditional(), "checking for database update");

        let response = tokio::time::timeout(self.timeout, self.transport.send(&request))
            .await
            .map_err(|_| Error::FetchTimeout(format!("no response within {}ms", self.timeout.as_millis())))??;

        match response.status {
            StatusCode::NOT_MODIFIED => Ok(RefreshOutcome::NotModified),
            StatusCode::OK => self.install(response).await.map(|_| RefreshOutcome::Installed),
            status => Err(Error::HttpError(format!("unexpected status {}", status.as_u16()))),
        }
    }

    async fn install(&mut self, response: DownloadResponse) -> Result<(), Error> {
        if response.body.is_empty() {
            return Err(Error::LoadFailed("empty response body".into()));
        }

        let staging = staging_path(&self.db_path);
        if let Err(e) = write_staging(&self.db_path, &staging, &response.body).await {
            discard(&staging).await;
            return Err(e.into());
        }

        let db = match self.load(staging.clone()).await {
            Ok(db) => db,
            Err(e) => {
                discard(&staging).await;
                return Err(e);
            }
        };

        if let Err(e) = tokio::fs::rename(&staging, &self.db_path).await {
            discard(&staging).await;
            return Err(e.into());
        }

        self.validators.remember(&response.headers);
        self.service.install(Artifact::new(db, &self.db_path, self.validators.current().clone()));

        tracing::debug!(bytes = response.body.len(), fetch_ms = response.fetch_ms, "installed downloaded database");
        Ok(())
    }

    async fn load(&self, path: PathBuf) -> Result<Arc<dyn GeoDatabase>, Error> {
        let loader = Arc::clone(&self.loader);
        tokio::task::spawn_blocking(move || loader.load(&path))
            .await
            .map_err(|e| Error::LoadFailed(format!("loader task failed: {e}")))?
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(STAGING_SUFFIX);
    path.with_file_name(name)
}

async fn write_staging(db_path: &Path, staging: &Path, body: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(staging, body).await
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove staging file");
    }
}
