//! In-memory store for the validators of the last successful download.

use geofresh_core::Validators;
use reqwest::header::{self, HeaderMap};

/// Remembers `ETag` and `Last-Modified` of the last downloaded database.
///
/// Owned by the refresher, which is the only writer, so no locking.
/// Not persisted: a restarted process always performs a full download first.
#[derive(Debug, Default)]
pub struct ValidatorStore {
    current: Validators,
}

impl ValidatorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored validators with those of `headers`.
    ///
    /// A header that is missing or not valid text clears its field.
    pub fn remember(&mut self, headers: &HeaderMap) {
        self.current = Validators::new(header_text(headers, header::ETAG), header_text(headers, header::LAST_MODIFIED));
        tracing::debug!(etag = ?self.current.etag, last_modified = ?self.current.last_modified, "remembered validators");
    }

    pub fn current(&self) -> &Validators {
        &self.current
    }
}

fn header_text(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
