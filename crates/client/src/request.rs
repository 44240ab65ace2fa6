//! Conditional download request construction.

use geofresh_core::{Error, Validators};
use reqwest::Url;

use crate::transport::DownloadRequest;

/// Parse the configured origin URL.
///
/// Only `http` and `https` are accepted; fragments are dropped.
pub fn parse_base_url(input: &str) -> Result<Url, Error> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidUrl("empty URL".into()));
    }

    let mut url = Url::parse(trimmed).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(Error::InvalidUrl(format!("unsupported scheme: {scheme}"))),
    }
    url.set_fragment(None);
    Ok(url)
}

/// Builds download requests for the configured origin.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    base_url: Url,
}

impl RequestBuilder {
    pub fn new(base_url: &str) -> Result<Self, Error> {
        Ok(Self { base_url: parse_base_url(base_url)? })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Request for the database.
    ///
    /// Validators are attached only when a local copy exists; without one a
    /// "not modified" answer would leave the process with no database at all.
    pub fn build(&self, local_file_exists: bool, validators: &Validators) -> DownloadRequest {
        let mut request = DownloadRequest::unconditional(self.base_url.clone());
        if local_file_exists {
            request.if_none_match = validators.etag.clone();
            request.if_modified_since = validators.last_modified.clone();
        }
        request
    }
}
