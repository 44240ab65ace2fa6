//! Fakes shared by the refresher and scheduler tests.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use geofresh_core::{DatabaseLoader, Error, GeoDatabase, Record};
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde_json::json;

use crate::transport::{DownloadRequest, DownloadResponse, Transport};

pub const BASE_URL: &str = "https://download.example.com/GeoLite2-City.mmdb";

/// Database file format for tests: one `ip country` pair per line.
/// A file starting with `corrupt` fails to load.
pub struct TextDatabase {
    records: HashMap<IpAddr, Record>,
    label: String,
}

impl GeoDatabase for TextDatabase {
    fn lookup(&self, ip: IpAddr) -> Result<Option<Record>, Error> {
        Ok(self.records.get(&ip).cloned())
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

pub struct TextLoader;

impl DatabaseLoader for TextLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn GeoDatabase>, Error> {
        let text = std::fs::read_to_string(path)?;
        if text.starts_with("corrupt") {
            return Err(Error::LoadFailed("bad metadata section".into()));
        }
        let mut records = HashMap::new();
        for line in text.lines() {
            let Some((ip, country)) = line.split_once(' ') else { continue };
            let ip: IpAddr = ip.parse().map_err(|_| Error::LoadFailed(format!("bad line: {line}")))?;
            records.insert(ip, Record(json!({ "country": { "iso_code": country }, "source": text.lines().next() })));
        }
        Ok(Arc::new(TextDatabase { records, label: format!("text db ({} records)", text.lines().count()) }))
    }
}

pub fn ok_response(body: &'static str, etag: Option<&'static str>, last_modified: Option<&'static str>) -> DownloadResponse {
    let mut headers = HeaderMap::new();
    if let Some(etag) = etag {
        headers.insert(header::ETAG, HeaderValue::from_static(etag));
    }
    if let Some(lm) = last_modified {
        headers.insert(header::LAST_MODIFIED, HeaderValue::from_static(lm));
    }
    DownloadResponse { status: StatusCode::OK, headers, body: Bytes::from_static(body.as_bytes()), fetch_ms: 1 }
}

pub fn status_response(status: StatusCode) -> DownloadResponse {
    DownloadResponse { status, headers: HeaderMap::new(), body: Bytes::new(), fetch_ms: 1 }
}

pub enum Step {
    Respond(DownloadResponse),
    Fail(Error),
    Stall(Duration),
}

/// Replays scripted steps in order and records every request.
/// Once the script runs out it answers 304.
#[derive(Default)]
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    seen: Mutex<Vec<(DownloadRequest, tokio::time::Instant)>>,
    in_flight: Mutex<usize>,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self { steps: Mutex::new(steps.into()), ..Default::default() })
    }

    pub fn requests(&self) -> Vec<DownloadRequest> {
        self.seen.lock().unwrap().iter().map(|(r, _)| r.clone()).collect()
    }

    pub fn request_times(&self) -> Vec<tokio::time::Instant> {
        self.seen.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &DownloadRequest) -> Result<DownloadResponse, Error> {
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            assert_eq!(*in_flight, 0, "overlapping fetches");
            *in_flight += 1;
        }
        self.seen.lock().unwrap().push((request.clone(), tokio::time::Instant::now()));
        let step = self.steps.lock().unwrap().pop_front();

        let result = match step {
            Some(Step::Respond(response)) => Ok(response),
            Some(Step::Fail(err)) => Err(err),
            Some(Step::Stall(duration)) => {
                let guard = InFlightGuard(&self.in_flight);
                tokio::time::sleep(duration).await;
                drop(guard);
                return Ok(status_response(StatusCode::NOT_MODIFIED));
            }
            None => Ok(status_response(StatusCode::NOT_MODIFIED)),
        };
        *self.in_flight.lock().unwrap() -= 1;
        result
    }
}

/// Decrements the in-flight counter even when the stalled future is dropped.
struct InFlightGuard<'a>(&'a Mutex<usize>);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut n) = self.0.lock() {
            *n -= 1;
        }
    }
}
