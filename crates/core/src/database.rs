//! Queryable geolocation database.
//!
//! The on-disk format is MaxMind DB, read through the `maxminddb` crate.
//! Records are decoded schema-free so the same reader serves City, Country
//! and ASN editions.

use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use maxminddb::{MaxMindDBError, Reader};

use crate::Error;

/// One decoded database record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record(pub serde_json::Value);

impl Record {
    /// ISO 3166-1 alpha-2 code of the country, when present.
    pub fn country_iso_code(&self) -> Option<&str> {
        self.0.pointer("/country/iso_code").and_then(|v| v.as_str())
    }

    /// City name in the given locale (e.g. "en").
    pub fn city_name(&self, locale: &str) -> Option<&str> {
        self.0
            .get("city")
            .and_then(|city| city.get("names"))
            .and_then(|names| names.get(locale))
            .and_then(|v| v.as_str())
    }

    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }
}

/// A loaded database that answers address lookups.
pub trait GeoDatabase: Send + Sync {
    /// Record for `ip`, or `None` if the address is not in the database.
    fn lookup(&self, ip: IpAddr) -> Result<Option<Record>, Error>;

    /// Short description used in logs (edition, build time).
    fn describe(&self) -> String;
}

/// Turns a file on disk into a [`GeoDatabase`].
///
/// Loading is blocking; callers run it off the async executor.
pub trait DatabaseLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Arc<dyn GeoDatabase>, Error>;
}

/// [`GeoDatabase`] backed by a MaxMind DB file read into memory.
pub struct MaxMindDatabase {
    reader: Reader<Vec<u8>>,
}

impl MaxMindDatabase {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let reader = Reader::open_readfile(path)?;
        Ok(Self { reader })
    }
}

impl GeoDatabase for MaxMindDatabase {
    fn lookup(&self, ip: IpAddr) -> Result<Option<Record>, Error> {
        match self.reader.lookup::<serde_json::Value>(ip) {
            Ok(value) => Ok(Some(Record(value))),
            Err(MaxMindDBError::AddressNotFoundError(_)) => Ok(None),
            Err(e) => Err(Error::LookupFailed(e.to_string())),
        }
    }

    fn describe(&self) -> String {
        let metadata = &self.reader.metadata;
        format!("{} (build epoch {})", metadata.database_type, metadata.build_epoch)
    }
}

/// Loads MaxMind DB files.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxMindLoader;

impl DatabaseLoader for MaxMindLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn GeoDatabase>, Error> {
        let db = MaxMindDatabase::open(path)?;
        tracing::debug!(path = %path.display(), database = %db.describe(), "loaded database");
        Ok(Arc::new(db))
    }
}
