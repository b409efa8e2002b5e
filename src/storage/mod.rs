// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Durable storage of reports.
//!
//! Objects are addressed by relative, `/` separated paths. Storing returns a
//! reference to the object, signing returns a URL that is valid until its
//! expiry.
use std::{io, sync::PoisonError, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

mod file;
mod inmemory;

pub use file::FileStorage;
pub use inmemory::InMemoryStorage;

/// Lifetime of signed references
pub const SIGNED_REFERENCE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Invalid storage path {0}")]
    InvalidPath(String),
    #[error("Unable to write {0}: {1}")]
    Write(String, String),
    #[error("Unable to sign {0}: {1}")]
    Signing(String, String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Unexpected issue: {0}")]
    Dirty(String),
}

impl<S> From<PoisonError<S>> for Error {
    fn from(value: PoisonError<S>) -> Self {
        Self::Dirty(format!("{value:?}"))
    }
}

impl Error {
    fn write(path: &str, err: io::Error) -> Self {
        Self::Write(path.to_string(), err.to_string())
    }
}

/// A time limited URL to a stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedReference {
    pub url: String,
    pub expires: DateTime<Utc>,
}

impl SignedReference {
    /// Expiry as RFC 3339 UTC timestamp
    pub fn expiry(&self) -> String {
        self.expires.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores bytes under path and returns a reference to them.
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, Error>;

    /// Returns a reference that grants read access until now + ttl.
    async fn signed_reference(&self, path: &str, ttl: Duration) -> Result<SignedReference, Error>;
}

/// Verifies that a path is relative and does not leave its root.
pub fn check_path(path: &str) -> Result<(), Error> {
    let valid = !path.is_empty()
        && !path.starts_with('/')
        && path.split('/').all(|segment| {
            !segment.is_empty() && segment != "." && segment != ".." && !segment.contains('\\')
        });
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidPath(path.to_string()))
    }
}

fn expiry(ttl: Duration, path: &str) -> Result<DateTime<Utc>, Error> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| Error::Signing(path.to_string(), format!("invalid ttl {ttl:?}")))
}
