// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::{collections::HashMap, sync::RwLock, time::Duration};

use async_trait::async_trait;

use super::{Error, ObjectStorage, SignedReference, check_path, expiry};

/// Stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Keeps objects in memory, mainly used for tests.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    objects: RwLock<HashMap<String, Object>>,
    failing: bool,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that rejects every write.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn get(&self, path: &str) -> Result<Option<Object>, Error> {
        Ok(self.objects.read()?.get(path).cloned())
    }

    /// Paths of all stored objects, sorted.
    pub fn paths(&self) -> Result<Vec<String>, Error> {
        let mut paths: Vec<String> = self.objects.read()?.keys().cloned().collect();
        paths.sort();
        Ok(paths)
    }
}

#[async_trait]
impl ObjectStorage for InMemoryStorage {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, Error> {
        check_path(path)?;
        if self.failing {
            return Err(Error::Write(
                path.to_string(),
                "storage rejects writes".to_string(),
            ));
        }
        self.objects.write()?.insert(
            path.to_string(),
            Object {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(format!("memory://{path}"))
    }

    async fn signed_reference(&self, path: &str, ttl: Duration) -> Result<SignedReference, Error> {
        if !self.objects.read()?.contains_key(path) {
            return Err(Error::NotFound(path.to_string()));
        }
        let expires = expiry(ttl, path)?;
        Ok(SignedReference {
            url: format!("memory://{path}?expires={}", expires.timestamp()),
            expires,
        })
    }
}
