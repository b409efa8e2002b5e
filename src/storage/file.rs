// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::{Error, ObjectStorage, SignedReference, check_path, expiry};

type HmacSha256 = Hmac<Sha256>;

/// Stores objects as files below a root directory.
///
/// Signed references point to `public_url`, where the root directory is
/// expected to be served. The signature is a HMAC-SHA256 over path and expiry.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
    public_url: String,
    signing_key: Vec<u8>,
}

impl FileStorage {
    pub fn new(root: PathBuf, public_url: &str, signing_key: &[u8]) -> Self {
        Self {
            root,
            public_url: public_url.trim_end_matches('/').to_string(),
            signing_key: signing_key.to_vec(),
        }
    }

    pub fn from_config(config: &crate::config::Storage) -> Self {
        Self::new(
            config.path.clone(),
            &config.public_url,
            config.signing_key.as_bytes(),
        )
    }

    fn mac(&self, path: &str, expires: i64) -> Result<HmacSha256, Error> {
        if self.signing_key.is_empty() {
            return Err(Error::Signing(
                path.to_string(),
                "no signing key configured".to_string(),
            ));
        }
        let mut mac = HmacSha256::new_from_slice(&self.signing_key)
            .map_err(|e| Error::Signing(path.to_string(), e.to_string()))?;
        mac.update(path.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }

    /// Verifies a signature created by [`ObjectStorage::signed_reference`].
    pub fn verify(&self, path: &str, expires: i64, signature: &str, now: DateTime<Utc>) -> bool {
        if now.timestamp() > expires {
            return false;
        }
        let Ok(signature) = hex::decode(signature) else {
            return false;
        };
        match self.mac(path, expires) {
            Ok(mac) => mac.verify_slice(&signature).is_ok(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl ObjectStorage for FileStorage {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, Error> {
        check_path(path)?;
        let target = self.root.join(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::write(path, e))?;
        }
        tokio::fs::write(&target, &bytes)
            .await
            .map_err(|e| Error::write(path, e))?;
        tracing::debug!(path, content_type, bytes = bytes.len(), "stored object");
        Ok(format!("file://{}", target.display()))
    }

    async fn signed_reference(&self, path: &str, ttl: Duration) -> Result<SignedReference, Error> {
        check_path(path)?;
        let is_file = tokio::fs::metadata(self.root.join(path))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(Error::NotFound(path.to_string()));
        }
        let expires = expiry(ttl, path)?;
        let signature = hex::encode(self.mac(path, expires.timestamp())?.finalize().into_bytes());
        let encoded = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        Ok(SignedReference {
            url: format!(
                "{}/{encoded}?expires={}&signature={signature}",
                self.public_url,
                expires.timestamp()
            ),
            expires,
        })
    }
}
