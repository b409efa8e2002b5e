// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Notification of the caller about the outcome of a scan.
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::models::Summary;

mod webhook;

pub use webhook::Webhook;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Unable to create HTTP client: {0}")]
    Client(String),
    #[error("Unable to deliver notification: {0}")]
    Transport(String),
    #[error("Notification answered with status {0}")]
    Status(u16),
    #[error("Unexpected issue: {0}")]
    Dirty(String),
}

/// Kind of scanner that produced the result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScannerType {
    /// Service discovery with vulnerability lookup
    Hybrid,
    /// Full vulnerability scan of the GMP backend
    Openvas,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Completed,
    Failed,
}

/// Payload of a finished scan
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Success {
    pub scan_id: String,
    pub user_id: String,
    pub status: Status,
    pub scanner_type: ScannerType,
    pub results_summary: Summary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_url_expiry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_report_storage_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_report_signed_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_report_signed_url_expiry: Option<String>,
}

impl Success {
    /// Creates a payload without any storage references.
    pub fn new(scan_id: &str, user_id: &str, scanner_type: ScannerType, summary: Summary) -> Self {
        Self {
            scan_id: scan_id.to_string(),
            user_id: user_id.to_string(),
            status: Status::Completed,
            scanner_type,
            results_summary: summary,
            storage_url: None,
            signed_url: None,
            signed_url_expiry: None,
            raw_report_storage_url: None,
            raw_report_signed_url: None,
            raw_report_signed_url_expiry: None,
        }
    }
}

/// Payload of a scan that could not be finished
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    pub scan_id: String,
    pub user_id: String,
    pub status: Status,
    pub scanner_type: ScannerType,
    pub error_message: String,
}

impl Failure {
    pub fn new(scan_id: &str, user_id: &str, scanner_type: ScannerType, message: String) -> Self {
        Self {
            scan_id: scan_id.to_string(),
            user_id: user_id.to_string(),
            status: Status::Failed,
            scanner_type,
            error_message: message,
        }
    }
}

/// Either a success or a failure, never both
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Notification {
    Success(Success),
    Failure(Failure),
}

impl Notification {
    pub fn status(&self) -> Status {
        match self {
            Notification::Success(s) => s.status,
            Notification::Failure(f) => f.status,
        }
    }
}

/// Sends a notification to a callback URL
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, url: &str, notification: &Notification) -> Result<(), Error>;
}

/// Records notifications instead of sending them, used for tests.
#[derive(Debug, Default)]
pub struct Recorder {
    sent: Mutex<Vec<(String, Notification)>>,
    failing: bool,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records but reports every notification as failed.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<(String, Notification)> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for Recorder {
    async fn notify(&self, url: &str, notification: &Notification) -> Result<(), Error> {
        self.sent
            .lock()
            .map_err(|e| Error::Dirty(e.to_string()))?
            .push((url.to_string(), notification.clone()));
        if self.failing {
            return Err(Error::Status(500));
        }
        Ok(())
    }
}
