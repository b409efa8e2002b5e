// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Persists reports and notifies the caller.
//!
//! Every step may fail on its own. Failures are logged and absorbed, a failed
//! write only removes the corresponding reference from the notification.
use crate::{
    config,
    models::{CanonicalReport, ScanRequest},
    notification::{Failure, Notification, Notifier, ScannerType, Success},
    storage::{ObjectStorage, SIGNED_REFERENCE_TTL, SignedReference},
};

const JSON: &str = "application/json";
const XML: &str = "application/xml";

/// References of a stored artifact
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stored {
    pub url: Option<String>,
    pub signed: Option<SignedReference>,
}

/// Outcome of the notification step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notified {
    /// The request contained no callback
    Skipped,
    Sent,
    Failed,
}

/// What was delivered for a successful scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub report: Stored,
    /// Only set when a raw report was handed over
    pub raw_report: Option<Stored>,
    pub notified: Notified,
}

pub struct Pipeline<'a> {
    storage: &'a dyn ObjectStorage,
    notifier: &'a dyn Notifier,
    config: &'a config::Storage,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        storage: &'a dyn ObjectStorage,
        notifier: &'a dyn Notifier,
        config: &'a config::Storage,
    ) -> Self {
        Self {
            storage,
            notifier,
            config,
        }
    }

    /// Storage path of an artifact without extension.
    ///
    /// Lightweight results are keyed by scan ID, heavyweight results by user
    /// and scan ID.
    pub fn artifact_path(&self, scanner_type: ScannerType, request: &ScanRequest) -> String {
        match scanner_type {
            ScannerType::Hybrid => {
                format!("{}/{}", self.config.lightweight_prefix, request.scan_id)
            }
            ScannerType::Openvas => format!(
                "{}/{}/{}",
                self.config.heavyweight_prefix, request.user_id, request.scan_id
            ),
        }
    }

    async fn persist(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Stored {
        let url = match self.storage.put(path, bytes, content_type).await {
            Ok(url) => url,
            Err(error) => {
                tracing::warn!(path, %error, "Storing artifact failed, continuing without it");
                return Stored::default();
            }
        };
        let signed = if self.config.sign_references {
            match self
                .storage
                .signed_reference(path, SIGNED_REFERENCE_TTL)
                .await
            {
                Ok(signed) => Some(signed),
                Err(error) => {
                    tracing::warn!(
                        path,
                        %error,
                        "Signing artifact failed, continuing without signed reference"
                    );
                    None
                }
            }
        } else {
            None
        };
        Stored {
            url: Some(url),
            signed,
        }
    }

    async fn notify(&self, request: &ScanRequest, notification: Notification) -> Notified {
        let Some(url) = request.callback_url.as_deref() else {
            tracing::debug!(scan_id = %request.scan_id, "no callback, skipping notification");
            return Notified::Skipped;
        };
        match self.notifier.notify(url, &notification).await {
            Ok(()) => {
                tracing::info!(
                    scan_id = %request.scan_id,
                    status = ?notification.status(),
                    "Notification sent"
                );
                Notified::Sent
            }
            Err(error) => {
                tracing::warn!(scan_id = %request.scan_id, %error, "Notification failed");
                Notified::Failed
            }
        }
    }

    /// Stores the report, and the raw report when given, then sends one
    /// success notification.
    pub async fn deliver_success(
        &self,
        scanner_type: ScannerType,
        request: &ScanRequest,
        report: &CanonicalReport,
        raw_report: Option<&str>,
    ) -> Delivered {
        let path = self.artifact_path(scanner_type, request);
        let stored = match serde_json::to_vec_pretty(report) {
            Ok(bytes) => self.persist(&format!("{path}.json"), bytes, JSON).await,
            Err(error) => {
                tracing::warn!(scan_id = %request.scan_id, %error, "Unable to serialize report");
                Stored::default()
            }
        };
        let raw_stored = match raw_report {
            Some(raw) => Some(
                self.persist(&format!("{path}.xml"), raw.as_bytes().to_vec(), XML)
                    .await,
            ),
            None => None,
        };

        let mut success = Success::new(
            &request.scan_id,
            &request.user_id,
            scanner_type,
            report.summary().clone(),
        );
        success.storage_url = stored.url.clone();
        if let Some(signed) = &stored.signed {
            success.signed_url = Some(signed.url.clone());
            success.signed_url_expiry = Some(signed.expiry());
        }
        if let Some(raw) = &raw_stored {
            success.raw_report_storage_url = raw.url.clone();
            if let Some(signed) = &raw.signed {
                success.raw_report_signed_url = Some(signed.url.clone());
                success.raw_report_signed_url_expiry = Some(signed.expiry());
            }
        }
        let notified = self.notify(request, Notification::Success(success)).await;
        Delivered {
            report: stored,
            raw_report: raw_stored,
            notified,
        }
    }

    /// Sends one failure notification, nothing is stored.
    pub async fn deliver_failure(
        &self,
        scanner_type: ScannerType,
        request: &ScanRequest,
        message: &str,
    ) -> Notified {
        let failure = Failure::new(
            &request.scan_id,
            &request.user_id,
            scanner_type,
            message.to_string(),
        );
        self.notify(request, Notification::Failure(failure)).await
    }
}
