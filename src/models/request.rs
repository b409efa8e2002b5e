// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use serde::Deserialize;
use thiserror::Error;

/// Unique ID of a logical scan, assigned by the caller
pub type ScanID = String;

/// Request to run exactly one scan against a single target.
///
/// A request is only constructed through [`ScanRequest::from_json`] or
/// [`TryFrom<RawScanRequest>`], both of which reject incomplete input before
/// anything is provisioned.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    /// Unique ID of the scan
    pub scan_id: ScanID,
    /// Owner of the scan
    pub user_id: String,
    /// Hostname or address to scan
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// URL that receives the final notification
    pub callback_url: Option<String>,
}

/// Unvalidated inbound request as it arrives on the wire
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawScanRequest {
    #[serde(default)]
    pub scan_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("Target {0} is not a hostname or address")]
    InvalidTarget(String),
}

impl ScanRequest {
    /// Parses and validates an inbound JSON request.
    pub fn from_json(json: &str) -> Result<Self, RequestError> {
        let raw: RawScanRequest =
            serde_json::from_str(json).map_err(|e| RequestError::InvalidJson(e.to_string()))?;
        raw.try_into()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl TryFrom<RawScanRequest> for ScanRequest {
    type Error = RequestError;

    fn try_from(raw: RawScanRequest) -> Result<Self, Self::Error> {
        let scan_id = non_empty(raw.scan_id);
        let user_id = non_empty(raw.user_id);
        let target = non_empty(raw.target);
        match (scan_id, user_id, target) {
            (Some(scan_id), Some(user_id), Some(target)) => {
                // the target ends up as an argument of external tools
                if target.starts_with('-') || target.chars().any(char::is_whitespace) {
                    return Err(RequestError::InvalidTarget(target));
                }
                Ok(ScanRequest {
                    scan_id,
                    user_id,
                    target,
                    callback_url: non_empty(raw.callback_url),
                })
            }
            (scan_id, user_id, target) => {
                let missing = [
                    ("scanId", scan_id.is_none()),
                    ("userId", user_id.is_none()),
                    ("target", target.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, missing)| missing.then_some(name))
                .collect();
                Err(RequestError::MissingFields(missing))
            }
        }
    }
}
