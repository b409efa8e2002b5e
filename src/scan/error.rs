// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::time::Duration;

use thiserror::Error;

use crate::{
    config::duration::format_duration,
    gmp, lookup,
    models::RequestError,
    notification,
    orchestrator::{self, TaskState},
};

/// Errors that change the outcome of a scan.
///
/// Storage and notification failures never show up here, they are absorbed
/// by the delivery pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("Invalid request: {0}")]
    InputValidation(#[from] RequestError),
    #[error(transparent)]
    Backend(#[from] gmp::Error),
    #[error("Scan task ended with status {0}")]
    Terminal(TaskState),
    #[error(
        "Scan timed out: task did not finish within {} (last status {last_status})",
        format_duration(.ceiling)
    )]
    Timeout {
        ceiling: Duration,
        last_status: String,
    },
}

impl From<orchestrator::Error> for ScanError {
    fn from(value: orchestrator::Error) -> Self {
        match value {
            orchestrator::Error::Backend(e) => Self::Backend(e),
            orchestrator::Error::Ended(state) => Self::Terminal(state),
            orchestrator::Error::TimedOut {
                ceiling,
                last_status,
            } => Self::Timeout {
                ceiling,
                last_status,
            },
        }
    }
}

/// Errors while assembling a [`super::Runner`] from configuration
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Unable to load vulnerability dataset: {0}")]
    Lookup(#[from] lookup::Error),
    #[error("Unable to create notifier: {0}")]
    Notification(#[from] notification::Error),
}
