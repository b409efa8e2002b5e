// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

/// References of a task provisioned on the scan backend.
///
/// The task itself is owned by the backend; only the identifiers are kept
/// until the report has been retrieved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanTask {
    pub target_id: String,
    pub task_id: String,
    /// Known after the task has been started or has finished
    pub report_id: Option<String>,
}
