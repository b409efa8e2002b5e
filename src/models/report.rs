// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use super::{Finding, ScanID, ServiceObservation, SeverityBucket};

/// Counts derived from the lists of a [`CanonicalReport`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_services: usize,
    pub total_findings: usize,
    /// Only buckets with at least one finding are present
    pub severity_histogram: BTreeMap<SeverityBucket, usize>,
}

impl Summary {
    fn derive(services: &[ServiceObservation], findings: &[Finding]) -> Self {
        let mut severity_histogram = BTreeMap::new();
        for finding in findings {
            *severity_histogram
                .entry(finding.severity_bucket())
                .or_insert(0) += 1;
        }
        Self {
            total_services: services.len(),
            total_findings: findings.len(),
            severity_histogram,
        }
    }
}

/// The single normalized result of a scan.
///
/// It can only be created via [`CanonicalReport::new`], which orders the
/// findings and derives the summary from the final lists. There is no way to
/// change the lists afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalReport {
    scan_id: ScanID,
    target: String,
    timestamp: String,
    services: Vec<ServiceObservation>,
    findings: Vec<Finding>,
    summary: Summary,
}

impl CanonicalReport {
    pub fn new(
        scan_id: ScanID,
        target: String,
        timestamp: DateTime<Utc>,
        services: Vec<ServiceObservation>,
        mut findings: Vec<Finding>,
    ) -> Self {
        // sort_by is stable, ties keep the order of the source
        findings.sort_by(|a, b| b.severity_score().total_cmp(&a.severity_score()));
        let summary = Summary::derive(&services, &findings);
        Self {
            scan_id,
            target,
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            services,
            findings,
            summary,
        }
    }

    pub fn scan_id(&self) -> &str {
        &self.scan_id
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// UTC timestamp in RFC 3339 format
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn services(&self) -> &[ServiceObservation] {
        &self.services
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }
}
