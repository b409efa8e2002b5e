// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Converts the raw output of both scan paths into a [`CanonicalReport`].
use chrono::{DateTime, Utc};

use crate::{
    gmp::response::ReportResult,
    lookup::VulnerabilityLookup,
    models::{CanonicalReport, Finding, ScanRequest, ServiceObservation},
};

/// Score of every lookup match.
///
/// The dataset only knows which versions are affected, not how severe a
/// vulnerability is. Every match is therefore reported as high. This is a
/// known precision gap, not a measured score.
pub const DEFAULT_SEVERITY_SCORE: f32 = 7.5;

/// CVSS vector reported together with [`DEFAULT_SEVERITY_SCORE`]
pub const DEFAULT_SEVERITY_VECTOR: &str = "CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H";

/// Looks up the vulnerabilities of all identified services.
///
/// Services without product or version are never looked up.
pub fn correlate(
    target: &str,
    services: &[ServiceObservation],
    lookup: &dyn VulnerabilityLookup,
) -> Vec<Finding> {
    let mut findings = vec![];
    for service in services.iter().filter(|s| s.is_identified()) {
        let product = service.product.trim().to_lowercase();
        let version = service.version.trim();
        let ids = lookup.lookup(&product, version);
        tracing::trace!(%product, version, matches = ids.len(), "looked up service");
        for id in ids {
            let description = format!(
                "Known vulnerability affecting {product} {version}. See {id} for details."
            );
            findings.push(
                Finding::new(
                    id.clone(),
                    DEFAULT_SEVERITY_SCORE,
                    format!("{id} in {product} {version}"),
                    description,
                    format!("{target}:{}/{}", service.port, service.protocol),
                )
                .with_severity_vector(Some(DEFAULT_SEVERITY_VECTOR.to_string())),
            );
        }
    }
    findings
}

/// Creates a finding of a backend result, results without NVT are skipped.
pub fn finding_of_result(result: &ReportResult) -> Option<Finding> {
    let nvt = result.nvt.as_ref().filter(|n| !n.oid.trim().is_empty())?;
    let id = nvt.first_cve().unwrap_or(nvt.oid.trim());
    let title = match nvt.name.trim() {
        "" => result.name.trim(),
        name => name,
    };
    let description = match result.description.trim() {
        "" => nvt.tag("summary").unwrap_or_default(),
        description => description,
    };
    Some(
        Finding::new(
            id,
            result.severity_score(),
            title,
            description,
            result.context(),
        )
        .with_severity_vector(nvt.severity_vector().map(str::to_string)),
    )
}

/// Extracts the findings of backend results in their original order.
pub fn extract_findings(results: &[ReportResult]) -> Vec<Finding> {
    let findings: Vec<Finding> = results.iter().filter_map(finding_of_result).collect();
    if findings.len() != results.len() {
        tracing::debug!(
            results = results.len(),
            findings = findings.len(),
            "skipped results without NVT"
        );
    }
    findings
}

/// Report of the lightweight path: discovery and lookup.
pub fn lightweight_report(
    request: &ScanRequest,
    services: Vec<ServiceObservation>,
    lookup: &dyn VulnerabilityLookup,
    timestamp: DateTime<Utc>,
) -> CanonicalReport {
    let findings = correlate(&request.target, &services, lookup);
    CanonicalReport::new(
        request.scan_id.clone(),
        request.target.clone(),
        timestamp,
        services,
        findings,
    )
}

/// Report of the heavyweight path: results of a finished backend task.
pub fn heavyweight_report(
    request: &ScanRequest,
    services: Vec<ServiceObservation>,
    results: &[ReportResult],
    timestamp: DateTime<Utc>,
) -> CanonicalReport {
    CanonicalReport::new(
        request.scan_id.clone(),
        request.target.clone(),
        timestamp,
        services,
        extract_findings(results),
    )
}
