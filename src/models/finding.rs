// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Coarse classification of a severity score.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SeverityBucket {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl SeverityBucket {
    /// Classifies a score.
    ///
    /// `>= 9.0` critical, `>= 7.0` high, `>= 4.0` medium, `> 0` low, otherwise none.
    pub fn from_score(score: f32) -> Self {
        if score >= 9.0 {
            SeverityBucket::Critical
        } else if score >= 7.0 {
            SeverityBucket::High
        } else if score >= 4.0 {
            SeverityBucket::Medium
        } else if score > 0.0 {
            SeverityBucket::Low
        } else {
            SeverityBucket::None
        }
    }
}

impl Display for SeverityBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                SeverityBucket::None => "none",
                SeverityBucket::Low => "low",
                SeverityBucket::Medium => "medium",
                SeverityBucket::High => "high",
                SeverityBucket::Critical => "critical",
            }
        )
    }
}

/// Canonical vulnerability record.
///
/// The bucket is always derived from the score, it cannot be set on its own.
/// Deserializing a finding derives the bucket again and ignores a stored one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "FindingRecord")]
pub struct Finding {
    /// CVE or backend specific identifier
    pub id: String,
    severity_score: f32,
    severity_bucket: SeverityBucket,
    pub title: String,
    pub description: String,
    /// Host and port the finding belongs to
    pub context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_severity_vector: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FindingRecord {
    id: String,
    severity_score: f32,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    context: String,
    #[serde(default)]
    raw_severity_vector: Option<String>,
}

impl From<FindingRecord> for Finding {
    fn from(r: FindingRecord) -> Self {
        Finding::new(r.id, r.severity_score, r.title, r.description, r.context)
            .with_severity_vector(r.raw_severity_vector)
    }
}

impl Finding {
    /// Creates a new finding, scores outside of 0 to 10 are clamped.
    pub fn new<I, T, D, C>(id: I, severity_score: f32, title: T, description: D, context: C) -> Self
    where
        I: Into<String>,
        T: Into<String>,
        D: Into<String>,
        C: Into<String>,
    {
        let severity_score = if severity_score.is_nan() {
            0.0
        } else {
            severity_score.clamp(0.0, 10.0)
        };
        Self {
            id: id.into(),
            severity_score,
            severity_bucket: SeverityBucket::from_score(severity_score),
            title: title.into(),
            description: description.into(),
            context: context.into(),
            raw_severity_vector: None,
        }
    }

    pub fn with_severity_vector(mut self, vector: Option<String>) -> Self {
        self.raw_severity_vector = vector.filter(|v| !v.is_empty());
        self
    }

    pub fn severity_score(&self) -> f32 {
        self.severity_score
    }

    pub fn severity_bucket(&self) -> SeverityBucket {
        self.severity_bucket
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_thresholds() {
        let expected = [
            (10.0, SeverityBucket::Critical),
            (9.0, SeverityBucket::Critical),
            (8.99, SeverityBucket::High),
            (7.0, SeverityBucket::High),
            (6.9, SeverityBucket::Medium),
            (4.0, SeverityBucket::Medium),
            (3.9, SeverityBucket::Low),
            (0.1, SeverityBucket::Low),
            (0.0, SeverityBucket::None),
        ];
        for (score, bucket) in expected {
            assert_eq!(SeverityBucket::from_score(score), bucket, "score {score}");
        }
    }

    #[test]
    fn clamps_score() {
        let finding = Finding::new("x", 12.5, "", "", "");
        assert_eq!(finding.severity_score(), 10.0);
        assert_eq!(finding.severity_bucket(), SeverityBucket::Critical);
        let finding = Finding::new("x", f32::NAN, "", "", "");
        assert_eq!(finding.severity_bucket(), SeverityBucket::None);
    }

    #[test]
    fn stored_bucket_is_derived_again() {
        let json = r#"{
            "id": "CVE-2021-41773",
            "severityScore": 9.8,
            "severityBucket": "low",
            "title": "t",
            "description": "d",
            "context": "h:80"
        }"#;
        let finding: Finding = serde_json::from_str(json).unwrap();
        assert_eq!(finding.severity_bucket(), SeverityBucket::Critical);
        let value = serde_json::to_value(&finding).unwrap();
        assert_eq!(value["severityBucket"], "critical");
        assert!(value.get("severity").is_none());
        assert!(value.get("rawSeverityVector").is_none());
    }
}
