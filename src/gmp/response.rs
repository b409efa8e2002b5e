// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! # Responses of GMP commands
//!
//! Only the fields that are needed to drive a scan are deserialized, everything
//! else gvmd sends is ignored.
use std::fmt;

use serde::{Deserialize, de::Visitor};

/// Status code attribute of a response
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusCode(u16);

impl From<StatusCode> for u16 {
    fn from(value: StatusCode) -> Self {
        value.0
    }
}

impl<'de> Deserialize<'de> for StatusCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct MyVisitor;
        impl Visitor<'_> for MyVisitor {
            type Value = StatusCode;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("status code")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                value
                    .trim()
                    .parse::<u16>()
                    .map(StatusCode)
                    .map_err(|_| E::custom(format!("invalid status code {value}")))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u16::try_from(value)
                    .map(StatusCode)
                    .map_err(|_| E::custom(format!("invalid status code {value}")))
            }
        }
        deserializer.deserialize_any(MyVisitor)
    }
}

/// Wrapper around f32 to allow deserialization of strings, an empty string is 0.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StringF32(f32);

impl From<StringF32> for f32 {
    fn from(value: StringF32) -> Self {
        value.0
    }
}

impl<'de> Deserialize<'de> for StringF32 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct MyVisitor;
        impl Visitor<'_> for MyVisitor {
            type Value = StringF32;
            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("string")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                match value.trim() {
                    "" => Ok(StringF32(0.0)),
                    value => match value.parse::<f32>() {
                        Ok(value) => Ok(StringF32(value)),
                        Err(_) => Err(E::custom("invalid number")),
                    },
                }
            }
        }
        deserializer.deserialize_str(MyVisitor)
    }
}

/// Status response
#[derive(Debug, Deserialize, PartialEq)]
pub struct Status {
    #[serde(rename = "@status")]
    pub code: StatusCode,
    #[serde(rename = "@status_text", default)]
    pub text: String,
}

impl Status {
    /// gvmd answers with 200, 201 or 202 on success
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.code.0)
    }
}

/// Response from gvmd
#[derive(Debug, Deserialize, PartialEq)]
pub enum Response {
    /// Example:
    /// ```xml
    /// <authenticate_response status="200" status_text="OK">
    ///   <role>Admin</role>
    ///   <timezone>UTC</timezone>
    /// </authenticate_response>
    /// ```
    #[serde(rename = "authenticate_response")]
    Authenticate {
        #[serde(flatten)]
        status: Status,
    },
    /// Example:
    /// ```xml
    /// <get_targets_response status="200" status_text="OK">
    ///   <target id="b493b7a8-7489-11df-a3ec-002264764cea">
    ///     <name>target-1</name>
    ///   </target>
    /// </get_targets_response>
    /// ```
    #[serde(rename = "get_targets_response")]
    GetTargets {
        #[serde(flatten)]
        status: Status,
        #[serde(rename = "target", default)]
        targets: Vec<Entity>,
    },
    /// Example:
    /// ```xml
    /// <create_target_response status="201" status_text="OK, resource created"
    ///   id="b493b7a8-7489-11df-a3ec-002264764cea"/>
    /// ```
    #[serde(rename = "create_target_response")]
    CreateTarget {
        #[serde(flatten)]
        status: Status,
        #[serde(rename = "@id")]
        id: Option<String>,
    },
    /// Example:
    /// ```xml
    /// <get_scanners_response status="200" status_text="OK">
    ///   <scanner id="08b69003-5fc2-4037-a479-93b440211c73">
    ///     <name>OpenVAS Default</name>
    ///     <type>2</type>
    ///   </scanner>
    /// </get_scanners_response>
    /// ```
    #[serde(rename = "get_scanners_response")]
    GetScanners {
        #[serde(flatten)]
        status: Status,
        #[serde(rename = "scanner", default)]
        scanners: Vec<Scanner>,
    },
    /// Example:
    /// ```xml
    /// <create_task_response status="201" status_text="OK, resource created"
    ///   id="343435d6-91b0-11de-9478-ffd71f4c6f29"/>
    /// ```
    #[serde(rename = "create_task_response")]
    CreateTask {
        #[serde(flatten)]
        status: Status,
        #[serde(rename = "@id")]
        id: Option<String>,
    },
    /// Example:
    /// ```xml
    /// <start_task_response status="202" status_text="OK, request submitted">
    ///   <report_id>330ee785-c2c0-4d4c-ab96-725142c9b789</report_id>
    /// </start_task_response>
    /// ```
    #[serde(rename = "start_task_response")]
    StartTask {
        #[serde(flatten)]
        status: Status,
        report_id: Option<String>,
    },
    /// Example:
    /// ```xml
    /// <get_tasks_response status="200" status_text="OK">
    ///   <task id="343435d6-91b0-11de-9478-ffd71f4c6f29">
    ///     <status>Done</status>
    ///     <progress>-1</progress>
    ///     <last_report><report id="f0fdf522-276d-4893-9274-fb8699dc2270"/></last_report>
    ///   </task>
    /// </get_tasks_response>
    /// ```
    #[serde(rename = "get_tasks_response")]
    GetTasks {
        #[serde(flatten)]
        status: Status,
        #[serde(rename = "task", default)]
        tasks: Vec<Task>,
    },
    /// Response of get_reports, see `data/gmp/get_reports_response.xml`.
    #[serde(rename = "get_reports_response")]
    GetReports {
        #[serde(flatten)]
        status: Status,
        report: Option<Report>,
    },
}

impl Response {
    /// Get the status of the response
    pub fn status(&self) -> &Status {
        match self {
            Response::Authenticate { status }
            | Response::GetTargets { status, .. }
            | Response::CreateTarget { status, .. }
            | Response::GetScanners { status, .. }
            | Response::CreateTask { status, .. }
            | Response::StartTask { status, .. }
            | Response::GetTasks { status, .. }
            | Response::GetReports { status, .. } => status,
        }
    }

    /// Name of the root element of the response
    pub fn name(&self) -> &'static str {
        match self {
            Response::Authenticate { .. } => "authenticate_response",
            Response::GetTargets { .. } => "get_targets_response",
            Response::CreateTarget { .. } => "create_target_response",
            Response::GetScanners { .. } => "get_scanners_response",
            Response::CreateTask { .. } => "create_task_response",
            Response::StartTask { .. } => "start_task_response",
            Response::GetTasks { .. } => "get_tasks_response",
            Response::GetReports { .. } => "get_reports_response",
        }
    }
}

/// A named resource with an ID, e.g. a target
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Entity {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Scanner {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Either a numeric scanner type (2 is OpenVAS) or its name
    #[serde(rename = "type", default)]
    pub scanner_type: String,
}

impl Scanner {
    pub fn is_openvas(&self) -> bool {
        let scanner_type = self.scanner_type.trim();
        scanner_type == "2" || scanner_type.to_lowercase().contains("openvas")
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct IdReference {
    #[serde(rename = "@id")]
    pub id: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LastReport {
    pub report: Option<IdReference>,
}

/// Progress of a task, older gvmd versions add host progress elements
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Progress {
    #[serde(rename = "$text", default)]
    pub value: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Task {
    #[serde(rename = "@id")]
    pub id: String,
    pub status: Option<String>,
    pub progress: Option<Progress>,
    pub last_report: Option<LastReport>,
}

impl Task {
    pub fn last_report_id(&self) -> Option<String> {
        self.last_report
            .as_ref()
            .and_then(|l| l.report.as_ref())
            .map(|r| r.id.clone())
            .filter(|id| !id.is_empty())
    }

    pub fn progress(&self) -> Option<i32> {
        self.progress
            .as_ref()
            .and_then(|p| p.value.trim().parse().ok())
    }
}

/// Outer report element of get_reports, it wraps the actual report
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Report {
    #[serde(rename = "@id")]
    pub id: Option<String>,
    pub report: Option<ReportContent>,
}

impl Report {
    pub fn into_results(self) -> Vec<ReportResult> {
        self.report
            .and_then(|r| r.results)
            .map(|r| r.results)
            .unwrap_or_default()
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ReportContent {
    pub results: Option<Results>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Results {
    #[serde(rename = "result", default)]
    pub results: Vec<ReportResult>,
}

/// Host of a result, the address is the text content
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ResultHost {
    #[serde(rename = "$text", default)]
    pub address: String,
    #[serde(default)]
    pub hostname: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Reference {
    #[serde(rename = "@type", default)]
    pub ref_type: String,
    #[serde(rename = "@id", default)]
    pub id: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct References {
    #[serde(rename = "ref", default)]
    pub references: Vec<Reference>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct NvtSeverity {
    #[serde(rename = "@type", default)]
    pub severity_type: String,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Severities {
    #[serde(rename = "severity", default)]
    pub severities: Vec<NvtSeverity>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Nvt {
    #[serde(rename = "@oid", default)]
    pub oid: String,
    #[serde(default)]
    pub name: String,
    /// `key=value` pairs separated by `|`
    #[serde(default)]
    pub tags: String,
    pub severities: Option<Severities>,
    pub refs: Option<References>,
}

impl Nvt {
    /// Returns the value of a tag, e.g. `summary`.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .split('|')
            .filter_map(|t| t.split_once('='))
            .find(|(k, _)| k.trim() == key)
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Returns the first CVE reference.
    pub fn first_cve(&self) -> Option<&str> {
        self.refs
            .iter()
            .flat_map(|r| r.references.iter())
            .find(|r| r.ref_type.eq_ignore_ascii_case("cve") && !r.id.is_empty())
            .map(|r| r.id.as_str())
    }

    /// Returns the severity vector, the newest CVSS version first.
    pub fn severity_vector(&self) -> Option<&str> {
        let vectors = self
            .severities
            .iter()
            .flat_map(|s| s.severities.iter())
            .filter_map(|s| {
                s.value
                    .as_deref()
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(|v| (s.severity_type.as_str(), v))
            })
            .collect::<Vec<_>>();
        vectors
            .iter()
            .find(|(t, _)| *t == "cvss_base_v3")
            .or_else(|| vectors.first())
            .map(|(_, v)| *v)
            .or_else(|| self.tag("cvss_base_vector"))
    }
}

/// Single result of a report
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ReportResult {
    #[serde(rename = "@id")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    pub host: Option<ResultHost>,
    #[serde(default)]
    pub port: String,
    pub nvt: Option<Nvt>,
    #[serde(default)]
    pub threat: String,
    pub severity: Option<StringF32>,
    #[serde(default)]
    pub description: String,
}

impl ReportResult {
    pub fn severity_score(&self) -> f32 {
        self.severity.map(f32::from).unwrap_or_default()
    }

    /// Returns `host:port`, where host is the address or hostname.
    pub fn context(&self) -> String {
        let host = self
            .host
            .as_ref()
            .map(|h| match h.address.trim() {
                "" => h.hostname.trim(),
                address => address,
            })
            .unwrap_or_default();
        match self.port.trim() {
            "" => host.to_string(),
            port => format!("{host}:{port}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_status() {
        let response: Response = quick_xml::de::from_str(
            r#"<authenticate_response status="400" status_text="Authentication failed"/>"#,
        )
        .unwrap();
        assert!(!response.status().is_ok());
        assert_eq!(response.status().text, "Authentication failed");
    }

    #[test]
    fn start_task() {
        let response: Response = quick_xml::de::from_str(
            r#"<start_task_response status="202" status_text="OK, request submitted"><report_id>330ee785-c2c0-4d4c-ab96-725142c9b789</report_id></start_task_response>"#,
        )
        .unwrap();
        assert!(response.status().is_ok());
        match response {
            Response::StartTask { report_id, .. } => assert_eq!(
                report_id,
                Some("330ee785-c2c0-4d4c-ab96-725142c9b789".to_string())
            ),
            _ => panic!("unexpected response {response:?}"),
        }
    }

    #[test]
    fn get_tasks() {
        let response: Response =
            quick_xml::de::from_str(include_str!("../../data/gmp/get_tasks_response.xml"))
                .unwrap();
        match response {
            Response::GetTasks { tasks, .. } => {
                assert_eq!(tasks.len(), 1);
                assert_eq!(tasks[0].status.as_deref(), Some("Done"));
                assert_eq!(tasks[0].progress(), Some(-1));
                assert_eq!(
                    tasks[0].last_report_id().as_deref(),
                    Some("f0fdf522-276d-4893-9274-fb8699dc2270")
                );
            }
            _ => panic!("unexpected response {response:?}"),
        }
    }

    #[test]
    fn get_reports() {
        let response: Response =
            quick_xml::de::from_str(include_str!("../../data/gmp/get_reports_response.xml"))
                .unwrap();
        let results = match response {
            Response::GetReports {
                report: Some(report),
                ..
            } => report.into_results(),
            _ => panic!("unexpected response {response:?}"),
        };
        assert_eq!(results.len(), 3);
        let first = &results[0];
        assert_eq!(first.severity_score(), 5.0);
        assert_eq!(first.context(), "192.0.2.10:80/tcp");
        let nvt = results[1].nvt.as_ref().unwrap();
        assert_eq!(nvt.first_cve(), Some("CVE-2021-41773"));
        assert_eq!(
            nvt.severity_vector(),
            Some("CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H")
        );
        assert_eq!(results[1].severity_score(), 9.8);
        let nvt = results[2].nvt.as_ref().unwrap();
        assert_eq!(nvt.first_cve(), None);
        assert_eq!(nvt.tag("summary"), Some("The remote host answers ICMP timestamp requests."));
    }

    #[test]
    fn openvas_scanner_type() {
        let scanner = Scanner {
            id: "1".to_string(),
            name: "CVE".to_string(),
            scanner_type: "3".to_string(),
        };
        assert!(!scanner.is_openvas());
        let scanner = Scanner {
            scanner_type: "2".to_string(),
            ..scanner
        };
        assert!(scanner.is_openvas());
    }
}
