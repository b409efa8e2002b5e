// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Drives a single task on the scan backend from provisioning to a terminal
//! state.
//!
//! The orchestrator does not retry. A backend error ends the run immediately
//! and the task is left to the backend.
use std::{fmt::Display, time::Duration};

use thiserror::Error;
use tokio::time::Instant;

use crate::{
    config::{Config, duration::format_duration},
    gmp::{self, Backend, PortScope, RawReport, TaskDefinition},
    models::{ScanRequest, ScanTask},
};

/// State of a task as seen by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Provisioning,
    Starting,
    Running,
    Done,
    Stopped,
    Interrupted,
    Failed,
    TimedOut,
}

impl TaskState {
    /// Maps a terminal backend status, any other status is still running.
    pub fn from_terminal_status(status: &str) -> Option<Self> {
        match status {
            "Done" => Some(TaskState::Done),
            "Stopped" => Some(TaskState::Stopped),
            "Interrupted" => Some(TaskState::Interrupted),
            "Failed" => Some(TaskState::Failed),
            _ => None,
        }
    }
}

impl Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TaskState::Provisioning => "Provisioning",
            TaskState::Starting => "Starting",
            TaskState::Running => "Running",
            TaskState::Done => "Done",
            TaskState::Stopped => "Stopped",
            TaskState::Interrupted => "Interrupted",
            TaskState::Failed => "Failed",
            TaskState::TimedOut => "TimedOut",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Backend(#[from] gmp::Error),
    #[error("Scan task ended with status {0}")]
    Ended(TaskState),
    #[error(
        "Scan timed out: task did not finish within {} (last status {last_status})",
        format_duration(.ceiling)
    )]
    TimedOut {
        ceiling: Duration,
        last_status: String,
    },
}

/// Settings of the orchestrator taken from [`Config`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Sleep between two polls
    pub interval: Duration,
    /// Maximum time from starting the task until it must be terminal
    pub ceiling: Duration,
    pub config_id: String,
    pub scanner_id: Option<String>,
    pub scanner_name: String,
    pub max_results: i64,
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            interval: config.polling.interval,
            ceiling: config.polling.timeout,
            config_id: config.gmp.config_id.clone(),
            scanner_id: config.gmp.scanner_id.clone(),
            scanner_name: config.gmp.scanner_name.clone(),
            max_results: config.gmp.max_results,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        (&Config::default()).into()
    }
}

/// Result of a task that reached `Done`
#[derive(Debug, Clone)]
pub struct Completed {
    pub task: ScanTask,
    pub report: RawReport,
}

pub struct Orchestrator<'a> {
    backend: &'a dyn Backend,
    settings: &'a Settings,
    scan_id: &'a str,
    state: TaskState,
}

impl<'a> Orchestrator<'a> {
    pub fn new(backend: &'a dyn Backend, settings: &'a Settings, scan_id: &'a str) -> Self {
        Self {
            backend,
            settings,
            scan_id,
            state: TaskState::Provisioning,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    fn transition(&mut self, to: TaskState) {
        tracing::debug!(scan_id = self.scan_id, from = %self.state, to = %to, "task state");
        self.state = to;
    }

    /// Creates target and task on the backend.
    pub async fn provision(
        &mut self,
        request: &ScanRequest,
        ports: &PortScope,
    ) -> Result<ScanTask, Error> {
        let scanner_id = match &self.settings.scanner_id {
            Some(id) => id.clone(),
            None => self.backend.find_scanner(&self.settings.scanner_name).await?,
        };
        let target_id = self
            .backend
            .create_target(&format!("target-{}", request.scan_id), &request.target, ports)
            .await?;
        let task_id = self
            .backend
            .create_task(&TaskDefinition {
                name: format!("Scan {}", request.scan_id),
                comment: format!("user:{}", request.user_id),
                config_id: self.settings.config_id.clone(),
                target_id: target_id.clone(),
                scanner_id,
            })
            .await?;
        tracing::info!(scan_id = self.scan_id, %target_id, %task_id, "provisioned task");
        self.transition(TaskState::Starting);
        Ok(ScanTask {
            target_id,
            task_id,
            report_id: None,
        })
    }

    /// Starts the task and polls it until it is `Done`.
    ///
    /// The ceiling is checked before each poll, a status that arrives after the
    /// ceiling has been exceeded is never requested.
    pub async fn start_and_wait(&mut self, task: &mut ScanTask) -> Result<(), Error> {
        let started = Instant::now();
        task.report_id = self.backend.start_task(&task.task_id).await?;
        self.transition(TaskState::Running);
        let mut last_status = TaskState::Running.to_string();
        let mut polls = 0usize;
        loop {
            if started.elapsed() > self.settings.ceiling {
                self.transition(TaskState::TimedOut);
                tracing::warn!(
                    scan_id = self.scan_id,
                    task_id = %task.task_id,
                    polls,
                    %last_status,
                    "task did not finish in time"
                );
                return Err(Error::TimedOut {
                    ceiling: self.settings.ceiling,
                    last_status,
                });
            }
            let status = self.backend.get_task_status(&task.task_id).await?;
            polls += 1;
            match TaskState::from_terminal_status(&status.status) {
                Some(TaskState::Done) => {
                    self.transition(TaskState::Done);
                    if task.report_id.is_none() {
                        task.report_id = status.report_id;
                    }
                    return Ok(());
                }
                Some(state) => {
                    self.transition(state);
                    return Err(Error::Ended(state));
                }
                None => {
                    tracing::trace!(
                        scan_id = self.scan_id,
                        status = %status.status,
                        progress = ?status.progress,
                        "task still running"
                    );
                    last_status = status.status;
                    tokio::time::sleep(self.settings.interval).await;
                }
            }
        }
    }

    /// Provisions, runs and fetches the report of a task.
    pub async fn run(
        mut self,
        request: &ScanRequest,
        ports: &PortScope,
    ) -> Result<Completed, Error> {
        let mut task = self.provision(request, ports).await?;
        self.start_and_wait(&mut task).await?;
        let report_id = task.report_id.clone().ok_or_else(|| {
            gmp::Error::Protocol(format!("no report for finished task {}", task.task_id))
        })?;
        let report = self
            .backend
            .get_report(&report_id, self.settings.max_results)
            .await?;
        tracing::debug!(
            scan_id = self.scan_id,
            %report_id,
            results = report.results.len(),
            "fetched report"
        );
        let max_results = self.settings.max_results;
        if max_results > 0 && report.results.len() as i64 >= max_results {
            tracing::warn!(
                scan_id = self.scan_id,
                %report_id,
                max_results,
                "Report reached the result limit, findings may be missing"
            );
        }
        Ok(Completed { task, report })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::gmp::{LambdaBuilder, TaskStatus, response::ReportResult};

    fn request() -> ScanRequest {
        ScanRequest {
            scan_id: "scan-1".to_string(),
            user_id: "user-1".to_string(),
            target: "192.0.2.1".to_string(),
            callback_url: None,
        }
    }

    fn status(status: &str) -> TaskStatus {
        TaskStatus {
            status: status.to_string(),
            progress: None,
            report_id: Some("last-report".to_string()),
        }
    }

    fn sequence(
        statuses: &[&str],
    ) -> impl Fn(&str) -> Result<TaskStatus, gmp::Error> + Send + Sync {
        let statuses = Arc::new(Mutex::new(
            statuses.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        ));
        move |_: &str| {
            let mut statuses = statuses.lock().unwrap();
            let next = if statuses.len() > 1 {
                statuses.remove(0)
            } else {
                statuses[0].clone()
            };
            Ok(status(&next))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn done_after_running() {
        let backend = LambdaBuilder::new()
            .with_start_task(|_| Ok(None))
            .with_get_task_status(sequence(&["Requested", "Running", "Done"]))
            .build();
        let settings = Settings::default();
        let completed = Orchestrator::new(&backend, &settings, "scan-1")
            .run(&request(), &PortScope::default())
            .await
            .unwrap();
        assert_eq!(completed.task.report_id.as_deref(), Some("last-report"));
    }

    #[tokio::test(start_paused = true)]
    async fn start_report_id_wins() {
        let backend = LambdaBuilder::new()
            .with_start_task(|_| Ok(Some("started-report".to_string())))
            .with_get_report(|id, rows| {
                assert_eq!(id, "started-report");
                assert_eq!(rows, -1);
                Ok(RawReport::default())
            })
            .build();
        let settings = Settings::default();
        let completed = Orchestrator::new(&backend, &settings, "scan-1")
            .run(&request(), &PortScope::default())
            .await
            .unwrap();
        assert_eq!(completed.task.report_id.as_deref(), Some("started-report"));
    }

    #[test]
    fn terminal_statuses() {
        let cases = [
            ("Done", Some(TaskState::Done)),
            ("Stopped", Some(TaskState::Stopped)),
            ("Interrupted", Some(TaskState::Interrupted)),
            ("Failed", Some(TaskState::Failed)),
            ("Stop Requested", None),
            ("Requested", None),
            ("Queued", None),
            ("Running", None),
            ("done", None),
        ];
        for (status, expected) in cases {
            assert_eq!(TaskState::from_terminal_status(status), expected, "{status}");
        }
    }

    #[tokio::test(start_paused = true)]
    #[tracing_test::traced_test]
    async fn warns_on_result_limit() {
        let backend = LambdaBuilder::new()
            .with_get_task_status(sequence(&["Done"]))
            .with_get_report(|_, rows| {
                assert_eq!(rows, 1);
                let result = ReportResult {
                    id: Some("result-1".to_string()),
                    name: "Apache httpd".to_string(),
                    host: None,
                    port: "80/tcp".to_string(),
                    nvt: None,
                    threat: "High".to_string(),
                    severity: None,
                    description: String::new(),
                };
                Ok(RawReport {
                    xml: String::new(),
                    results: vec![result],
                })
            })
            .build();
        let settings = Settings {
            max_results: 1,
            ..Default::default()
        };
        let completed = Orchestrator::new(&backend, &settings, "scan-1")
            .run(&request(), &PortScope::default())
            .await
            .unwrap();
        assert_eq!(completed.report.results.len(), 1);
        assert!(logs_contain("Report reached the result limit"));
    }

    #[tokio::test(start_paused = true)]
    #[tracing_test::traced_test]
    async fn unlimited_report_does_not_warn() {
        let backend = LambdaBuilder::new()
            .with_get_task_status(sequence(&["Done"]))
            .build();
        let settings = Settings::default();
        Orchestrator::new(&backend, &settings, "scan-1")
            .run(&request(), &PortScope::default())
            .await
            .unwrap();
        assert!(!logs_contain("Report reached the result limit"));
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_is_terminal() {
        let backend = LambdaBuilder::new()
            .with_get_task_status(sequence(&["Running", "Stopped"]))
            .build();
        let settings = Settings::default();
        let err = Orchestrator::new(&backend, &settings, "scan-1")
            .run(&request(), &PortScope::default())
            .await
            .unwrap_err();
        assert_eq!(err, Error::Ended(TaskState::Stopped));
        assert!(err.to_string().contains("Stopped"));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_while_running() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = polls.clone();
        let backend = LambdaBuilder::new()
            .with_get_task_status(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(status("Running"))
            })
            .build();
        let settings = Settings {
            interval: Duration::from_secs(10),
            ceiling: Duration::from_secs(60),
            ..Default::default()
        };
        let mut orchestrator = Orchestrator::new(&backend, &settings, "scan-1");
        let mut task = orchestrator
            .provision(&request(), &PortScope::default())
            .await
            .unwrap();
        let err = orchestrator.start_and_wait(&mut task).await.unwrap_err();
        assert_eq!(orchestrator.state(), TaskState::TimedOut);
        assert_eq!(
            err,
            Error::TimedOut {
                ceiling: Duration::from_secs(60),
                last_status: "Running".to_string()
            }
        );
        assert!(err.to_string().starts_with("Scan timed out"));
        // polls at 0s, 10s, ..., 60s
        assert_eq!(polls.load(Ordering::SeqCst), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_backend_is_fatal() {
        let backend = LambdaBuilder::new()
            .with_get_task_status(|_| Err(gmp::Error::Unavailable("gone".to_string())))
            .build();
        let settings = Settings::default();
        let err = Orchestrator::new(&backend, &settings, "scan-1")
            .run(&request(), &PortScope::default())
            .await
            .unwrap_err();
        assert_eq!(err, Error::Backend(gmp::Error::Unavailable("gone".to_string())));
    }

    #[tokio::test]
    async fn provisioning_names() {
        let backend = LambdaBuilder::new()
            .with_find_scanner(|name| {
                assert_eq!(name, "OpenVAS Default");
                Ok("scanner-1".to_string())
            })
            .with_create_target(|name, hosts, ports| {
                assert_eq!(name, "target-scan-1");
                assert_eq!(hosts, "192.0.2.1");
                assert_eq!(ports.to_string(), "T:80,T:443");
                Ok("target-1".to_string())
            })
            .with_create_task(|task| {
                assert_eq!(task.name, "Scan scan-1");
                assert_eq!(task.comment, "user:user-1");
                assert_eq!(task.target_id, "target-1");
                assert_eq!(task.scanner_id, "scanner-1");
                assert_eq!(task.config_id, "daba56c8-73ec-11df-a475-002264764cea");
                Ok("task-1".to_string())
            })
            .build();
        let settings = Settings::default();
        let mut orchestrator = Orchestrator::new(&backend, &settings, "scan-1");
        let task = orchestrator
            .provision(&request(), &PortScope::tcp([80, 443]))
            .await
            .unwrap();
        assert_eq!(task.task_id, "task-1");
        assert_eq!(orchestrator.state(), TaskState::Starting);
    }
}
