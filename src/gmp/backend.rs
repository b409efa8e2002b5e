// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use async_trait::async_trait;

use super::{Error, PortScope, RawReport, TaskDefinition, TaskStatus};

/// Operations of a scan backend that are needed to run a task to completion.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Returns the ID of the scanner that should run tasks.
    async fn find_scanner(&self, name: &str) -> Result<String, Error>;

    /// Returns the ID of the target with the given name, creating it when it
    /// does not exist yet.
    async fn create_target(&self, name: &str, hosts: &str, ports: &PortScope)
    -> Result<String, Error>;

    /// Creates a task and returns its ID.
    async fn create_task(&self, task: &TaskDefinition) -> Result<String, Error>;

    /// Starts a task and returns the report ID when the backend already knows it.
    async fn start_task(&self, task_id: &str) -> Result<Option<String>, Error>;

    async fn get_task_status(&self, task_id: &str) -> Result<TaskStatus, Error>;

    /// Fetches a report with at most `max_rows` results, -1 for all.
    async fn get_report(&self, report_id: &str, max_rows: i64) -> Result<RawReport, Error>;
}

/// Is a backend implementation primarily for testing purposes.
///
/// It is holding call back functions so that it is easier to implement a backend for testing
/// without having to copy and paste the async trait.
#[allow(clippy::complexity)]
pub struct Lambda {
    find_scanner: Box<dyn Fn(&str) -> Result<String, Error> + Sync + Send + 'static>,
    create_target:
        Box<dyn Fn(&str, &str, &PortScope) -> Result<String, Error> + Sync + Send + 'static>,
    create_task: Box<dyn Fn(&TaskDefinition) -> Result<String, Error> + Sync + Send + 'static>,
    start_task: Box<dyn Fn(&str) -> Result<Option<String>, Error> + Sync + Send + 'static>,
    get_task_status: Box<dyn Fn(&str) -> Result<TaskStatus, Error> + Sync + Send + 'static>,
    get_report: Box<dyn Fn(&str, i64) -> Result<RawReport, Error> + Sync + Send + 'static>,
}

impl Default for Lambda {
    fn default() -> Self {
        Self {
            find_scanner: Box::new(|_| Ok("scanner-id".to_string())),
            create_target: Box::new(|_, _, _| Ok("target-id".to_string())),
            create_task: Box::new(|_| Ok("task-id".to_string())),
            start_task: Box::new(|_| Ok(None)),
            get_task_status: Box::new(|_| {
                Ok(TaskStatus {
                    status: "Done".to_string(),
                    progress: Some(-1),
                    report_id: Some("report-id".to_string()),
                })
            }),
            get_report: Box::new(|_, _| Ok(RawReport::default())),
        }
    }
}

/// Builds a Lambda backend implementation.
#[derive(Default)]
pub struct LambdaBuilder {
    lambda: Lambda,
}

impl LambdaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_find_scanner<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<String, Error> + Sync + Send + 'static,
    {
        self.lambda.find_scanner = Box::new(f);
        self
    }

    pub fn with_create_target<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &str, &PortScope) -> Result<String, Error> + Sync + Send + 'static,
    {
        self.lambda.create_target = Box::new(f);
        self
    }

    pub fn with_create_task<F>(mut self, f: F) -> Self
    where
        F: Fn(&TaskDefinition) -> Result<String, Error> + Sync + Send + 'static,
    {
        self.lambda.create_task = Box::new(f);
        self
    }

    pub fn with_start_task<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<Option<String>, Error> + Sync + Send + 'static,
    {
        self.lambda.start_task = Box::new(f);
        self
    }

    pub fn with_get_task_status<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<TaskStatus, Error> + Sync + Send + 'static,
    {
        self.lambda.get_task_status = Box::new(f);
        self
    }

    pub fn with_get_report<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, i64) -> Result<RawReport, Error> + Sync + Send + 'static,
    {
        self.lambda.get_report = Box::new(f);
        self
    }

    pub fn build(self) -> Lambda {
        self.lambda
    }
}

#[async_trait]
impl Backend for Lambda {
    async fn find_scanner(&self, name: &str) -> Result<String, Error> {
        (self.find_scanner)(name)
    }

    async fn create_target(
        &self,
        name: &str,
        hosts: &str,
        ports: &PortScope,
    ) -> Result<String, Error> {
        (self.create_target)(name, hosts, ports)
    }

    async fn create_task(&self, task: &TaskDefinition) -> Result<String, Error> {
        (self.create_task)(task)
    }

    async fn start_task(&self, task_id: &str) -> Result<Option<String>, Error> {
        (self.start_task)(task_id)
    }

    async fn get_task_status(&self, task_id: &str) -> Result<TaskStatus, Error> {
        (self.get_task_status)(task_id)
    }

    async fn get_report(&self, report_id: &str, max_rows: i64) -> Result<RawReport, Error> {
        (self.get_report)(report_id, max_rows)
    }
}
