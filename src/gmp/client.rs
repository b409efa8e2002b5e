// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Backend implementation on top of the gvmd unix socket.
use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;

use super::{
    Backend, Command, Connection, Credentials, Error, PortScope, RawReport, TaskDefinition,
    TaskStatus, response::Response,
};

/// GMP client, every operation uses its own connection
#[derive(Debug, Clone)]
pub struct Client {
    /// Path to the socket
    socket: PathBuf,
    credentials: Credentials,
    /// Read timeout of the socket
    r_timeout: Option<Duration>,
    alive_test: String,
}

fn unexpected(command: &str, response: &Response) -> Error {
    Error::Protocol(format!("{} as answer to {command}", response.name()))
}

impl Client {
    pub fn new(socket: PathBuf, credentials: Credentials, r_timeout: Option<Duration>) -> Self {
        Self {
            socket,
            credentials,
            r_timeout,
            alive_test: "Consider Alive".to_string(),
        }
    }

    /// Creates a client from the gmp section, reads block at most `r_timeout`.
    pub fn from_config(config: &crate::config::Gmp, r_timeout: Duration) -> Self {
        Self::new(
            config.socket.clone(),
            Credentials {
                username: config.username.clone(),
                password: config.password.clone(),
            },
            Some(r_timeout),
        )
        .with_alive_test(&config.alive_test)
    }

    pub fn with_alive_test(mut self, alive_test: &str) -> Self {
        self.alive_test = alive_test.to_string();
        self
    }

    fn check_socket(&self) -> Result<PathBuf, Error> {
        if !self.socket.exists() {
            return Err(Error::Unavailable(format!(
                "GMP socket {} does not exist.",
                self.socket.display()
            )));
        }
        Ok(self.socket.clone())
    }

    /// Runs `f` on a fresh authenticated connection in a blocking thread.
    async fn spawn_blocking<F, R>(&self, f: F) -> Result<R, Error>
    where
        F: FnOnce(&mut Connection) -> Result<R, Error> + Send + 'static,
        R: Send + 'static,
    {
        let socket = self.check_socket()?;
        let credentials = self.credentials.clone();
        let r_timeout = self.r_timeout;
        tokio::task::spawn_blocking(move || {
            let mut connection = Connection::open(socket, r_timeout, &credentials)?;
            f(&mut connection)
        })
        .await
        .map_err(|e| Error::Unavailable(format!("GMP worker failed: {e}")))?
    }
}

#[async_trait]
impl Backend for Client {
    async fn find_scanner(&self, name: &str) -> Result<String, Error> {
        let preferred = name.to_lowercase();
        self.spawn_blocking(move |connection| {
            let cmd = Command::GetScanners;
            let scanners = match connection.send(&cmd)?.response {
                Response::GetScanners { scanners, .. } => scanners,
                response => return Err(unexpected(cmd.name(), &response)),
            };
            scanners
                .iter()
                .find(|s| !preferred.is_empty() && s.name.to_lowercase().contains(&preferred))
                .or_else(|| scanners.iter().find(|s| s.is_openvas()))
                .map(|s| s.id.clone())
                .ok_or_else(|| Error::Protocol("no OpenVAS scanner available".to_string()))
        })
        .await
    }

    async fn create_target(
        &self,
        name: &str,
        hosts: &str,
        ports: &PortScope,
    ) -> Result<String, Error> {
        let name = name.to_string();
        let hosts = hosts.to_string();
        let port_range = ports.port_range();
        let alive_test = self.alive_test.clone();
        self.spawn_blocking(move |connection| {
            let cmd = Command::GetTargets { name: &name };
            match connection.send(&cmd)?.response {
                Response::GetTargets { targets, .. } => {
                    if let Some(existing) = targets.into_iter().find(|t| t.name == name) {
                        tracing::debug!(target_id = %existing.id, %name, "reusing target");
                        return Ok(existing.id);
                    }
                }
                response => return Err(unexpected(cmd.name(), &response)),
            }
            let cmd = Command::CreateTarget {
                name: &name,
                hosts: &hosts,
                port_range: port_range.as_deref(),
                alive_test: &alive_test,
            };
            match connection.send(&cmd)?.response {
                Response::CreateTarget { id: Some(id), .. } if !id.is_empty() => {
                    tracing::debug!(target_id = %id, %name, "created target");
                    Ok(id)
                }
                response => Err(unexpected(cmd.name(), &response)),
            }
        })
        .await
    }

    async fn create_task(&self, task: &TaskDefinition) -> Result<String, Error> {
        let task = task.clone();
        self.spawn_blocking(move |connection| {
            let cmd = Command::CreateTask(&task);
            match connection.send(&cmd)?.response {
                Response::CreateTask { id: Some(id), .. } if !id.is_empty() => {
                    tracing::debug!(task_id = %id, name = %task.name, "created task");
                    Ok(id)
                }
                response => Err(unexpected(cmd.name(), &response)),
            }
        })
        .await
    }

    async fn start_task(&self, task_id: &str) -> Result<Option<String>, Error> {
        let task_id = task_id.to_string();
        self.spawn_blocking(move |connection| {
            let cmd = Command::StartTask { task_id: &task_id };
            match connection.send(&cmd)?.response {
                Response::StartTask { report_id, .. } => {
                    Ok(report_id.map(|r| r.trim().to_string()).filter(|r| !r.is_empty()))
                }
                response => Err(unexpected(cmd.name(), &response)),
            }
        })
        .await
    }

    async fn get_task_status(&self, task_id: &str) -> Result<TaskStatus, Error> {
        let task_id = task_id.to_string();
        self.spawn_blocking(move |connection| {
            let cmd = Command::GetTasks { task_id: &task_id };
            let task = match connection.send(&cmd)?.response {
                Response::GetTasks { tasks, .. } => tasks
                    .into_iter()
                    .find(|t| t.id == task_id)
                    .ok_or_else(|| Error::Protocol(format!("task {task_id} missing")))?,
                response => return Err(unexpected(cmd.name(), &response)),
            };
            let status = task
                .status
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| Error::Protocol(format!("task {task_id} without status")))?
                .to_string();
            Ok(TaskStatus {
                status,
                progress: task.progress(),
                report_id: task.last_report_id(),
            })
        })
        .await
    }

    async fn get_report(&self, report_id: &str, max_rows: i64) -> Result<RawReport, Error> {
        let report_id = report_id.to_string();
        self.spawn_blocking(move |connection| {
            let cmd = Command::GetReports {
                report_id: &report_id,
                rows: max_rows,
            };
            let reply = connection.send(&cmd)?;
            match reply.response {
                Response::GetReports {
                    report: Some(report),
                    ..
                } => Ok(RawReport {
                    xml: reply.raw,
                    results: report.into_results(),
                }),
                response => Err(unexpected(cmd.name(), &response)),
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::{BufReader, Write},
        os::unix::net::UnixListener,
        path::Path,
        thread,
    };

    use super::*;
    use crate::gmp::read_element;

    /// Answers each received command with the next canned response.
    fn fake_gvmd(socket: &Path, responses: Vec<&'static str>) -> thread::JoinHandle<Vec<String>> {
        let listener = UnixListener::bind(socket).unwrap();
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut writer = stream.try_clone().unwrap();
            let mut reader = quick_xml::Reader::from_reader(BufReader::new(stream));
            let mut received = Vec::new();
            for response in responses {
                received.push(read_element(&mut reader).unwrap());
                writer.write_all(response.as_bytes()).unwrap();
            }
            received
        })
    }

    const AUTH_OK: &str = r#"<authenticate_response status="200" status_text="OK"><role>Admin</role></authenticate_response>"#;

    fn client(socket: &Path) -> Client {
        Client::new(
            socket.to_path_buf(),
            Credentials {
                username: "admin".to_string(),
                password: "admin".to_string(),
            },
            Some(Duration::from_secs(5)),
        )
    }

    #[tokio::test]
    async fn reuses_existing_target() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("gvmd.sock");
        let server = fake_gvmd(
            &socket,
            vec![
                AUTH_OK,
                r#"<get_targets_response status="200" status_text="OK"><target id="t-1"><name>target-scan-1</name></target></get_targets_response>"#,
            ],
        );
        let id = client(&socket)
            .create_target("target-scan-1", "192.0.2.1", &PortScope::tcp([80]))
            .await
            .unwrap();
        assert_eq!(id, "t-1");
        let received = server.join().unwrap();
        assert!(received[0].starts_with("<authenticate>"));
        assert!(received[1].starts_with("<get_targets"));
    }

    #[tokio::test]
    async fn creates_missing_target() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("gvmd.sock");
        let server = fake_gvmd(
            &socket,
            vec![
                AUTH_OK,
                r#"<get_targets_response status="200" status_text="OK"><target id="t-0"><name>target-scan-10</name></target></get_targets_response>"#,
                r#"<create_target_response status="201" status_text="OK, resource created" id="t-2"/>"#,
            ],
        );
        let id = client(&socket)
            .create_target("target-scan-1", "192.0.2.1", &PortScope::tcp([443, 80]))
            .await
            .unwrap();
        assert_eq!(id, "t-2");
        let received = server.join().unwrap();
        assert!(received[2].contains("<port_range>T:80,T:443</port_range>"));
    }

    #[tokio::test]
    async fn failed_authentication_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("gvmd.sock");
        let server = fake_gvmd(
            &socket,
            vec![r#"<authenticate_response status="400" status_text="Authentication failed"/>"#],
        );
        let err = client(&socket).start_task("task-1").await.unwrap_err();
        assert_eq!(
            err,
            Error::Rejected {
                command: "authenticate".to_string(),
                status: 400,
                text: "Authentication failed".to_string()
            }
        );
        server.join().unwrap();
    }

    #[tokio::test]
    async fn task_status_without_status_is_protocol_error() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("gvmd.sock");
        let server = fake_gvmd(
            &socket,
            vec![
                AUTH_OK,
                r#"<get_tasks_response status="200" status_text="OK"><task id="task-1"><name>Scan</name></task></get_tasks_response>"#,
            ],
        );
        let err = client(&socket).get_task_status("task-1").await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        server.join().unwrap();
    }

    #[tokio::test]
    async fn missing_socket_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = client(&dir.path().join("nope.sock"))
            .get_task_status("task-1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));
    }

    #[tokio::test]
    async fn report_keeps_raw_xml() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("gvmd.sock");
        let report = include_str!("../../data/gmp/get_reports_response.xml").trim();
        let server = fake_gvmd(&socket, vec![AUTH_OK, report]);
        let raw = client(&socket).get_report("r-1", 500).await.unwrap();
        assert_eq!(raw.results.len(), 3);
        assert!(raw.xml.starts_with("<get_reports_response"));
        let received = server.join().unwrap();
        assert!(received[1].contains(r#"filter="rows=500""#));
    }
}
