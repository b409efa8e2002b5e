// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Port and service discovery.
//!
//! Discovery never fails from the point of view of a caller. When the tool
//! cannot be run, does not finish in time or prints something unreadable the
//! result is an empty list of services.
use std::{path::PathBuf, process::Stdio, time::Duration};

use async_trait::async_trait;
use thiserror::Error;

use crate::models::ServiceObservation;

pub mod nmap;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to run {0}: {1}")]
    Spawn(String, std::io::Error),
    #[error("Discovery did not finish within {0:?}")]
    Timeout(Duration),
    #[error("Discovery exited with {code:?}: {stderr}")]
    Exit { code: Option<i32>, stderr: String },
    #[error("Unable to parse discovery output: {0}")]
    Parse(String),
}

/// Finds the services of a target
#[async_trait]
pub trait ServiceDiscovery: Send + Sync {
    async fn discover(&self, target: &str) -> Vec<ServiceObservation>;
}

/// Parses nmap XML output.
pub fn parse(xml: &str) -> Result<Vec<ServiceObservation>, Error> {
    let run: nmap::NmapRun =
        quick_xml::de::from_str(xml).map_err(|e| Error::Parse(e.to_string()))?;
    Ok(run.observations())
}

/// Service discovery via `nmap -sV`
#[derive(Debug, Clone)]
pub struct Nmap {
    binary: PathBuf,
    timeout: Duration,
}

impl Nmap {
    pub fn new(binary: PathBuf, timeout: Duration) -> Self {
        Self { binary, timeout }
    }

    pub fn from_config(config: &crate::config::Discovery) -> Self {
        Self::new(config.binary.clone(), config.timeout)
    }

    /// Arguments nmap is called with
    pub fn arguments<'a>(&self, target: &'a str) -> [&'a str; 7] {
        [
            "-sV",
            "-T4",
            "--version-intensity",
            "5",
            "-oX",
            "-",
            target,
        ]
    }

    /// Runs nmap and returns the services or why none could be found.
    pub async fn try_discover(&self, target: &str) -> Result<Vec<ServiceObservation>, Error> {
        let binary = self.binary.display().to_string();
        let child = tokio::process::Command::new(&self.binary)
            .args(self.arguments(target))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Spawn(binary.clone(), e))?;
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::Timeout(self.timeout))?
            .map_err(|e| Error::Spawn(binary, e))?;
        if !output.status.success() {
            return Err(Error::Exit {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        parse(&String::from_utf8_lossy(&output.stdout))
    }
}

#[async_trait]
impl ServiceDiscovery for Nmap {
    async fn discover(&self, target: &str) -> Vec<ServiceObservation> {
        match self.try_discover(target).await {
            Ok(services) => {
                tracing::debug!(host = target, services = services.len(), "discovered services");
                services
            }
            Err(error) => {
                tracing::warn!(
                    host = target,
                    %error,
                    "Discovery degraded, continuing without services"
                );
                vec![]
            }
        }
    }
}

/// Is a discovery implementation primarily for testing purposes.
pub struct Lambda {
    discover: Box<dyn Fn(&str) -> Vec<ServiceObservation> + Sync + Send + 'static>,
}

impl Lambda {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str) -> Vec<ServiceObservation> + Sync + Send + 'static,
    {
        Self {
            discover: Box::new(f),
        }
    }

    /// Always returns the given services.
    pub fn fixed(services: Vec<ServiceObservation>) -> Self {
        Self::new(move |_| services.clone())
    }
}

#[async_trait]
impl ServiceDiscovery for Lambda {
    async fn discover(&self, target: &str) -> Vec<ServiceObservation> {
        (self.discover)(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Protocol;

    #[test]
    fn parses_open_services() {
        let services = parse(include_str!("../../data/nmap/apache.xml")).unwrap();
        assert_eq!(services.len(), 3);
        assert_eq!(services[0].port, 22);
        assert_eq!(services[0].product, "OpenSSH");
        assert_eq!(services[1].port, 80);
        assert_eq!(services[1].protocol, Protocol::TCP);
        assert_eq!(services[1].product, "Apache httpd");
        assert_eq!(services[1].version, "2.4.49");
        assert_eq!(
            services[1].platform_identifiers,
            vec!["cpe:/a:apache:http_server:2.4.49".to_string()]
        );
        // open but unidentified
        assert!(!services[2].is_identified());
    }

    #[test]
    fn no_hosts() {
        let services = parse(include_str!("../../data/nmap/empty.xml")).unwrap();
        assert!(services.is_empty());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(parse("Starting Nmap"), Err(Error::Parse(_))));
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn missing_binary_degrades_to_empty() {
        let nmap = Nmap::new(
            PathBuf::from("/nonexistent/scanrelay-nmap"),
            Duration::from_secs(1),
        );
        assert!(nmap.discover("empty.test").await.is_empty());
        assert!(logs_contain("Discovery degraded"));
    }

    fn slow_nmap(dir: &std::path::Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("nmap");
        std::fs::write(&path, "#!/bin/sh\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn slow_binary_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let nmap = Nmap::new(slow_nmap(dir.path()), Duration::from_millis(300));
        let started = std::time::Instant::now();
        assert!(nmap.discover("slow.test").await.is_empty());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(logs_contain("Discovery degraded"));
    }

    #[tokio::test]
    async fn slow_binary_is_a_timeout_error() {
        let dir = tempfile::tempdir().unwrap();
        let nmap = Nmap::new(slow_nmap(dir.path()), Duration::from_millis(300));
        assert!(matches!(
            nmap.try_discover("slow.test").await,
            Err(Error::Timeout(timeout)) if timeout == Duration::from_millis(300)
        ));
    }

    #[tokio::test]
    async fn failing_binary_is_an_exit_error() {
        let nmap = Nmap::new(PathBuf::from("false"), Duration::from_secs(5));
        assert!(matches!(
            nmap.try_discover("empty.test").await,
            Err(Error::Exit { .. })
        ));
    }
}
