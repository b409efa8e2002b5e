// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Dispatches a scan request to one of the scan strategies.
//!
//! Both strategies produce a [`CanonicalReport`] which is then handed over to
//! the delivery pipeline. When a strategy fails, exactly one failure
//! notification is attempted and nothing is persisted.
use std::{fmt::Display, str::FromStr, sync::Arc};

use chrono::Utc;
use serde::Serialize;

use crate::{
    config::{self, Config},
    delivery::{Delivered, Notified, Pipeline},
    discovery::{self, Nmap, ServiceDiscovery},
    gmp::{self, Backend, Client, PortScope},
    lookup::{Dataset, VulnerabilityLookup},
    models::{CanonicalReport, ScanRequest},
    normalizer,
    notification::{self, Notifier, ScannerType, Webhook},
    orchestrator::{Orchestrator, Settings},
    storage::{self, FileStorage, ObjectStorage},
};

mod error;

pub use error::{ScanError, SetupError};

/// The way a report is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanStrategy {
    /// Service discovery correlated with a vulnerability dataset
    #[default]
    Lightweight,
    /// Full vulnerability scan run by the scan backend
    Heavyweight,
}

impl ScanStrategy {
    pub fn scanner_type(&self) -> ScannerType {
        match self {
            ScanStrategy::Lightweight => ScannerType::Hybrid,
            ScanStrategy::Heavyweight => ScannerType::Openvas,
        }
    }
}

impl FromStr for ScanStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lightweight" | "hybrid" => Ok(ScanStrategy::Lightweight),
            "heavyweight" | "openvas" => Ok(ScanStrategy::Heavyweight),
            _ => Err(format!("unknown scan strategy {s}")),
        }
    }
}

impl Display for ScanStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanStrategy::Lightweight => write!(f, "lightweight"),
            ScanStrategy::Heavyweight => write!(f, "heavyweight"),
        }
    }
}

/// A produced report with the raw backend report it was derived from
#[derive(Debug, Clone)]
pub struct Produced {
    pub report: CanonicalReport,
    pub raw_report: Option<String>,
}

/// Result of a scan that produced a report
#[derive(Debug, Clone)]
pub struct Outcome {
    pub report: CanonicalReport,
    pub delivered: Delivered,
}

/// Synchronous answer to the caller of a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalResponse {
    pub success: bool,
    pub scan_id: String,
    pub status: String,
    pub services_found: usize,
    pub findings_found: usize,
    pub storage_url: Option<String>,
}

impl From<&Outcome> for FinalResponse {
    fn from(outcome: &Outcome) -> Self {
        let summary = outcome.report.summary();
        Self {
            success: true,
            scan_id: outcome.report.scan_id().to_string(),
            status: "completed".to_string(),
            services_found: summary.total_services,
            findings_found: summary.total_findings,
            storage_url: outcome.delivered.report.url.clone(),
        }
    }
}

/// Runs scan requests with a fixed set of collaborators.
///
/// A runner does not hold any per scan state, it can be shared between
/// concurrent scans.
pub struct Runner {
    discovery: Arc<dyn ServiceDiscovery>,
    lookup: Arc<dyn VulnerabilityLookup>,
    backend: Arc<dyn Backend>,
    storage: Arc<dyn ObjectStorage>,
    notifier: Arc<dyn Notifier>,
    settings: Settings,
    storage_config: config::Storage,
    fallback_ports: Vec<u16>,
}

impl Runner {
    /// Creates a runner that uses nmap, the configured dataset, gvmd, the file
    /// storage and webhooks.
    pub fn from_config(config: &Config) -> Result<Self, SetupError> {
        let dataset = Dataset::from_config(&config.lookup)?;
        tracing::info!(products = dataset.len(), "loaded vulnerability dataset");
        let notifier = Webhook::from_config(&config.notification)?;
        Ok(RunnerBuilder::new(config)
            .discovery(Nmap::from_config(&config.discovery))
            .lookup(dataset)
            .backend(Client::from_config(&config.gmp, config.polling.timeout))
            .storage(Arc::new(FileStorage::from_config(&config.storage)))
            .notifier(Arc::new(notifier))
            .build())
    }

    fn pipeline(&self) -> Pipeline<'_> {
        Pipeline::new(
            self.storage.as_ref(),
            self.notifier.as_ref(),
            &self.storage_config,
        )
    }

    async fn produce_lightweight(&self, request: &ScanRequest) -> Produced {
        let services = self.discovery.discover(&request.target).await;
        tracing::debug!(
            scan_id = %request.scan_id,
            services = services.len(),
            "discovered services"
        );
        let report =
            normalizer::lightweight_report(request, services, self.lookup.as_ref(), Utc::now());
        Produced {
            report,
            raw_report: None,
        }
    }

    async fn produce_heavyweight(&self, request: &ScanRequest) -> Result<Produced, ScanError> {
        let services = self.discovery.discover(&request.target).await;
        let ports = PortScope::from_services(&services).or_tcp(&self.fallback_ports);
        tracing::debug!(scan_id = %request.scan_id, %ports, "scoped target ports");
        let completed = Orchestrator::new(self.backend.as_ref(), &self.settings, &request.scan_id)
            .run(request, &ports)
            .await?;
        let report = normalizer::heavyweight_report(
            request,
            services,
            &completed.report.results,
            Utc::now(),
        );
        Ok(Produced {
            report,
            raw_report: Some(completed.report.xml),
        })
    }

    /// Produces the report of a request without delivering it.
    pub async fn produce_report(
        &self,
        strategy: ScanStrategy,
        request: &ScanRequest,
    ) -> Result<Produced, ScanError> {
        match strategy {
            ScanStrategy::Lightweight => Ok(self.produce_lightweight(request).await),
            ScanStrategy::Heavyweight => self.produce_heavyweight(request).await,
        }
    }

    /// Produces and delivers the report of a validated request.
    ///
    /// On failure a failure notification is sent before the error is
    /// returned.
    pub async fn run(
        &self,
        strategy: ScanStrategy,
        request: &ScanRequest,
    ) -> Result<Outcome, ScanError> {
        let scanner_type = strategy.scanner_type();
        tracing::info!(scan_id = %request.scan_id, %strategy, "Starting scan");
        match self.produce_report(strategy, request).await {
            Ok(produced) => {
                let delivered = self
                    .pipeline()
                    .deliver_success(
                        scanner_type,
                        request,
                        &produced.report,
                        produced.raw_report.as_deref(),
                    )
                    .await;
                tracing::info!(
                    scan_id = %request.scan_id,
                    services = produced.report.summary().total_services,
                    findings = produced.report.summary().total_findings,
                    "Scan completed"
                );
                Ok(Outcome {
                    report: produced.report,
                    delivered,
                })
            }
            Err(error) => {
                tracing::warn!(scan_id = %request.scan_id, %error, "Scan failed");
                let notified: Notified = self
                    .pipeline()
                    .deliver_failure(scanner_type, request, &error.to_string())
                    .await;
                tracing::debug!(scan_id = %request.scan_id, ?notified, "failure delivered");
                Err(error)
            }
        }
    }

    /// Validates an inbound JSON request and runs it.
    ///
    /// Invalid requests are rejected before anything is provisioned and
    /// without any notification.
    pub async fn handle(
        &self,
        strategy: ScanStrategy,
        json: &str,
    ) -> Result<FinalResponse, ScanError> {
        let request = ScanRequest::from_json(json).inspect_err(|error| {
            tracing::warn!(%error, "Rejected scan request");
        })?;
        let outcome = self.run(strategy, &request).await?;
        Ok((&outcome).into())
    }
}

/// Builds a [`Runner`].
///
/// Collaborators that are not set do nothing: discovery finds no services,
/// the dataset is empty, the backend finishes every task without results,
/// storage is in memory and notifications are only recorded.
pub struct RunnerBuilder {
    runner: Runner,
}

impl RunnerBuilder {
    pub fn new(config: &Config) -> Self {
        Self {
            runner: Runner {
                discovery: Arc::new(discovery::Lambda::fixed(vec![])),
                lookup: Arc::new(Dataset::empty()),
                backend: Arc::new(gmp::Lambda::default()),
                storage: Arc::new(storage::InMemoryStorage::new()),
                notifier: Arc::new(notification::Recorder::new()),
                settings: config.into(),
                storage_config: config.storage.clone(),
                fallback_ports: config.discovery.fallback_ports.clone(),
            },
        }
    }

    pub fn discovery<D>(mut self, discovery: D) -> Self
    where
        D: ServiceDiscovery + 'static,
    {
        self.runner.discovery = Arc::new(discovery);
        self
    }

    pub fn lookup<L>(mut self, lookup: L) -> Self
    where
        L: VulnerabilityLookup + 'static,
    {
        self.runner.lookup = Arc::new(lookup);
        self
    }

    pub fn backend<B>(mut self, backend: B) -> Self
    where
        B: Backend + 'static,
    {
        self.runner.backend = Arc::new(backend);
        self
    }

    pub fn storage<S>(mut self, storage: Arc<S>) -> Self
    where
        S: ObjectStorage + 'static,
    {
        self.runner.storage = storage;
        self
    }

    pub fn notifier<N>(mut self, notifier: Arc<N>) -> Self
    where
        N: Notifier + 'static,
    {
        self.runner.notifier = notifier;
        self
    }

    pub fn build(self) -> Runner {
        self.runner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        gmp::LambdaBuilder,
        models::{Protocol, ServiceObservation},
        notification::{Notification, Recorder},
        storage::InMemoryStorage,
    };

    const REQUEST: &str = r#"{"scanId":"scan-1","userId":"user-1","target":"192.0.2.1","callbackUrl":"http://callback"}"#;

    fn apache() -> ServiceObservation {
        ServiceObservation {
            port: 80,
            protocol: Protocol::TCP,
            product: "Apache".to_string(),
            version: "2.4.49".to_string(),
            platform_identifiers: vec![],
        }
    }

    #[test]
    fn strategies() {
        assert_eq!(
            "heavyweight".parse::<ScanStrategy>(),
            Ok(ScanStrategy::Heavyweight)
        );
        assert_eq!(
            "Hybrid".parse::<ScanStrategy>(),
            Ok(ScanStrategy::Lightweight)
        );
        assert!("quick".parse::<ScanStrategy>().is_err());
        assert_eq!(ScanStrategy::Heavyweight.scanner_type(), ScannerType::Openvas);
    }

    #[tokio::test]
    async fn invalid_request_is_not_notified() {
        let notifier = Arc::new(Recorder::new());
        let storage = Arc::new(InMemoryStorage::new());
        let runner = RunnerBuilder::new(&Config::default())
            .notifier(notifier.clone())
            .storage(storage.clone())
            .build();
        let result = runner
            .handle(
                ScanStrategy::Lightweight,
                r#"{"scanId":"scan-1","callbackUrl":"http://callback"}"#,
            )
            .await;
        assert!(matches!(result, Err(ScanError::InputValidation(_))));
        assert!(notifier.sent().is_empty());
        assert!(storage.paths().unwrap().is_empty());
    }

    #[tokio::test]
    async fn lightweight_final_response() {
        let dataset = Dataset::from_json(
            r#"{"products":{"apache":{"vulnerabilities":[{"id":"CVE-2021-41773","ranges":[{"start":"2.4.49","end":"2.4.49"}]}]}}}"#,
        )
        .unwrap();
        let storage = Arc::new(InMemoryStorage::new());
        let runner = RunnerBuilder::new(&Config::default())
            .discovery(discovery::Lambda::fixed(vec![apache()]))
            .lookup(dataset)
            .storage(storage.clone())
            .build();
        let response = runner
            .handle(ScanStrategy::Lightweight, REQUEST)
            .await
            .unwrap();
        assert_eq!(
            response,
            FinalResponse {
                success: true,
                scan_id: "scan-1".to_string(),
                status: "completed".to_string(),
                services_found: 1,
                findings_found: 1,
                storage_url: Some("memory://hybrid/scan-1.json".to_string()),
            }
        );
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["servicesFound"], 1);
        assert_eq!(json["storageUrl"], "memory://hybrid/scan-1.json");
    }

    #[tokio::test(start_paused = true)]
    async fn heavyweight_scopes_discovered_ports() {
        let backend = LambdaBuilder::new()
            .with_create_target(|_, _, ports| {
                assert_eq!(ports.to_string(), "T:80");
                Ok("target-id".to_string())
            })
            .build();
        let runner = RunnerBuilder::new(&Config::default())
            .discovery(discovery::Lambda::fixed(vec![apache()]))
            .backend(backend)
            .build();
        let request = ScanRequest::from_json(REQUEST).unwrap();
        let produced = runner
            .produce_report(ScanStrategy::Heavyweight, &request)
            .await
            .unwrap();
        assert_eq!(produced.report.services().len(), 1);
        assert_eq!(produced.raw_report.as_deref(), Some(""));
    }

    #[tokio::test(start_paused = true)]
    async fn heavyweight_falls_back_to_configured_ports() {
        let backend = LambdaBuilder::new()
            .with_create_target(|_, _, ports| {
                assert_eq!(ports.to_string(), "T:80,T:443");
                Ok("target-id".to_string())
            })
            .build();
        let runner = RunnerBuilder::new(&Config::default())
            .backend(backend)
            .build();
        let request = ScanRequest::from_json(REQUEST).unwrap();
        assert!(
            runner
                .produce_report(ScanStrategy::Heavyweight, &request)
                .await
                .is_ok()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn backend_failure_notifies_once() {
        let notifier = Arc::new(Recorder::new());
        let storage = Arc::new(InMemoryStorage::new());
        let backend = LambdaBuilder::new()
            .with_find_scanner(|_| Err(gmp::Error::Unavailable("connection refused".to_string())))
            .build();
        let runner = RunnerBuilder::new(&Config::default())
            .backend(backend)
            .notifier(notifier.clone())
            .storage(storage.clone())
            .build();
        let result = runner.handle(ScanStrategy::Heavyweight, REQUEST).await;
        assert!(matches!(
            result,
            Err(ScanError::Backend(gmp::Error::Unavailable(_)))
        ));
        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        match &sent[0].1 {
            Notification::Failure(failure) => {
                assert!(failure.error_message.contains("connection refused"));
                assert_eq!(failure.scanner_type, ScannerType::Openvas);
            }
            Notification::Success(_) => panic!("expected failure"),
        }
        assert!(storage.paths().unwrap().is_empty());
    }
}
