// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Client of the Greenbone Management Protocol (GMP).
//!
//! gvmd is reached via its unix socket. Each backend operation opens a
//! connection, authenticates, sends its commands and reads the responses.
//! Nothing is retried here, callers decide what a failure means.
use std::{collections::BTreeSet, fmt::Display, io};

use thiserror::Error;

use crate::models::{Protocol, ServiceObservation};

mod backend;
mod client;
mod commands;
mod connection;
pub mod response;

pub use backend::*;
pub use client::Client;
pub use commands::Command;
pub use connection::{Connection, Reply, read_element};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The backend could not be reached or the connection broke.
    #[error("Scan backend unavailable: {0}")]
    Unavailable(String),
    /// The backend answered with something that is not understood.
    #[error("Unexpected response of scan backend: {0}")]
    Protocol(String),
    /// The backend answered with an error status.
    #[error("Scan backend rejected {command} with {status}: {text}")]
    Rejected {
        command: String,
        status: u16,
        text: String,
    },
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Unavailable(err.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(value: quick_xml::Error) -> Self {
        match value {
            quick_xml::Error::Io(err) => Error::Unavailable(err.to_string()),
            value => Error::Protocol(value.to_string()),
        }
    }
}

impl From<quick_xml::de::DeError> for Error {
    fn from(value: quick_xml::de::DeError) -> Self {
        Error::Protocol(value.to_string())
    }
}

/// Login of the GMP user
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Everything needed to create a task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDefinition {
    pub name: String,
    pub comment: String,
    pub config_id: String,
    pub target_id: String,
    pub scanner_id: String,
}

/// Status of a task as reported by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskStatus {
    /// Backend status string, e.g. `Running` or `Done`
    pub status: String,
    pub progress: Option<i32>,
    /// ID of the last report of the task
    pub report_id: Option<String>,
}

/// A completed report
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawReport {
    /// XML as it was sent by the backend
    pub xml: String,
    pub results: Vec<response::ReportResult>,
}

/// Ports a target is restricted to.
///
/// Renders as a gvmd port range (`T:22,T:80`). An empty scope leaves the
/// choice to the backend default port list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortScope {
    ports: BTreeSet<(Protocol, u16)>,
}

impl PortScope {
    pub fn tcp<I>(ports: I) -> Self
    where
        I: IntoIterator<Item = u16>,
    {
        Self {
            ports: ports.into_iter().map(|p| (Protocol::TCP, p)).collect(),
        }
    }

    /// Creates a scope from the TCP ports of observed services.
    pub fn from_services(services: &[ServiceObservation]) -> Self {
        Self::tcp(
            services
                .iter()
                .filter(|s| s.protocol == Protocol::TCP)
                .map(|s| s.port),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Returns the scope or the given TCP ports when the scope is empty.
    pub fn or_tcp(self, fallback: &[u16]) -> Self {
        if self.is_empty() {
            Self::tcp(fallback.iter().copied())
        } else {
            self
        }
    }

    /// Port range for gvmd, None for an empty scope.
    pub fn port_range(&self) -> Option<String> {
        (!self.is_empty()).then(|| self.to_string())
    }
}

impl Display for PortScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (protocol, port) in &self.ports {
            if !first {
                write!(f, ",")?;
            }
            first = false;
            match protocol {
                Protocol::TCP => write!(f, "T:{port}")?,
                Protocol::UDP => write!(f, "U:{port}")?,
            }
        }
        Ok(())
    }
}
