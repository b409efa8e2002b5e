// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing::{Level, metadata::ParseLevelError};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

/// A tracing level that is written as its name (`"INFO"`) in TOML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LogLevel(Level);

impl Default for LogLevel {
    fn default() -> Self {
        Self(Level::INFO)
    }
}

impl FromStr for LogLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl TryFrom<String> for LogLevel {
    type Error = ParseLevelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LogLevel> for String {
    fn from(value: LogLevel) -> Self {
        value.0.as_str().to_string()
    }
}

impl From<Level> for LogLevel {
    fn from(level: Level) -> Self {
        Self(level)
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Log level configuration, `additional` sets levels per tracing target
/// (e.g. `"scanrelay::gmp" = "TRACE"`).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Logging {
    pub level: LogLevel,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub additional: BTreeMap<String, LogLevel>,
}

impl Default for Logging {
    fn default() -> Self {
        // hyper and rustls log every connection on debug
        let additional = ["hyper", "rustls"]
            .into_iter()
            .map(|target| (target.to_string(), Level::INFO.into()))
            .collect();
        Self {
            level: LogLevel::default(),
            additional,
        }
    }
}

impl Logging {
    /// Per target filter, targets without an entry use `level`.
    pub fn filter(&self) -> filter::Targets {
        self.additional.iter().fold(
            filter::Targets::new().with_default(self.level.0),
            |filter, (target, level)| filter.with_target(target, level.0),
        )
    }

    /// Installs a subscriber that writes to stderr, stdout is reserved for
    /// the response.
    pub fn init(&self) {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .with(self.filter())
            .init();
    }
}
