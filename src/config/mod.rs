// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Configuration of scanrelay.
//!
//! The configuration is loaded once on start up and then handed down by
//! reference. Nothing below this module looks at the environment.
use std::{
    fmt::{self, Display, Formatter},
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use clap::{ArgAction, ArgMatches};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod duration;
pub mod logging;

pub use logging::Logging;

const MASKED: &str = "***";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to read config {0}: {1}")]
    Read(PathBuf, io::Error),
    #[error("Unable to parse config {0}: {1}")]
    Parse(PathBuf, toml::de::Error),
    #[error("Invalid log level {0}")]
    LogLevel(String),
}

/// Connection and provisioning settings of the GMP scan backend.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Gmp {
    /// Unix socket of gvmd
    pub socket: PathBuf,
    pub username: String,
    pub password: String,
    /// Scan config used for created tasks
    pub config_id: String,
    /// When not set the scanner is looked up by `scanner_name`
    pub scanner_id: Option<String>,
    pub scanner_name: String,
    /// Maximum number of result rows fetched per report, -1 fetches all
    pub max_results: i64,
    pub alive_test: String,
}

impl Default for Gmp {
    fn default() -> Self {
        Self {
            socket: PathBuf::from("/run/gvmd/gvmd.sock"),
            username: String::new(),
            password: String::new(),
            // Full and fast
            config_id: "daba56c8-73ec-11df-a475-002264764cea".to_string(),
            scanner_id: None,
            scanner_name: "OpenVAS Default".to_string(),
            max_results: -1,
            alive_test: "Consider Alive".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Polling {
    #[serde(with = "duration")]
    pub interval: Duration,
    /// Ceiling for a task to reach a terminal status after it has been started
    #[serde(with = "duration")]
    pub timeout: Duration,
}

impl Default for Polling {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Discovery {
    /// nmap executable
    pub binary: PathBuf,
    #[serde(with = "duration")]
    pub timeout: Duration,
    /// TCP ports scanned by the backend when discovery finds no open port
    pub fallback_ports: Vec<u16>,
}

impl Default for Discovery {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("nmap"),
            timeout: Duration::from_secs(300),
            fallback_ports: vec![80, 443],
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Lookup {
    /// JSON dataset of vulnerable product versions, without it no service matches
    pub dataset: Option<PathBuf>,
    /// Also match versions sharing major.minor with a known range bound
    pub check_similar: bool,
}

impl Default for Lookup {
    fn default() -> Self {
        Self {
            dataset: None,
            check_similar: true,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Storage {
    /// Root directory of stored artifacts
    pub path: PathBuf,
    /// Base URL under which `path` is served, used for signed references
    pub public_url: String,
    pub signing_key: String,
    pub sign_references: bool,
    pub lightweight_prefix: String,
    pub heavyweight_prefix: String,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/scanrelay/reports"),
            public_url: "http://127.0.0.1:8080/reports".to_string(),
            signing_key: String::new(),
            sign_references: true,
            lightweight_prefix: "hybrid".to_string(),
            heavyweight_prefix: "scan-results".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Notification {
    /// Shared secret sent with every webhook, no header is sent when unset
    pub secret: Option<String>,
    pub header: String,
    #[serde(with = "duration")]
    pub timeout: Duration,
}

impl Default for Notification {
    fn default() -> Self {
        Self {
            secret: None,
            header: "x-webhook-secret".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub gmp: Gmp,
    pub polling: Polling,
    pub discovery: Discovery,
    pub lookup: Lookup,
    pub storage: Storage,
    pub notification: Notification,
    pub log: Logging,
}

impl Display for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut masked = self.clone();
        if !masked.gmp.password.is_empty() {
            masked.gmp.password = MASKED.to_string();
        }
        if !masked.storage.signing_key.is_empty() {
            masked.storage.signing_key = MASKED.to_string();
        }
        if masked.notification.secret.is_some() {
            masked.notification.secret = Some(MASKED.to_string());
        }
        write!(f, "{}", toml::to_string_pretty(&masked).unwrap_or_default())
    }
}

impl Config {
    fn load_etc() -> Option<Self> {
        let config = std::fs::read_to_string("/etc/scanrelay/scanrelay.toml").ok()?;
        toml::from_str(&config).ok()
    }

    fn load_user() -> Option<Self> {
        let home = std::env::var("HOME").ok()?;
        let path = format!("{home}/.config/scanrelay/scanrelay.toml");
        let config = std::fs::read_to_string(path).ok()?;
        toml::from_str(&config).ok()
    }

    /// Loads a configuration file, missing sections use their defaults.
    pub fn from_file<P>(path: P) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        tracing::debug!(path=%path.display(), "loading config");
        let config = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_owned(), e))?;
        toml::from_str(&config).map_err(|e| ConfigError::Parse(path.to_owned(), e))
    }

    /// Arguments that are understood by [`Config::from_matches`].
    pub fn command() -> clap::Command {
        clap::Command::new("scanrelay")
            .arg(
                clap::Arg::new("config")
                    .short('c')
                    .env("SCANRELAY_CONFIG")
                    .long("config")
                    .action(ArgAction::Set)
                    .help("path to toml config file"),
            )
            .arg(
                clap::Arg::new("gmp-socket")
                    .env("GMP_SOCKET")
                    .long("gmp-socket")
                    .value_parser(clap::builder::PathBufValueParser::new())
                    .help("socket to gvmd"),
            )
            .arg(
                clap::Arg::new("storage-path")
                    .env("STORAGE_PATH")
                    .long("storage-path")
                    .value_parser(clap::builder::PathBufValueParser::new())
                    .help("directory the reports are stored in"),
            )
            .arg(
                clap::Arg::new("log-level")
                    .env("SCANRELAY_LOG")
                    .long("log-level")
                    .action(ArgAction::Set)
                    .help("level of log messages (TRACE, DEBUG, INFO, WARN, ERROR)"),
            )
    }

    pub fn from_matches(cmds: &ArgMatches) -> Result<Self, ConfigError> {
        let mut config = match cmds.get_one::<String>("config") {
            Some(path) => Self::from_file(path)?,
            None => Self::load_user()
                .or_else(Self::load_etc)
                .unwrap_or_default(),
        };
        if let Some(path) = cmds.get_one::<PathBuf>("gmp-socket") {
            config.gmp.socket = path.clone();
        }
        if let Some(path) = cmds.get_one::<PathBuf>("storage-path") {
            config.storage.path = path.clone();
        }
        if let Some(level) = cmds.get_one::<String>("log-level") {
            config.log.level = level
                .parse()
                .map_err(|_| ConfigError::LogLevel(level.clone()))?;
        }
        Ok(config)
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::from_matches(&Self::command().get_matches())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::Config;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.polling.interval, Duration::from_secs(10));
        assert_eq!(config.polling.timeout, Duration::from_secs(1800));
        assert_eq!(config.discovery.timeout, Duration::from_secs(300));
        assert_eq!(config.discovery.fallback_ports, vec![80, 443]);
        assert_eq!(config.notification.header, "x-webhook-secret");
        assert_eq!(config.gmp.max_results, -1);
        assert!(config.gmp.scanner_id.is_none());
    }

    #[test]
    fn partial_toml() {
        let config: Config = toml::from_str(
            r#"
[polling]
interval = "5s"
timeout = "45m"

[gmp]
username = "admin"
password = "secret"
scanner_id = "08b69003-5fc2-4037-a479-93b440211c73"

[log]
level = "DEBUG"
"#,
        )
        .unwrap();
        assert_eq!(config.polling.interval, Duration::from_secs(5));
        assert_eq!(config.polling.timeout, Duration::from_secs(45 * 60));
        assert_eq!(config.gmp.config_id, "daba56c8-73ec-11df-a475-002264764cea");
        assert_eq!(config.log.level, tracing::Level::DEBUG.into());
        assert_eq!(config.storage.lightweight_prefix, "hybrid");
    }

    #[test]
    fn display_masks_secrets() {
        let mut config = Config::default();
        config.gmp.password = "hunter2".to_string();
        config.notification.secret = Some("shared".to_string());
        let shown = config.to_string();
        assert!(!shown.contains("hunter2"));
        assert!(!shown.contains("shared"));
        assert!(shown.contains("***"));
    }

    #[test]
    fn file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scanrelay.toml");
        std::fs::write(&path, "[storage]\nsigning_key = \"k\"\n").unwrap();
        let matches = Config::command()
            .try_get_matches_from([
                "scanrelay",
                "--config",
                path.to_str().unwrap(),
                "--gmp-socket",
                "/tmp/gvmd.sock",
            ])
            .unwrap();
        let config = Config::from_matches(&matches).unwrap();
        assert_eq!(config.storage.signing_key, "k");
        assert_eq!(config.gmp.socket, std::path::PathBuf::from("/tmp/gvmd.sock"));
    }
}
