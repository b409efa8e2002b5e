// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::fmt::Display;

/// Enum representing the transport protocol of an observed port.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    TCP,
    UDP,
}

impl TryFrom<&str> for Protocol {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "udp" => Ok(Protocol::UDP),
            "tcp" => Ok(Protocol::TCP),
            _ => Err(format!("Invalid protocol: {value}")),
        }
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::UDP => write!(f, "udp"),
            Protocol::TCP => write!(f, "tcp"),
        }
    }
}

/// A service detected on an open port of the target.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ServiceObservation {
    /// Port number, 1 to 65535
    pub port: u16,
    /// Transport protocol of the port
    pub protocol: Protocol,
    /// Product name as reported by service detection, may be empty
    #[serde(default)]
    pub product: String,
    /// Product version as reported by service detection, may be empty
    #[serde(default)]
    pub version: String,
    /// CPE identifiers of the service
    #[serde(rename = "cpes", default)]
    pub platform_identifiers: Vec<String>,
}

impl ServiceObservation {
    /// Returns true when both product and version are known.
    ///
    /// Only identified services are used for vulnerability lookups.
    pub fn is_identified(&self) -> bool {
        !self.product.trim().is_empty() && !self.version.trim().is_empty()
    }
}
