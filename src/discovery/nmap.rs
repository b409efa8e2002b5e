// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Subset of the nmap XML output (`-oX`) that is needed for service discovery.
use serde::Deserialize;

use crate::models::{Protocol, ServiceObservation};

#[derive(Debug, Deserialize)]
pub struct NmapRun {
    #[serde(rename = "host", default)]
    pub hosts: Vec<Host>,
}

#[derive(Debug, Deserialize)]
pub struct Host {
    pub ports: Option<Ports>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Ports {
    #[serde(rename = "port", default)]
    pub ports: Vec<Port>,
}

#[derive(Debug, Deserialize)]
pub struct Port {
    #[serde(rename = "@portid")]
    pub portid: u16,
    #[serde(rename = "@protocol")]
    pub protocol: String,
    pub state: PortState,
    pub service: Option<Service>,
}

#[derive(Debug, Deserialize)]
pub struct PortState {
    #[serde(rename = "@state")]
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub struct Service {
    #[serde(rename = "@name", default)]
    pub name: String,
    #[serde(rename = "@product", default)]
    pub product: String,
    #[serde(rename = "@version", default)]
    pub version: String,
    #[serde(rename = "cpe", default)]
    pub cpes: Vec<String>,
}

impl Port {
    /// Returns the observation of an open port with a detected service.
    pub fn observation(&self) -> Option<ServiceObservation> {
        if self.state.state != "open" || self.portid == 0 {
            return None;
        }
        let service = self.service.as_ref()?;
        let protocol = Protocol::try_from(self.protocol.as_str()).ok()?;
        Some(ServiceObservation {
            port: self.portid,
            protocol,
            product: service.product.trim().to_string(),
            version: service.version.trim().to_string(),
            platform_identifiers: service
                .cpes
                .iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
        })
    }
}

impl NmapRun {
    pub fn observations(&self) -> Vec<ServiceObservation> {
        self.hosts
            .iter()
            .filter_map(|h| h.ports.as_ref())
            .flat_map(|p| p.ports.iter())
            .filter_map(Port::observation)
            .collect()
    }
}
