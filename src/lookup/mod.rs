// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Lookup of known vulnerabilities of a product version.
//!
//! The dataset is loaded once and only read afterwards, it can be shared
//! between concurrently running scans.
use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;

mod version;

pub use version::Version;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to read dataset {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("Unable to parse dataset: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Returns identifiers of known vulnerabilities of a product version
pub trait VulnerabilityLookup: Send + Sync {
    /// Returns the matching identifiers in dataset order, may be empty.
    fn lookup(&self, product: &str, version: &str) -> Vec<String>;
}

/// Inclusive range of affected versions, a missing bound is open
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct VersionRange {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

impl VersionRange {
    pub fn contains(&self, version: &Version) -> bool {
        let after_start = match &self.start {
            Some(start) => version >= &Version::new(start),
            None => true,
        };
        let before_end = match &self.end {
            Some(end) => version <= &Version::new(end),
            None => true,
        };
        after_start && before_end
    }

    /// True when the version shares major.minor with one of the bounds.
    pub fn is_similar(&self, version: &Version) -> bool {
        self.start
            .iter()
            .chain(self.end.iter())
            .any(|bound| version.is_similar(&Version::new(bound)))
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Vulnerability {
    pub id: String,
    #[serde(default)]
    pub ranges: Vec<VersionRange>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ProductEntry {
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub vulnerabilities: Vec<Vulnerability>,
}

#[derive(Debug, Default, Deserialize)]
struct DatasetFile {
    #[serde(default)]
    products: BTreeMap<String, ProductEntry>,
}

fn normalize(product: &str) -> String {
    product.trim().to_lowercase()
}

/// Static dataset of vulnerable product versions
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    products: Vec<ProductEntry>,
    /// lower cased name or alias to index in `products`
    index: HashMap<String, usize>,
    check_similar: bool,
}

impl Dataset {
    /// Dataset without products, nothing matches.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        let file: DatasetFile = serde_json::from_str(json)?;
        let mut dataset = Self {
            check_similar: true,
            ..Default::default()
        };
        for (name, entry) in file.products {
            let idx = dataset.products.len();
            for key in std::iter::once(&name).chain(entry.aliases.iter()) {
                dataset.index.entry(normalize(key)).or_insert(idx);
            }
            dataset.products.push(entry);
        }
        Ok(dataset)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let json =
            std::fs::read_to_string(path).map_err(|e| Error::Io(path.to_path_buf(), e))?;
        let dataset = Self::from_json(&json)?;
        tracing::debug!(
            path = %path.display(),
            products = dataset.products.len(),
            "loaded dataset"
        );
        Ok(dataset)
    }

    /// Loads the configured dataset, without a configured path nothing matches.
    pub fn from_config(config: &crate::config::Lookup) -> Result<Self, Error> {
        let dataset = match &config.dataset {
            Some(path) => Self::from_file(path)?,
            None => {
                tracing::warn!("No vulnerability dataset configured, no service will match");
                Self::empty()
            }
        };
        Ok(dataset.with_check_similar(config.check_similar))
    }

    pub fn with_check_similar(mut self, check_similar: bool) -> Self {
        self.check_similar = check_similar;
        self
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl VulnerabilityLookup for Dataset {
    fn lookup(&self, product: &str, version: &str) -> Vec<String> {
        let version = Version::new(version);
        if version.is_empty() {
            return vec![];
        }
        let Some(entry) = self
            .index
            .get(&normalize(product))
            .and_then(|idx| self.products.get(*idx))
        else {
            return vec![];
        };
        let mut ids: Vec<String> = vec![];
        for vulnerability in &entry.vulnerabilities {
            let matches = vulnerability.ranges.iter().any(|range| {
                range.contains(&version) || (self.check_similar && range.is_similar(&version))
            });
            if matches && !ids.contains(&vulnerability.id) {
                ids.push(vulnerability.id.clone());
            }
        }
        ids
    }
}
