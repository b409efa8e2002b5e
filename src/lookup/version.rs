// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::cmp::{Ordering, max};

use lazy_regex::{Lazy, Regex, lazy_regex};

static RE: Lazy<Regex> = lazy_regex!(r"(\d+|.)");
static MAJOR_MINOR: Lazy<Regex> = lazy_regex!(r"^(\d+)\.(\d+)");

/// A product version as reported by service detection, e.g. `2.4.49` or `8.9p1`.
///
/// Versions are compared from left to right in parts of digits and single
/// other characters. Numeric parts compare by value, letters sort before
/// other characters and a tilde sorts before anything, even the end of the
/// version. `1.2.3~rc1` is therefore older than `1.2.3`, which is older than
/// `1.2.3a`.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Version(String);

impl Version {
    /// Creates a version from the first word of `version`.
    ///
    /// nmap adds distribution details after the upstream version
    /// (`8.9p1 Ubuntu 3ubuntu0.6`), those are not part of the comparison.
    pub fn new(version: &str) -> Self {
        Self(
            version
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the first two numeric components.
    pub fn major_minor(&self) -> Option<(u32, u32)> {
        let captures = MAJOR_MINOR.captures(&self.0)?;
        let major = captures.get(1)?.as_str().parse().ok()?;
        let minor = captures.get(2)?.as_str().parse().ok()?;
        Some((major, minor))
    }

    /// True when both versions share major and minor.
    pub fn is_similar(&self, other: &Version) -> bool {
        match (self.major_minor(), other.major_minor()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.0 == other.0 {
            return Some(Ordering::Equal);
        }

        let a_parts: Vec<&str> = RE.find_iter(&self.0).map(|m| m.as_str()).collect();
        let b_parts: Vec<&str> = RE.find_iter(&other.0).map(|m| m.as_str()).collect();

        for i in 0..max(a_parts.len(), b_parts.len()) {
            let (a_part, b_part) = match (a_parts.get(i), b_parts.get(i)) {
                (Some(a), Some(b)) => (*a, *b),
                // "~" is sorted before everything, even the end of a string
                (None, Some(b)) if *b == "~" => return Some(Ordering::Greater),
                (None, _) => return Some(Ordering::Less),
                (Some(a), None) if *a == "~" => return Some(Ordering::Less),
                (Some(_), None) => return Some(Ordering::Greater),
            };

            if a_part == b_part {
                continue;
            }

            match (a_part.parse::<u32>(), b_part.parse::<u32>()) {
                (Ok(a), Ok(b)) => match a.cmp(&b) {
                    // leading zeros
                    Ordering::Equal => continue,
                    ordering => return Some(ordering),
                },
                (Ok(_), _) => return Some(Ordering::Greater),
                (_, Ok(_)) => return Some(Ordering::Less),
                _ => (),
            }

            match (
                a_part.chars().all(char::is_alphabetic),
                b_part.chars().all(char::is_alphabetic),
            ) {
                (true, true) => match a_part.to_lowercase().cmp(&b_part.to_lowercase()) {
                    Ordering::Equal => continue,
                    ordering => return Some(ordering),
                },
                (true, false) if b_part == "~" => return Some(Ordering::Greater),
                (true, false) => return Some(Ordering::Less),
                (false, true) if a_part == "~" => return Some(Ordering::Less),
                (false, true) => return Some(Ordering::Greater),
                _ => {
                    if a_part != "~" && a_part > b_part || b_part == "~" {
                        return Some(Ordering::Greater);
                    } else {
                        return Some(Ordering::Less);
                    }
                }
            }
        }
        Some(Ordering::Equal)
    }
}
