// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Parses the `META-INF/MANIFEST.MF` attributes a bundle zip must carry.

use crate::error::Error;
use flux_properties::Version;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub symbolic_name: String,
    pub version: Version,
    pub name: Option<String>,
    pub description: Option<String>,
    pub group: Option<String>,
    /// Native library path, relative to the revision root, exposing the
    /// activator entry points.
    pub activator: Option<String>,
}

impl Manifest {
    /// Parses `Key: Value` lines (continuation lines and blank lines are
    /// ignored; this is deliberately a subset of the full RFC 822 grammar
    /// real MANIFEST.MF files use).
    pub fn parse_str(input: &str) -> Result<Self, Error> {
        let mut attrs: Vec<(String, String)> = Vec::new();
        for line in input.lines() {
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                return Err(Error::Manifest(format!("malformed manifest line: `{line}`")));
            };
            attrs.push((key.trim().to_string(), value.trim().to_string()));
        }

        let get = |name: &str| attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone());

        let symbolic_name = get("Bundle-SymbolicName").unwrap_or_default();
        if symbolic_name.is_empty() {
            return Err(Error::Manifest("missing or empty Bundle-SymbolicName".into()));
        }

        let version_raw = get("Bundle-Version").unwrap_or_default();
        if version_raw.is_empty() {
            return Err(Error::Manifest("missing Bundle-Version".into()));
        }
        let version = version_raw
            .parse::<Version>()
            .map_err(|e| Error::Manifest(format!("invalid Bundle-Version `{version_raw}`: {e}")))?;

        Ok(Self {
            symbolic_name,
            version,
            name: get("Bundle-Name"),
            description: get("Bundle-Description"),
            group: get("Bundle-Group"),
            activator: get("Bundle-Activator"),
        })
    }

    pub fn parse_file(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Manifest(format!("cannot read manifest at {}: {e}", path.display())))?;
        Self::parse_str(&content)
    }
}
