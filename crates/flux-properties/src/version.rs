// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Bundle/service version numbers: `MAJOR.MINOR.MICRO[.QUALIFIER]`.
//!
//! Deliberately distinct from `semver`'s `MAJOR.MINOR.PATCH[-pre][+build]`
//! grammar: a qualifier here is a plain trailing dot-separated string, not a
//! pre-release/build-metadata pair, so comparisons and parsing differ enough
//! that reusing `semver::Version` would misparse valid inputs (`1.2.3.rc1`)
//! and accept invalid ones (`1.2.3-rc1`).

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    major: u32,
    minor: u32,
    micro: u32,
    qualifier: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum VersionParseError {
    #[error("version must have the form MAJOR.MINOR.MICRO[.QUALIFIER], got `{0}`")]
    Malformed(String),
    #[error("version component `{0}` is not a non-negative integer")]
    NotANumber(String),
}

impl Version {
    pub fn new(major: u32, minor: u32, micro: u32) -> Self {
        Self { major, minor, micro, qualifier: String::new() }
    }

    pub fn with_qualifier(major: u32, minor: u32, micro: u32, qualifier: impl Into<String>) -> Self {
        Self { major, minor, micro, qualifier: qualifier.into() }
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn micro(&self) -> u32 {
        self.micro
    }

    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        // A bare numeric form ("1" or "1.2") is rejected even though the
        // individual components would parse fine in isolation.
        let mut parts = input.splitn(4, '.');
        let major = parts.next().ok_or_else(|| VersionParseError::Malformed(input.to_string()))?;
        let minor = parts.next().ok_or_else(|| VersionParseError::Malformed(input.to_string()))?;
        let micro = parts.next().ok_or_else(|| VersionParseError::Malformed(input.to_string()))?;
        let qualifier = parts.next().unwrap_or("");

        let major = parse_component(major)?;
        let minor = parse_component(minor)?;
        let micro = parse_component(micro)?;
        Ok(Self { major, minor, micro, qualifier: qualifier.to_string() })
    }
}

fn parse_component(raw: &str) -> Result<u32, VersionParseError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(VersionParseError::NotANumber(raw.to_string()));
    }
    raw.parse().map_err(|_| VersionParseError::NotANumber(raw.to_string()))
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if !self.qualifier.is_empty() {
            write!(f, ".{}", self.qualifier)?;
        }
        Ok(())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.micro, &self.qualifier)
            .cmp(&(other.major, other.minor, other.micro, &other.qualifier))
    }
}
