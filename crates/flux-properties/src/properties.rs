// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Insertion-preserving ordered map from string keys to typed [`Value`]s.

use crate::value::{self, Value};
use crate::version::Version;
use indexmap::IndexMap;
use std::io::{self, BufRead, Write};
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct Properties {
    entries: IndexMap<String, Value>,
}

impl Properties {
    pub fn new() -> Self {
        Self { entries: IndexMap::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.shift_remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the stored string, the display form of a non-string value, or
    /// `default` if the key is absent.
    pub fn get_string<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        match self.entries.get(key) {
            Some(Value::String(s)) => s.as_str(),
            Some(_) | None => default,
        }
    }

    pub fn get_as_long(&self, key: &str, default: i64) -> i64 {
        match self.entries.get(key) {
            Some(Value::Long(v)) => *v,
            Some(Value::String(s)) => value::convert_str_to_long(s).unwrap_or(default),
            _ => default,
        }
    }

    pub fn get_as_double(&self, key: &str, default: f64) -> f64 {
        match self.entries.get(key) {
            Some(Value::Double(v)) => *v,
            Some(Value::String(s)) => value::convert_str_to_double(s).unwrap_or(default),
            _ => default,
        }
    }

    pub fn get_as_bool(&self, key: &str, default: bool) -> bool {
        match self.entries.get(key) {
            Some(Value::Bool(v)) => *v,
            Some(Value::String(s)) => value::convert_str_to_bool(s).unwrap_or(default),
            _ => default,
        }
    }

    pub fn get_as_version(&self, key: &str, default: Version) -> Version {
        match self.entries.get(key) {
            Some(Value::Version(v)) => v.clone(),
            Some(Value::String(s)) => value::convert_str_to_version(s).unwrap_or(default),
            _ => default,
        }
    }

    /// Writes plain `key=value` lines, one per entry, in insertion order.
    /// This is the `bundle_state.properties` on-disk format: values
    /// lose their type tag and are re-read through a typed accessor by a
    /// caller who already knows what each key means.
    pub fn store<W: Write>(&self, mut w: W) -> io::Result<()> {
        for (key, val) in &self.entries {
            writeln!(w, "{key}={}", val.to_display_string())?;
        }
        Ok(())
    }

    pub fn store_to_file(&self, path: &Path) -> io::Result<()> {
        let file = std::fs::File::create(path)?;
        self.store(io::BufWriter::new(file))
    }

    /// Parses `key=value` lines (blank lines and `#`-prefixed comments
    /// ignored) into a string-valued Properties map.
    pub fn load<R: BufRead>(r: R) -> io::Result<Self> {
        let mut props = Properties::new();
        for line in r.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if let Some((key, val)) = trimmed.split_once('=') {
                props.set(key.trim().to_string(), Value::String(val.trim().to_string()));
            }
        }
        Ok(props)
    }

    pub fn load_from_file(path: &Path) -> io::Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::load(io::BufReader::new(file))
    }

    /// Writes `type:key=value` lines that round-trip through [`Self::load_typed`]
    /// with the original [`Value`] variants intact. Used where a Properties
    /// map must survive a store/load cycle without losing type information
    /// (general persistence, as opposed to the plain `bundle_state.properties`
    /// format).
    pub fn store_typed<W: Write>(&self, mut w: W) -> io::Result<()> {
        for (key, val) in &self.entries {
            let tag = match val {
                Value::String(_) => 's',
                Value::Long(_) => 'l',
                Value::Double(_) => 'd',
                Value::Bool(_) => 'b',
                Value::Version(_) => 'v',
            };
            writeln!(w, "{tag}:{key}={}", val.to_display_string())?;
        }
        Ok(())
    }

    pub fn load_typed<R: BufRead>(r: R) -> io::Result<Self> {
        let mut props = Properties::new();
        for line in r.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let Some((tag_and_key, raw_val)) = trimmed.split_once('=') else { continue };
            let Some((tag, key)) = tag_and_key.split_once(':') else { continue };
            let value = match tag {
                "s" => Value::String(raw_val.to_string()),
                "l" => Value::Long(raw_val.parse().unwrap_or(0)),
                "d" => Value::Double(raw_val.parse().unwrap_or(0.0)),
                "b" => Value::Bool(raw_val.parse().unwrap_or(false)),
                "v" => Value::Version(raw_val.parse().unwrap_or_else(|_| Version::new(0, 0, 0))),
                _ => Value::String(raw_val.to_string()),
            };
            props.set(key.to_string(), value);
        }
        Ok(props)
    }
}

impl PartialEq for Properties {
    fn eq(&self, other: &Self) -> bool {
        if self.entries.len() != other.entries.len() {
            return false;
        }
        self.entries.iter().all(|(k, v)| other.entries.get(k) == Some(v))
    }
}

impl Eq for Properties {}

impl FromIterator<(String, Value)> for Properties {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}
