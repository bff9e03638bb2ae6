// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! The framework configuration keys, built from a caller
//! `Properties` map, a `.toml` file, or both (map wins on conflict).

use crate::error::Error;
use crate::log::LogLevel;
use flux_properties::Properties;
use std::path::PathBuf;
use std::time::Duration;

/// Recognized framework configuration keys.
#[derive(Debug, Clone)]
pub struct FrameworkConfig {
    pub cache_dir: PathBuf,
    pub cache_use_tmp_dir: bool,
    pub cache_always_update_archives: bool,
    pub framework_uuid: String,
    pub scheduled_event_resolution: Duration,
    pub bundles_load_with_nodelete: bool,
    pub logging_active_level: LogLevel,
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".cache"),
            cache_use_tmp_dir: false,
            cache_always_update_archives: false,
            framework_uuid: String::new(),
            scheduled_event_resolution: Duration::from_millis(25),
            bundles_load_with_nodelete: false,
            logging_active_level: LogLevel::Info,
        }
    }
}

impl FrameworkConfig {
    /// Builds from a caller-supplied `Properties` map. `framework.uuid`
    /// defaults to a freshly generated UUID v4 when absent or empty.
    pub fn from_properties(props: &Properties) -> Result<Self, Error> {
        let mut config = Self::default();
        config.apply(props)?;
        if config.framework_uuid.is_empty() {
            config.framework_uuid = uuid::Uuid::new_v4().to_string();
        }
        Ok(config)
    }

    /// Parses a `.toml` document into a flat `Properties` map of the
    /// recognized keys, then builds as [`Self::from_properties`] would.
    /// Dotted config keys (`cache.dir`) may be written either quoted
    /// (`"cache.dir" = ...`) or as nested tables (`[cache]` / `dir = ...`);
    /// both flatten to the same key.
    pub fn from_toml_str(toml_source: &str) -> Result<Self, Error> {
        let props = properties_from_toml(toml_source)?;
        Self::from_properties(&props)
    }

    /// Merges `overrides` on top of a base built from TOML, the map taking
    /// precedence on any key present in both.
    pub fn from_toml_str_and_properties(toml_source: &str, overrides: &Properties) -> Result<Self, Error> {
        let mut merged = properties_from_toml(toml_source)?;
        for key in RECOGNIZED_KEYS {
            if let Some(value) = overrides.get(key) {
                merged.set(*key, value.clone());
            }
        }
        Self::from_properties(&merged)
    }

    fn apply(&mut self, props: &Properties) -> Result<(), Error> {
        if let Some(v) = props.get("cache.dir") {
            self.cache_dir = PathBuf::from(v.to_display_string());
        }
        self.cache_use_tmp_dir = props.get_as_bool("cache.use.tmp.dir", self.cache_use_tmp_dir);
        self.cache_always_update_archives = props.get_as_bool("cache.always.update.archives", self.cache_always_update_archives);
        if let Some(v) = props.get("framework.uuid") {
            self.framework_uuid = v.to_display_string();
        }
        if props.contains_key("scheduled.event.resolution.ms") {
            let ms = props.get("scheduled.event.resolution.ms").unwrap().to_display_string();
            let ms: u64 = ms.parse().map_err(|_| Error::Config(format!("scheduled.event.resolution.ms is not a positive integer: `{ms}`")))?;
            self.scheduled_event_resolution = Duration::from_millis(ms);
        }
        self.bundles_load_with_nodelete = props.get_as_bool("bundles.load.with.nodelete", self.bundles_load_with_nodelete);
        if let Some(v) = props.get("logging.active.level") {
            self.logging_active_level = LogLevel::from_str_default(&v.to_display_string(), self.logging_active_level);
        }
        Ok(())
    }

    pub(crate) fn cache_properties(&self) -> Properties {
        let mut props = Properties::new();
        props.set("cache.dir", self.cache_dir.to_string_lossy().into_owned());
        props.set("cache.use.tmp.dir", self.cache_use_tmp_dir);
        props.set("cache.always.update.archives", self.cache_always_update_archives);
        props
    }
}

fn properties_from_toml(toml_source: &str) -> Result<Properties, Error> {
    let table: toml::Table = toml::from_str(toml_source).map_err(|e| Error::Config(format!("invalid TOML: {e}")))?;
    let mut flat = std::collections::HashMap::new();
    flatten_toml_table(&table, "", &mut flat);

    let mut props = Properties::new();
    for key in RECOGNIZED_KEYS {
        if let Some(value) = flat.get(*key) {
            match value {
                toml::Value::String(s) => {
                    props.set(*key, s.clone());
                }
                toml::Value::Boolean(b) => {
                    props.set(*key, *b);
                }
                toml::Value::Integer(i) => {
                    props.set(*key, *i);
                }
                other => return Err(Error::Config(format!("key `{key}` has unsupported TOML type: {other}"))),
            }
        }
    }
    Ok(props)
}

/// Flattens nested tables into dotted keys, so `[cache] dir = "x"` and the
/// literal quoted key `"cache.dir" = "x"` resolve to the same `cache.dir`.
fn flatten_toml_table(table: &toml::Table, prefix: &str, out: &mut std::collections::HashMap<String, toml::Value>) {
    for (key, value) in table {
        let full_key = if prefix.is_empty() { key.clone() } else { format!("{prefix}.{key}") };
        if let toml::Value::Table(nested) = value {
            flatten_toml_table(nested, &full_key, out);
        } else {
            out.insert(full_key, value.clone());
        }
    }
}

const RECOGNIZED_KEYS: &[&str] = &[
    "cache.dir",
    "cache.use.tmp.dir",
    "cache.always.update.archives",
    "framework.uuid",
    "scheduled.event.resolution.ms",
    "bundles.load.with.nodelete",
    "logging.active.level",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane_when_nothing_is_configured() {
        let config = FrameworkConfig::from_properties(&Properties::new()).unwrap();
        assert_eq!(config.cache_dir, PathBuf::from(".cache"));
        assert!(!config.cache_use_tmp_dir);
        assert!(!config.cache_always_update_archives);
        assert!(!config.framework_uuid.is_empty(), "a uuid is generated when absent");
        assert_eq!(config.scheduled_event_resolution, Duration::from_millis(25));
    }

    #[test]
    fn malformed_resolution_is_a_config_error() {
        let mut props = Properties::new();
        props.set("scheduled.event.resolution.ms", "not-a-number");
        assert!(matches!(FrameworkConfig::from_properties(&props), Err(Error::Config(_))));
    }

    #[test]
    fn explicit_uuid_is_preserved() {
        let mut props = Properties::new();
        props.set("framework.uuid", "fixed-id");
        let config = FrameworkConfig::from_properties(&props).unwrap();
        assert_eq!(config.framework_uuid, "fixed-id");
    }

    #[test]
    fn toml_source_is_parsed_into_recognized_keys() {
        let toml_source = r#"
            cache.dir = "/tmp/somewhere"
            cache.always.update.archives = true
            scheduled.event.resolution.ms = 10
        "#;
        let config = FrameworkConfig::from_toml_str(toml_source).unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/somewhere"));
        assert!(config.cache_always_update_archives);
        assert_eq!(config.scheduled_event_resolution, Duration::from_millis(10));
    }

    #[test]
    fn property_overrides_win_over_toml() {
        let toml_source = r#"cache.dir = "/from/toml""#;
        let mut overrides = Properties::new();
        overrides.set("cache.dir", "/from/props");
        let config = FrameworkConfig::from_toml_str_and_properties(toml_source, &overrides).unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/from/props"));
    }
}
