// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Top-level cache directory: owns every bundle's [`BundleArchive`], scans
//! for archives left over from a prior run, and tears the whole directory
//! down on shutdown when configured to. Grounded on
//! `celix_bundle_cache.c`'s `celix_bundleCache_create`/`_getArchives`/
//! `_createArchive`.

use crate::archive::{BundleArchive, Revision};
use crate::error::Error;
use crate::manifest::Manifest;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Bundle id reserved for the framework's own (non-extracted) archive.
pub const SYSTEM_BUNDLE_ID: i64 = 0;

fn archive_root_dir_name(id: i64) -> String {
    format!("bundle{id}")
}

fn revision_dir_name(revision_number: u32) -> String {
    format!("version0.{revision_number}")
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub cache_dir: PathBuf,
    pub delete_on_destroy: bool,
    pub always_update: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { cache_dir: PathBuf::from(".cache"), delete_on_destroy: false, always_update: false }
    }
}

impl CacheConfig {
    /// Mirrors `celix_bundleCache_create`'s property lookup: `cache.dir`
    /// (default `.cache`), `cache.use.tmp.dir` (default false, which
    /// redirects into a process-unique `/tmp` directory and implies
    /// delete-on-destroy), and `cache.always.update.archives`.
    pub fn from_properties(props: &flux_properties::Properties, framework_uuid: &str) -> Self {
        let use_tmp_dir = props.get_as_bool("cache.use.tmp.dir", false);
        let always_update = props.get_as_bool("cache.always.update.archives", false);
        if use_tmp_dir {
            let dir = std::env::temp_dir().join(format!("flux-cache-{framework_uuid}"));
            Self { cache_dir: dir, delete_on_destroy: true, always_update }
        } else {
            let dir = props.get_string("cache.dir", ".cache").to_string();
            Self { cache_dir: PathBuf::from(dir), delete_on_destroy: false, always_update }
        }
    }
}

/// Owns the on-disk cache directory and every bundle archive created from
/// it during this framework's lifetime.
pub struct BundleCache {
    config: CacheConfig,
}

impl BundleCache {
    pub fn create(config: CacheConfig) -> Result<Self, Error> {
        std::fs::create_dir_all(&config.cache_dir)
            .map_err(|e| Error::Cache { path: config.cache_dir.clone(), source: e })?;
        Ok(Self { config })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.config.cache_dir
    }

    /// Extracts `location` into `<cacheDir>/bundle<id>/version0.1` unless
    /// a prior revision already exists and is at least as fresh as the
    /// source — see [`extract_or_reuse`].
    pub fn create_archive(&self, id: i64, location: &str) -> Result<BundleArchive, Error> {
        let root = self.config.cache_dir.join(archive_root_dir_name(id));
        std::fs::create_dir_all(&root).map_err(|e| Error::Cache { path: root.clone(), source: e })?;
        std::fs::create_dir_all(root.join("store")).map_err(|e| Error::Cache { path: root.clone(), source: e })?;

        let revision = extract_or_reuse(&root, 1, location, self.config.always_update)?;
        let archive = BundleArchive::new(id, root, location.to_string(), revision);
        archive.persist_state_properties()?;
        Ok(archive)
    }

    /// The system bundle (id 0) has no zip to extract; its archive
    /// is a bare directory with a synthetic manifest.
    pub fn create_system_archive(&self) -> Result<BundleArchive, Error> {
        let root = self.config.cache_dir.join(archive_root_dir_name(SYSTEM_BUNDLE_ID));
        std::fs::create_dir_all(&root).map_err(|e| Error::Cache { path: root.clone(), source: e })?;
        let revision_root = root.join(revision_dir_name(1));
        std::fs::create_dir_all(revision_root.join("META-INF"))
            .map_err(|e| Error::Cache { path: root.clone(), source: e })?;
        let manifest_path = revision_root.join("META-INF").join("MANIFEST.MF");
        if !manifest_path.exists() {
            std::fs::write(&manifest_path, "Bundle-SymbolicName: celix_framework\nBundle-Version: 0.0.0\n")
                .map_err(|e| Error::Cache { path: manifest_path.clone(), source: e })?;
        }
        let manifest = Manifest::parse_file(&manifest_path)?;
        let revision = Revision { number: 1, root: revision_root, source_location: String::new(), manifest };
        let archive = BundleArchive::new(SYSTEM_BUNDLE_ID, root, String::new(), revision);
        archive.persist_state_properties()?;
        Ok(archive)
    }

    /// Scans `cacheDir` for `bundle<digits>` directories left over from a
    /// previous run and rebuilds an archive for each, skipping (and
    /// logging) any directory whose state properties or manifest can't be
    /// parsed rather than failing the whole scan.
    pub fn recreate_archives(&self) -> Result<Vec<BundleArchive>, Error> {
        let mut archives = Vec::new();
        let entries = match std::fs::read_dir(&self.config.cache_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(archives),
            Err(e) => return Err(Error::Cache { path: self.config.cache_dir.clone(), source: e }),
        };

        for entry in entries {
            let entry = entry.map_err(|e| Error::Cache { path: self.config.cache_dir.clone(), source: e })?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
            if !path.is_dir() || !name.starts_with("bundle") {
                continue;
            }
            let Some(id) = name.strip_prefix("bundle").and_then(|s| s.parse::<i64>().ok()) else {
                tracing::warn!(dir = %path.display(), "skipping cache entry with malformed bundle id");
                continue;
            };
            match recreate_one(&path, id) {
                Ok(archive) => archives.push(archive),
                Err(err) => tracing::error!(dir = %path.display(), %err, "cannot recreate bundle archive"),
            }
        }

        Ok(archives)
    }

    /// Removes the entire cache directory. Called on destroy when the
    /// cache config requested `delete_on_destroy` (tmp-dir mode), or
    /// explicitly by a caller that wants a clean slate.
    pub fn delete(&self) -> Result<(), Error> {
        match std::fs::remove_dir_all(&self.config.cache_dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Cache { path: self.config.cache_dir.clone(), source: e }),
        }
    }

    pub fn delete_on_destroy(&self) -> bool {
        self.config.delete_on_destroy
    }
}

fn recreate_one(root: &Path, id: i64) -> Result<BundleArchive, Error> {
    let state_path = root.join("bundle_state.properties");
    let state = flux_properties::Properties::load_from_file(&state_path)
        .map_err(|e| Error::Cache { path: state_path.clone(), source: e })?;
    let location = state.get_string("bundle.location", "").to_string();
    let revision_number = state.get_as_long("bundle.revision", 1).max(1) as u32;

    let revision_root = root.join(revision_dir_name(revision_number));
    let manifest_path = revision_root.join("META-INF").join("MANIFEST.MF");
    let manifest = Manifest::parse_file(&manifest_path)?;
    let revision = Revision { number: revision_number, root: revision_root, source_location: location.clone(), manifest };
    Ok(BundleArchive::new(id, root.to_path_buf(), location, revision))
}

/// Mirrors `celix_bundleArchive_extractBundle`'s extract-vs-reuse policy:
/// reuse the existing revision directory unless `force_update` is set or
/// the source zip's mtime is newer than the revision's recorded manifest
/// mtime, in which case the old revision directory is removed and the zip
/// is re-extracted.
fn extract_or_reuse(archive_root: &Path, revision_number: u32, location: &str, force_update: bool) -> Result<Revision, Error> {
    let revision_root = archive_root.join(revision_dir_name(revision_number));
    let manifest_path = revision_root.join("META-INF").join("MANIFEST.MF");

    let needs_extract = if force_update {
        true
    } else if manifest_path.exists() {
        match (std::fs::metadata(location).and_then(|m| m.modified()), std::fs::metadata(&manifest_path).and_then(|m| m.modified())) {
            (Ok(source_mtime), Ok(revision_mtime)) => source_mtime > revision_mtime,
            _ => true,
        }
    } else {
        true
    };

    if needs_extract {
        if revision_root.exists() {
            std::fs::remove_dir_all(&revision_root).map_err(|e| Error::Cache { path: revision_root.clone(), source: e })?;
        }
        extract_zip(location, &revision_root)?;
        tracing::debug!(location, root = %revision_root.display(), "extracted bundle archive");
    } else {
        tracing::debug!(location, root = %revision_root.display(), "reusing existing bundle archive revision");
    }

    let manifest = Manifest::parse_file(&manifest_path)?;
    Ok(Revision { number: revision_number, root: revision_root, source_location: location.to_string(), manifest })
}

fn extract_zip(location: &str, dest: &Path) -> Result<(), Error> {
    std::fs::create_dir_all(dest).map_err(|e| Error::Cache { path: dest.to_path_buf(), source: e })?;
    let file = std::fs::File::open(location).map_err(|e| Error::Cache { path: PathBuf::from(location), source: e })?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| Error::Manifest(format!("cannot open bundle archive `{location}`: {e}")))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| Error::Manifest(format!("cannot read entry {i} of `{location}`: {e}")))?;
        let Some(entry_path) = entry.enclosed_name() else { continue };
        let out_path = dest.join(entry_path);
        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|e| Error::Cache { path: out_path.clone(), source: e })?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Cache { path: parent.to_path_buf(), source: e })?;
        }
        let mut out_file = std::fs::File::create(&out_path).map_err(|e| Error::Cache { path: out_path.clone(), source: e })?;
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf).map_err(|e| Error::Cache { path: out_path.clone(), source: e })?;
        std::io::Write::write_all(&mut out_file, &buf).map_err(|e| Error::Cache { path: out_path.clone(), source: e })?;
    }
    Ok(())
}
