// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! A single bundle's persistent on-disk workspace: state properties, the
//! bundle-private `store/` directory, and one revision directory per
//! extraction of the bundle zip.

use crate::error::Error;
use crate::manifest::Manifest;
use flux_properties::Properties;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const STORE_DIR_NAME: &str = "store";
const STATE_PROPERTIES_FILE_NAME: &str = "bundle_state.properties";

/// One immutable extraction of a bundle zip. A new revision is produced
/// only by an explicit [`super::BundleArchive::revise`] call.
#[derive(Debug, Clone)]
pub struct Revision {
    pub number: u32,
    pub root: PathBuf,
    pub source_location: String,
    pub manifest: Manifest,
}

impl Revision {
    fn manifest_path(&self) -> PathBuf {
        self.root.join("META-INF").join("MANIFEST.MF")
    }

    pub fn last_modified(&self) -> Result<SystemTime, Error> {
        let path = self.manifest_path();
        std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .map_err(|e| Error::Cache { path, source: e })
    }
}

/// Persistent on-disk workspace for one installed bundle, rooted at
/// `<cacheDir>/bundle<id>/`.
pub struct BundleArchive {
    id: i64,
    root: PathBuf,
    store_root: PathBuf,
    state_properties_path: PathBuf,
    inner: Mutex<ArchiveState>,
}

struct ArchiveState {
    location: String,
    revisions: Vec<Revision>,
}

impl BundleArchive {
    pub(crate) fn new(id: i64, root: PathBuf, location: String, revision: Revision) -> Self {
        let store_root = root.join(STORE_DIR_NAME);
        let state_properties_path = root.join(STATE_PROPERTIES_FILE_NAME);
        Self {
            id,
            root,
            store_root,
            state_properties_path,
            inner: Mutex::new(ArchiveState { location, revisions: vec![revision] }),
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_root
    }

    pub fn location(&self) -> String {
        self.inner.lock().location.clone()
    }

    /// The current (highest) revision; only revision present until
    /// [`Self::revise`] is implemented.
    pub fn current_revision(&self) -> Revision {
        let guard = self.inner.lock();
        guard.revisions.last().cloned().expect("archive always has at least one revision")
    }

    pub fn current_revision_root(&self) -> PathBuf {
        self.current_revision().root
    }

    pub fn symbolic_name(&self) -> String {
        self.current_revision().manifest.symbolic_name
    }

    pub fn version(&self) -> flux_properties::Version {
        self.current_revision().manifest.version
    }

    /// The current revision's manifest mtime; callers use this to detect
    /// re-extraction.
    pub fn last_modified(&self) -> Result<SystemTime, Error> {
        self.current_revision().last_modified()
    }

    /// Creates a new revision directory and extracts the new content,
    /// keeping the prior revision until the next stop/garbage-collect.
    /// Stubbed as unsupported, as upstream does — failing cleanly here
    /// beats corrupting the archive.
    pub fn revise(&self, _new_location: &str) -> Result<(), Error> {
        Err(Error::ReviseNotSupported)
    }

    pub fn state_properties(&self) -> Properties {
        let guard = self.inner.lock();
        let revision = guard.revisions.last().expect("archive always has at least one revision");
        build_state_properties(self.id, &guard.location, revision)
    }

    pub fn persist_state_properties(&self) -> Result<(), Error> {
        let props = self.state_properties();
        props
            .store_to_file(&self.state_properties_path)
            .map_err(|e| Error::Cache { path: self.state_properties_path.clone(), source: e })
    }
}

fn build_state_properties(id: i64, location: &str, revision: &Revision) -> Properties {
    let mut props = Properties::new();
    props.set("bundle.id", id);
    props.set("bundle.location", location);
    props.set("bundle.symbolicName", revision.manifest.symbolic_name.clone());
    props.set("bundle.version", revision.manifest.version.to_string());
    props.set("bundle.revision", revision.number as i64);
    props
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;

    fn manifest() -> Manifest {
        Manifest::parse_str("Bundle-SymbolicName: demo\nBundle-Version: 1.0.0\n").unwrap()
    }

    #[test]
    fn state_properties_reflect_current_revision() {
        let revision = Revision { number: 1, root: PathBuf::from("/tmp/x/version0.1"), source_location: "a.zip".into(), manifest: manifest() };
        let archive = BundleArchive::new(3, PathBuf::from("/tmp/x"), "a.zip".into(), revision);
        let props = archive.state_properties();
        assert_eq!(props.get_as_long("bundle.id", -1), 3);
        assert_eq!(props.get_string("bundle.symbolicName", ""), "demo");
        assert_eq!(props.get_as_long("bundle.revision", -1), 1);
    }

    #[test]
    fn revise_is_unsupported() {
        let revision = Revision { number: 1, root: PathBuf::from("/tmp/x/version0.1"), source_location: "a.zip".into(), manifest: manifest() };
        let archive = BundleArchive::new(3, PathBuf::from("/tmp/x"), "a.zip".into(), revision);
        assert!(matches!(archive.revise("b.zip"), Err(Error::ReviseNotSupported)));
    }
}
