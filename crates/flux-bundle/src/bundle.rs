// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! The `Bundle` type: owns exactly one archive, one loaded image, and one
//! activator, and drives them through the bundle state diagram. Every
//! method here assumes the caller has already serialized calls for this
//! bundle id onto a single thread, as the framework's event engine does;
//! the internal lock exists to make that guarantee cheap to verify, not to
//! allow concurrent transitions.

use crate::activator::{Activator, BundleActivator, BundleContext, NativeActivator};
use crate::error::Error;
use crate::state::BundleState;
use parking_lot::Mutex;
use std::ffi::c_void;

enum ActivatorSource {
    /// Resolve `bundleActivator_*` symbols from the manifest's
    /// `Bundle-Activator` path on first `resolve`.
    Native,
    /// Already-constructed activator, supplied by the caller instead of
    /// loaded from a shared object (statically linked or test bundles).
    Static(Box<dyn BundleActivator>),
}

struct Inner {
    state: BundleState,
    source: Option<ActivatorSource>,
    activator: Option<Activator>,
}

pub struct Bundle {
    id: i64,
    archive: flux_cache::BundleArchive,
    no_delete_images: bool,
    inner: Mutex<Inner>,
}

impl Bundle {
    /// `UNKNOWN -> INSTALLED (install)`. A `Bundle` value never
    /// observes `UNKNOWN` — construction from an already-created archive
    /// is the install step.
    pub fn install(archive: flux_cache::BundleArchive) -> Self {
        let id = archive.id();
        Self {
            id,
            archive,
            no_delete_images: false,
            inner: Mutex::new(Inner { state: BundleState::Installed, source: Some(ActivatorSource::Native), activator: None }),
        }
    }

    /// Registers a statically-linked activator instead of resolving one
    /// from the archive's `Bundle-Activator` manifest path. Must be called
    /// before the first `start`/`resolve`.
    pub fn install_with_static_activator(archive: flux_cache::BundleArchive, activator: Box<dyn BundleActivator>) -> Self {
        let id = archive.id();
        Self {
            id,
            archive,
            no_delete_images: false,
            inner: Mutex::new(Inner { state: BundleState::Installed, source: Some(ActivatorSource::Static(activator)), activator: None }),
        }
    }

    pub fn with_no_delete_images(mut self, no_delete: bool) -> Self {
        self.no_delete_images = no_delete;
        self
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn archive(&self) -> &flux_cache::BundleArchive {
        &self.archive
    }

    pub fn state(&self) -> BundleState {
        self.inner.lock().state
    }

    /// `INSTALLED -> RESOLVED (resolve)`. Loads the native image (or
    /// adopts the static activator) without calling any entry point.
    pub fn resolve(&self) -> Result<(), Error> {
        let mut guard = self.inner.lock();
        if !guard.state.can_resolve() {
            return Err(Error::InvalidTransition { id: self.id, from: guard.state, attempted: "resolve" });
        }

        let source = guard.source.take().expect("activator source present while Installed");
        let activator = match source {
            ActivatorSource::Static(a) => Activator::Static(a),
            ActivatorSource::Native => {
                let revision_root = self.archive.current_revision_root();
                let activator_path = self.read_manifest_activator()?;
                let handle = flux_loader::open(revision_root.join(&activator_path), self.no_delete_images)?;
                Activator::Native(NativeActivator::new(handle))
            }
        };

        guard.activator = Some(activator);
        guard.state = BundleState::Resolved;
        tracing::debug!(bundle = self.id, "bundle resolved");
        Ok(())
    }

    fn read_manifest_activator(&self) -> Result<String, Error> {
        let manifest_path = self.archive.current_revision_root().join("META-INF").join("MANIFEST.MF");
        let manifest = flux_cache::Manifest::parse_file(&manifest_path)?;
        manifest.activator.ok_or(Error::NoActivator)
    }

    /// Auto-resolves if `Installed`, then
    /// `RESOLVED -> STARTING -> ACTIVE` on success or
    /// `STARTING -> RESOLVED` (image kept, reused next start) on failure.
    pub fn start(&self, ctx: &BundleContext) -> Result<(), Error> {
        {
            let guard = self.inner.lock();
            if !guard.state.can_start() {
                return Err(Error::InvalidTransition { id: self.id, from: guard.state, attempted: "start" });
            }
        }
        if self.state() == BundleState::Installed {
            self.resolve()?;
        }

        let mut guard = self.inner.lock();
        guard.state = BundleState::Starting;
        let activator = guard.activator.as_mut().expect("activator present once resolved").as_dyn();

        let result = activator.create(ctx).and_then(|()| activator.start(ctx));
        match result {
            Ok(()) => {
                guard.state = BundleState::Active;
                tracing::info!(bundle = self.id, "bundle started");
                Ok(())
            }
            Err(message) => {
                guard.state = BundleState::Resolved;
                tracing::warn!(bundle = self.id, %message, "bundle activator failed, rolled back to RESOLVED");
                Err(Error::Activator { id: self.id, entry_point: "create/start", message })
            }
        }
    }

    /// `ACTIVE -> STOPPING -> RESOLVED`.
    pub fn stop(&self, ctx: &BundleContext) -> Result<(), Error> {
        let mut guard = self.inner.lock();
        if !guard.state.can_stop() {
            return Err(Error::InvalidTransition { id: self.id, from: guard.state, attempted: "stop" });
        }
        guard.state = BundleState::Stopping;
        let activator = guard.activator.as_mut().expect("activator present once active").as_dyn();

        let result = activator.stop(ctx).and_then(|()| activator.destroy(ctx));
        guard.state = BundleState::Resolved;
        match result {
            Ok(()) => {
                tracing::info!(bundle = self.id, "bundle stopped");
                Ok(())
            }
            Err(message) => {
                tracing::warn!(bundle = self.id, %message, "bundle activator failed during stop");
                Err(Error::Activator { id: self.id, entry_point: "stop/destroy", message })
            }
        }
    }

    /// Any non-`UNINSTALLED` state may transition directly to
    /// `UNINSTALLED`; an `ACTIVE` bundle is stopped first.
    pub fn uninstall(&self, ctx: &BundleContext) -> Result<(), Error> {
        if self.state() == BundleState::Active {
            self.stop(ctx)?;
        }

        let mut guard = self.inner.lock();
        if !guard.state.can_uninstall() {
            return Err(Error::InvalidTransition { id: self.id, from: guard.state, attempted: "uninstall" });
        }
        if let Some(activator) = guard.activator.take() {
            if let Some(handle) = activator.into_native_handle() {
                flux_loader::close(handle);
            }
        }
        guard.state = BundleState::Uninstalled;
        tracing::info!(bundle = self.id, "bundle uninstalled");
        Ok(())
    }
}

pub fn null_context() -> BundleContext {
    BundleContext(std::ptr::null_mut::<c_void>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activator::test_support::RecordingActivator;

    fn manifest_archive(dir: &std::path::Path, activator: Option<&str>) -> flux_cache::BundleArchive {
        let zip_path = dir.join("demo.zip");
        let file = std::fs::File::create(&zip_path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default();
        zip.start_file("META-INF/MANIFEST.MF", options).unwrap();
        use std::io::Write;
        let mut manifest = "Bundle-SymbolicName: demo\nBundle-Version: 1.0.0\n".to_string();
        if let Some(a) = activator {
            manifest.push_str(&format!("Bundle-Activator: {a}\n"));
        }
        zip.write_all(manifest.as_bytes()).unwrap();
        zip.finish().unwrap();

        let cache = flux_cache::BundleCache::create(flux_cache::CacheConfig { cache_dir: dir.join("cache"), delete_on_destroy: false, always_update: false }).unwrap();
        cache.create_archive(1, zip_path.to_str().unwrap()).unwrap()
    }

    #[test]
    fn static_activator_runs_create_then_start_on_start() {
        let dir = tempfile::tempdir().unwrap();
        let archive = manifest_archive(dir.path(), None);
        let bundle = Bundle::install_with_static_activator(archive, Box::new(RecordingActivator::default()));
        let ctx = null_context();
        bundle.start(&ctx).unwrap();
        assert_eq!(bundle.state(), BundleState::Active);
    }

    #[test]
    fn failed_create_rolls_back_to_resolved_without_unloading() {
        let dir = tempfile::tempdir().unwrap();
        let archive = manifest_archive(dir.path(), None);
        let activator = RecordingActivator { fail_on: Some("create"), ..Default::default() };
        let bundle = Bundle::install_with_static_activator(archive, Box::new(activator));
        let ctx = null_context();
        assert!(bundle.start(&ctx).is_err());
        assert_eq!(bundle.state(), BundleState::Resolved);
    }

    #[test]
    fn stop_then_start_again_reuses_same_activator_state_machine() {
        let dir = tempfile::tempdir().unwrap();
        let archive = manifest_archive(dir.path(), None);
        let bundle = Bundle::install_with_static_activator(archive, Box::new(RecordingActivator::default()));
        let ctx = null_context();
        bundle.start(&ctx).unwrap();
        bundle.stop(&ctx).unwrap();
        assert_eq!(bundle.state(), BundleState::Resolved);
        bundle.uninstall(&ctx).unwrap();
        assert_eq!(bundle.state(), BundleState::Uninstalled);
    }

    #[test]
    fn stop_without_start_is_an_invalid_transition() {
        let dir = tempfile::tempdir().unwrap();
        let archive = manifest_archive(dir.path(), None);
        let bundle = Bundle::install_with_static_activator(archive, Box::new(RecordingActivator::default()));
        let ctx = null_context();
        assert!(matches!(bundle.stop(&ctx), Err(Error::InvalidTransition { .. })));
    }

    #[test]
    fn uninstall_from_active_passes_through_stopping() {
        let dir = tempfile::tempdir().unwrap();
        let archive = manifest_archive(dir.path(), None);
        let bundle = Bundle::install_with_static_activator(archive, Box::new(RecordingActivator::default()));
        let ctx = null_context();
        bundle.start(&ctx).unwrap();
        bundle.uninstall(&ctx).unwrap();
        assert_eq!(bundle.state(), BundleState::Uninstalled);
    }
}
