// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! `FrameworkCore`: owns the cache, registry, event engine and readiness
//! subsystem, and sequences bundle lifecycle across them.

use crate::config::FrameworkConfig;
use crate::error::Error;
use flux_bundle::{null_context, Bundle, BundleContext, BundleState};
use flux_cache::{BundleCache, CacheConfig};
use flux_readiness::ReadinessSubsystem;
use flux_registry::{Registry, SharedInstance};
use flux_scheduler::Engine;
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

const FRAMEWORK_READY_CONDITION: &str = "framework.ready";

struct BundleSlot {
    bundle: Bundle,
}

/// Owns and sequences the cache, registry, event engine and readiness
/// subsystem for one framework instance. Construction and teardown follow
/// symmetric `create`/`destroy` steps.
pub struct FrameworkCore {
    config: FrameworkConfig,
    cache: BundleCache,
    registry: Arc<Registry>,
    engine: Mutex<Option<Engine>>,
    readiness: Arc<ReadinessSubsystem>,
    bundles: Mutex<HashMap<i64, BundleSlot>>,
    next_bundle_id: AtomicI64,
    /// `install` after `uninstall` with identical cache
    /// state (the on-disk archive for that location untouched) must yield
    /// the same bundle id. Survives `uninstall_bundle` removing the entry
    /// from `bundles`, since archives aren't deleted off disk until the
    /// whole cache is (framework destroy with `delete_on_destroy`).
    location_to_id: Mutex<HashMap<String, i64>>,
    shutting_down: AtomicBool,
    all_bundles_resolved_once: Arc<AtomicBool>,
}

impl FrameworkCore {
    /// Builds the cache, registry and event engine, then installs and
    /// starts the system bundle before publishing `framework.ready`.
    pub fn create(config: FrameworkConfig) -> Result<Arc<Self>, Error> {
        let cache_config = CacheConfig::from_properties(&config.cache_properties(), &config.framework_uuid);
        let cache = BundleCache::create(cache_config)?;
        let registry = Arc::new(Registry::new());
        let engine = Engine::start(config.scheduled_event_resolution);

        let system_archive = cache.create_system_archive()?;
        let system_bundle = Bundle::install(system_archive).with_no_delete_images(config.bundles_load_with_nodelete);

        let all_bundles_resolved_once = Arc::new(AtomicBool::new(false));
        let framework = Arc::new(Self {
            config,
            cache,
            registry: registry.clone(),
            engine: Mutex::new(Some(engine)),
            readiness: Arc::new(ReadinessSubsystem::new(registry, flux_cache::SYSTEM_BUNDLE_ID)),
            bundles: Mutex::new(HashMap::new()),
            next_bundle_id: AtomicI64::new(flux_cache::SYSTEM_BUNDLE_ID + 1),
            location_to_id: Mutex::new(HashMap::new()),
            shutting_down: AtomicBool::new(false),
            all_bundles_resolved_once: all_bundles_resolved_once.clone(),
        });

        framework.bundles.lock().insert(flux_cache::SYSTEM_BUNDLE_ID, BundleSlot { bundle: system_bundle });
        framework.start_bundle(flux_cache::SYSTEM_BUNDLE_ID)?;
        all_bundles_resolved_once.store(true, Ordering::SeqCst);

        // Publish `framework.ready` once the system bundle is up. The
        // predicate stays true afterwards — framework.ready never flips
        // back off once all bundles have resolved at least once.
        framework.readiness.register_condition(FRAMEWORK_READY_CONDITION, move || all_bundles_resolved_once.load(Ordering::SeqCst));

        tracing::info!(uuid = %framework.config.framework_uuid, "framework created");
        Ok(framework)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Access to the event engine. Panics if called after [`Self::destroy`]
    /// has already torn it down — the framework instance is unusable past
    /// that point regardless.
    pub fn scheduler(&self) -> MappedMutexGuard<'_, Engine> {
        MutexGuard::map(self.engine.lock(), |opt| opt.as_mut().expect("scheduler used after framework destroy"))
    }

    pub fn readiness(&self) -> &Arc<ReadinessSubsystem> {
        &self.readiness
    }

    pub fn config(&self) -> &FrameworkConfig {
        &self.config
    }

    /// Extracts (or reuses) the archive and registers a
    /// not-yet-resolved `Bundle`.
    pub fn install(&self, location: &str) -> Result<i64, Error> {
        self.install_with_activator(location, None)
    }

    /// Installs with a statically-linked activator instead of resolving
    /// one from the bundle's `Bundle-Activator` manifest path — the path
    /// test bundles and bundles linked directly into the host process use.
    pub fn install_with_activator(&self, location: &str, activator: Option<Box<dyn flux_bundle::BundleActivator>>) -> Result<i64, Error> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        let id = {
            let mut location_to_id = self.location_to_id.lock();
            match location_to_id.get(location) {
                Some(&existing) => existing,
                None => {
                    let id = self.next_bundle_id.fetch_add(1, Ordering::SeqCst);
                    location_to_id.insert(location.to_string(), id);
                    id
                }
            }
        };
        let archive = self.cache.create_archive(id, location)?;
        let bundle = match activator {
            Some(a) => Bundle::install_with_static_activator(archive, a),
            None => Bundle::install(archive),
        }
        .with_no_delete_images(self.config.bundles_load_with_nodelete);

        self.bundles.lock().insert(id, BundleSlot { bundle });
        tracing::info!(bundle = id, location, "bundle installed");
        Ok(id)
    }

    pub fn start_bundle(&self, id: i64) -> Result<(), Error> {
        let ctx = self.context_for(id);
        self.with_bundle(id, |bundle| bundle.start(&ctx))
    }

    pub fn stop_bundle(&self, id: i64) -> Result<(), Error> {
        let ctx = self.context_for(id);
        self.with_bundle(id, |bundle| bundle.stop(&ctx))
    }

    pub fn uninstall_bundle(&self, id: i64) -> Result<(), Error> {
        let ctx = self.context_for(id);
        self.with_bundle(id, |bundle| bundle.uninstall(&ctx))?;
        self.bundles.lock().remove(&id);
        Ok(())
    }

    pub fn bundle_state(&self, id: i64) -> Result<BundleState, Error> {
        let bundles = self.bundles.lock();
        let slot = bundles.get(&id).ok_or(Error::BundleNotFound(id))?;
        Ok(slot.bundle.state())
    }

    /// The current revision's manifest mtime for a still-installed bundle
    /// — used by callers checking cache-reuse behavior.
    pub fn bundle_last_modified(&self, id: i64) -> Result<std::time::SystemTime, Error> {
        let bundles = self.bundles.lock();
        let slot = bundles.get(&id).ok_or(Error::BundleNotFound(id))?;
        Ok(slot.bundle.archive().last_modified()?)
    }

    pub fn bundle_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.bundles.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn with_bundle(&self, id: i64, f: impl FnOnce(&Bundle) -> Result<(), flux_bundle::Error>) -> Result<(), Error> {
        let bundles = self.bundles.lock();
        let slot = bundles.get(&id).ok_or(Error::BundleNotFound(id))?;
        Ok(f(&slot.bundle)?)
    }

    /// An explicit context argument, not thread-local discovery. Each
    /// bundle's context carries no payload beyond identifying the call for
    /// now — activators reach the registry through services they
    /// register/look up via `flux_registry`, not through this pointer. It
    /// exists so the activator contract's signature stays uniform.
    fn context_for(&self, _bundle_id: i64) -> BundleContext {
        null_context()
    }

    /// Stops non-system bundles descending id, then the
    /// system bundle, drains the event engine, destroys the registry
    /// (dropped with `self`), destroys the cache if `delete_on_destroy`.
    pub fn destroy(&self) -> Result<(), Error> {
        self.shutting_down.store(true, Ordering::SeqCst);

        let mut ids = self.bundle_ids();
        ids.retain(|&id| id != flux_cache::SYSTEM_BUNDLE_ID);
        ids.sort_unstable_by(|a, b| b.cmp(a));
        for id in ids {
            if self.bundle_state(id).ok() == Some(BundleState::Active) {
                if let Err(err) = self.stop_bundle(id) {
                    tracing::warn!(bundle = id, %err, "error stopping bundle during shutdown");
                }
            }
        }

        if self.bundle_state(flux_cache::SYSTEM_BUNDLE_ID).ok() == Some(BundleState::Active) {
            self.stop_bundle(flux_cache::SYSTEM_BUNDLE_ID)?;
        }

        if let Some(engine) = self.engine.lock().take() {
            engine.stop();
        }

        if self.cache.delete_on_destroy() {
            self.cache.delete()?;
        }

        tracing::info!(uuid = %self.config.framework_uuid, "framework destroyed");
        Ok(())
    }

    /// A trivial shared instance for bundles that want to publish a
    /// service carrying no payload beyond its properties.
    pub fn unit_instance() -> SharedInstance {
        Arc::new(())
    }
}
