// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-bundle factory services — at most one live instance per consuming
//! bundle, created on first use and released when the last reference from
//! that bundle drops.

use crate::entry::SharedInstance;
use std::collections::HashMap;

/// Produces a possibly consumer-specific instance for a factory-backed
/// service.
pub trait ServiceFactory: Send + Sync {
    fn create(&self, consumer_bundle_id: i64) -> SharedInstance;

    /// Called exactly once per successful `create`, when the last
    /// reference from `consumer_bundle_id` is released.
    fn bundle_specific_service_removed(&self, consumer_bundle_id: i64, instance: &SharedInstance);
}

struct FactoryInstance {
    instance: SharedInstance,
    refcount: usize,
}

/// Tracks, per service id, the live per-bundle instances created from a
/// [`ServiceFactory`]. Owned by the registry's index so it's guarded by the
/// same lock as everything else.
#[derive(Default)]
pub(crate) struct FactoryInstances {
    by_service_and_bundle: HashMap<(i64, i64), FactoryInstance>,
}

impl FactoryInstances {
    pub(crate) fn acquire(&mut self, service_id: i64, bundle_id: i64, factory: &dyn ServiceFactory) -> SharedInstance {
        let slot = self
            .by_service_and_bundle
            .entry((service_id, bundle_id))
            .or_insert_with(|| FactoryInstance { instance: factory.create(bundle_id), refcount: 0 });
        slot.refcount += 1;
        slot.instance.clone()
    }

    /// Returns the released instance the first time a bundle's refcount
    /// hits zero, so the caller can invoke `bundle_specific_service_removed`
    /// exactly once; subsequent releases of the same bundle are no-ops
    /// until the next `acquire`.
    pub(crate) fn release(&mut self, service_id: i64, bundle_id: i64) -> Option<SharedInstance> {
        let key = (service_id, bundle_id);
        let done = match self.by_service_and_bundle.get_mut(&key) {
            Some(slot) if slot.refcount > 0 => {
                slot.refcount -= 1;
                slot.refcount == 0
            }
            _ => false,
        };
        if done {
            self.by_service_and_bundle.remove(&key).map(|slot| slot.instance)
        } else {
            None
        }
    }

    pub(crate) fn drop_service(&mut self, service_id: i64) -> Vec<(i64, SharedInstance)> {
        let mut removed = Vec::new();
        self.by_service_and_bundle.retain(|&(sid, bundle_id), slot| {
            if sid == service_id {
                removed.push((bundle_id, slot.instance.clone()));
                false
            } else {
                true
            }
        });
        removed
    }
}
