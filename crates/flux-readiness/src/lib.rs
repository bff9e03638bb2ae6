// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Derived readiness conditions. A small subsystem that publishes a
//! `celix_condition` service with `condition.id=<name>` while a predicate
//! holds, and withdraws it the moment the predicate stops holding.
//! Consumers see these like any other service — find, track or use them
//! against `celix_condition` filtered by `condition.id`.

use flux_properties::Properties;
use flux_registry::{Registry, TrackerCallbacks};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// The interface name every readiness condition is published under.
pub const CONDITION_INTERFACE: &str = "celix_condition";
/// The property carrying the condition's name, e.g. `framework.ready`.
pub const CONDITION_ID: &str = "condition.id";

struct Condition {
    name: String,
    predicate: Box<dyn Fn() -> bool + Send + Sync>,
}

struct Inner {
    conditions: Vec<Condition>,
    published: HashMap<String, i64>,
}

/// Owns the set of named predicates and keeps their published service
/// entries in sync with the predicates' current value.
pub struct ReadinessSubsystem {
    registry: Arc<Registry>,
    owner_bundle_id: i64,
    inner: Mutex<Inner>,
}

impl ReadinessSubsystem {
    pub fn new(registry: Arc<Registry>, owner_bundle_id: i64) -> Self {
        Self { registry, owner_bundle_id, inner: Mutex::new(Inner { conditions: Vec::new(), published: HashMap::new() }) }
    }

    /// Registers a named predicate and immediately evaluates it. Examples:
    /// `framework.ready` ("all bundles resolved at least once"),
    /// `pubsub.psa.ready` ("every declared publisher/subscriber has at
    /// least one matching admin").
    pub fn register_condition(&self, name: impl Into<String>, predicate: impl Fn() -> bool + Send + Sync + 'static) {
        let name = name.into();
        self.inner.lock().conditions.push(Condition { name, predicate: Box::new(predicate) });
        self.recompute();
    }

    /// Sets up a registry tracker on `interface` that calls [`Self::recompute`]
    /// on every add/remove/modify: watches the registry via trackers and
    /// recomputes on changes. Requires the subsystem to be
    /// shared via `Arc` so the tracker callbacks can recompute on it.
    pub fn watch(self: &Arc<Self>, interface: &str) -> flux_registry::TrackerHandle {
        let this_add = self.clone();
        let this_remove = self.clone();
        let this_modified = self.clone();
        self.registry.track(
            interface,
            flux_filter::Filter::parse("").expect("empty filter always parses"),
            TrackerCallbacks {
                on_add: Some(Box::new(move |_| this_add.recompute())),
                on_remove: Some(Box::new(move |_| this_remove.recompute())),
                on_modified: Some(Box::new(move |_| this_modified.recompute())),
                on_update: None,
            },
        )
    }

    /// Re-evaluates every registered predicate and publishes/withdraws its
    /// condition service accordingly.
    pub fn recompute(&self) {
        let to_publish;
        let to_withdraw;
        {
            let mut inner = self.inner.lock();
            let mut publish = Vec::new();
            let mut withdraw = Vec::new();
            for condition in &inner.conditions {
                let holds = (condition.predicate)();
                let already_published = inner.published.contains_key(&condition.name);
                if holds && !already_published {
                    publish.push(condition.name.clone());
                } else if !holds && already_published {
                    withdraw.push(condition.name.clone());
                }
            }
            for name in &withdraw {
                inner.published.remove(name);
            }
            to_publish = publish;
            to_withdraw = withdraw;
        }

        for name in to_withdraw {
            if let Some(id) = self.withdraw_id(&name) {
                let _ = self.registry.unregister(id);
                tracing::debug!(condition = %name, "readiness condition withdrawn");
            }
        }
        for name in to_publish {
            let mut props = Properties::new();
            props.set(CONDITION_ID, name.clone());
            match self.registry.register(CONDITION_INTERFACE, self.owner_bundle_id, Arc::new(()), props) {
                Ok(id) => {
                    self.inner.lock().published.insert(name.clone(), id);
                    tracing::info!(condition = %name, "readiness condition published");
                }
                Err(err) => tracing::error!(condition = %name, %err, "failed to publish readiness condition"),
            }
        }
    }

    fn withdraw_id(&self, name: &str) -> Option<i64> {
        // already removed from `published` synchronously in recompute();
        // re-derive the id from the registry instead, since the map entry
        // is gone by the time this runs.
        let filter = flux_filter::Filter::parse(&format!("({CONDITION_ID}={name})")).ok()?;
        self.registry.find_first(CONDITION_INTERFACE, Some(&filter))
    }

    pub fn is_ready(&self, name: &str) -> bool {
        self.inner.lock().published.contains_key(name)
    }
}
