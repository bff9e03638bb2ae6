// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! The ranked service registry itself. A single lock guards the index;
//! every tracker/hook callback is invoked after the lock is released.

use crate::entry::{reject_reserved, Instance, ServiceEntry, SharedInstance, OBJECT_CLASS, SERVICE_BUNDLE_ID, SERVICE_ID, SERVICE_RANKING};
use crate::error::Error;
use crate::factory::{FactoryInstances, ServiceFactory};
use crate::hooks::{apply_hooks, FindHook, RegisteredHook};
use crate::tracker::{Tracker, TrackerCallbacks, TrackerHandle};
use flux_filter::Filter;
use flux_properties::Properties;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct State {
    next_service_id: i64,
    next_tracker_id: i64,
    next_hook_id: i64,
    entries: HashMap<i64, ServiceEntry>,
    trackers: HashMap<i64, Tracker>,
    hooks: Vec<RegisteredHook>,
    factories: FactoryInstances,
}

/// A single `Registry` instance is normally owned by one framework; it has
/// no notion of "the" framework and can be used standalone in tests.
pub struct Registry {
    state: Mutex<State>,
    changed: Condvar,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Queued callback invocations collected while holding the lock, run after
/// it's released.
#[derive(Default)]
struct Notifications {
    adds: Vec<(i64, ServiceEntry)>,
    removes: Vec<(i64, ServiceEntry)>,
    modifies: Vec<(i64, ServiceEntry)>,
    updates: Vec<(i64, Vec<ServiceEntry>)>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_service_id: 1,
                next_tracker_id: 1,
                next_hook_id: 1,
                entries: HashMap::new(),
                trackers: HashMap::new(),
                hooks: Vec::new(),
                factories: FactoryInstances::default(),
            }),
            changed: Condvar::new(),
        }
    }

    /// Publishes a service. Copies `properties`, stamping in the registry-owned
    /// keys; rejects a caller attempt to set `objectClass`/`service.id`/
    /// `service.bundleid` directly.
    pub fn register(&self, interface: &str, bundle_id: i64, instance: SharedInstance, properties: Properties) -> Result<i64, Error> {
        self.register_internal(interface, bundle_id, Instance::Direct(instance), properties)
    }

    /// Publishes a service backed by a factory. Each consumer gets
    /// `factory.create(consumerBundle)`; see [`ServiceFactory`].
    pub fn register_factory(&self, interface: &str, bundle_id: i64, factory: Arc<dyn ServiceFactory>, properties: Properties) -> Result<i64, Error> {
        self.register_internal(interface, bundle_id, Instance::Factory(factory), properties)
    }

    fn register_internal(&self, interface: &str, bundle_id: i64, instance: Instance, mut properties: Properties) -> Result<i64, Error> {
        reject_reserved(&properties)?;
        if !properties.contains_key(SERVICE_RANKING) {
            properties.set(SERVICE_RANKING, 0i64);
        }

        let mut notifications = Notifications::default();
        let id;
        {
            let mut state = self.state.lock();
            id = state.next_service_id;
            state.next_service_id += 1;

            properties.set(OBJECT_CLASS, interface.to_string());
            properties.set(SERVICE_ID, id);
            properties.set(SERVICE_BUNDLE_ID, bundle_id);

            let entry = ServiceEntry { id, bundle_id, interface: interface.to_string(), properties, instance };
            state.entries.insert(id, entry.clone());

            for tracker in state.trackers.values_mut() {
                if tracker.matches(interface, &entry.properties) {
                    insert_ranked(&mut tracker.matching, &state.entries, id);
                    notifications.adds.push((tracker.id, entry.clone()));
                    notifications.updates.push((tracker.id, snapshot(&tracker.matching, &state.entries)));
                }
            }
        }
        self.changed.notify_all();
        self.dispatch(notifications);
        tracing::debug!(service = id, interface, bundle_id, "service registered");
        Ok(id)
    }

    /// Unpublishes a service. Removes the entry, notifies trackers, and cleans
    /// up any per-bundle factory instances still outstanding for it.
    pub fn unregister(&self, id: i64) -> Result<(), Error> {
        let mut notifications = Notifications::default();
        {
            let mut state = self.state.lock();
            let entry = state.entries.remove(&id).ok_or(Error::NotFound(id))?;

            for tracker in state.trackers.values_mut() {
                if let Some(pos) = tracker.matching.iter().position(|&x| x == id) {
                    tracker.matching.remove(pos);
                    notifications.removes.push((tracker.id, entry.clone()));
                    notifications.updates.push((tracker.id, snapshot(&tracker.matching, &state.entries)));
                }
            }

            for (bundle_id, instance) in state.factories.drop_service(id) {
                if let Instance::Factory(factory) = &entry.instance {
                    factory.bundle_specific_service_removed(bundle_id, &instance);
                }
            }
        }
        self.dispatch(notifications);
        tracing::debug!(service = id, "service unregistered");
        Ok(())
    }

    /// Replaces a registered service's properties in place, re-evaluating
    /// every tracker's membership and ranking position against the new
    /// properties. A tracker that already matched and still matches gets
    /// `modified`; one whose match state flips gets `add`/`remove` instead.
    /// `service.ranking` is preserved from the existing entry unless the
    /// caller supplies a new value; `objectClass`/`service.id`/
    /// `service.bundleid` are re-stamped regardless of what's passed in.
    pub fn modify_properties(&self, id: i64, properties: Properties) -> Result<(), Error> {
        reject_reserved(&properties)?;
        let mut notifications = Notifications::default();
        {
            let mut state = self.state.lock();
            let (interface, bundle_id, instance, current_ranking) = {
                let entry = state.entries.get(&id).ok_or(Error::NotFound(id))?;
                (entry.interface.clone(), entry.bundle_id, entry.instance.clone(), entry.ranking())
            };

            let mut new_properties = properties;
            if !new_properties.contains_key(SERVICE_RANKING) {
                new_properties.set(SERVICE_RANKING, current_ranking);
            }
            new_properties.set(OBJECT_CLASS, interface.clone());
            new_properties.set(SERVICE_ID, id);
            new_properties.set(SERVICE_BUNDLE_ID, bundle_id);

            let updated_entry = ServiceEntry { id, bundle_id, interface: interface.clone(), properties: new_properties, instance };
            state.entries.insert(id, updated_entry.clone());

            for tracker in state.trackers.values_mut() {
                let was_matching = tracker.matching.contains(&id);
                let now_matching = tracker.matches(&interface, &updated_entry.properties);
                if was_matching {
                    tracker.matching.retain(|&x| x != id);
                }
                if now_matching {
                    insert_ranked(&mut tracker.matching, &state.entries, id);
                }
                match (was_matching, now_matching) {
                    (true, true) => notifications.modifies.push((tracker.id, updated_entry.clone())),
                    (false, true) => notifications.adds.push((tracker.id, updated_entry.clone())),
                    (true, false) => notifications.removes.push((tracker.id, updated_entry.clone())),
                    (false, false) => continue,
                }
                notifications.updates.push((tracker.id, snapshot(&tracker.matching, &state.entries)));
            }
        }
        self.dispatch(notifications);
        tracing::debug!(service = id, "service properties modified");
        Ok(())
    }

    /// Queries for matching services. Ranked order: ranking descending,
    /// `service.id` ascending, after any registered find-hooks prune the
    /// candidate set.
    pub fn find(&self, interface: &str, filter: Option<&Filter>) -> Vec<i64> {
        self.find_entries(interface, filter).into_iter().map(|e| e.id).collect()
    }

    pub fn find_first(&self, interface: &str, filter: Option<&Filter>) -> Option<i64> {
        self.find(interface, filter).into_iter().next()
    }

    fn find_entries(&self, interface: &str, filter: Option<&Filter>) -> Vec<ServiceEntry> {
        let state = self.state.lock();
        let mut matches: Vec<ServiceEntry> = state
            .entries
            .values()
            .filter(|e| e.interface == interface && filter.map(|f| f.matches(&e.properties)).unwrap_or(true))
            .cloned()
            .collect();
        matches.sort_by(crate::entry::ranked_order);
        apply_hooks(&state.hooks, interface, matches)
    }

    /// Opens a tracker. Delivers `add` (and `update`) for every currently
    /// matching service, in ranked order, before returning.
    pub fn track(&self, interface: &str, filter: Filter, callbacks: TrackerCallbacks) -> TrackerHandle {
        let initial = self.find_entries(interface, Some(&filter));
        let id;
        let tracker = {
            let mut state = self.state.lock();
            id = state.next_tracker_id;
            state.next_tracker_id += 1;
            let matching = initial.iter().map(|e| e.id).collect();
            Tracker { id, interface: interface.to_string(), filter, callbacks: Arc::new(callbacks), matching }
        };

        if let Some(on_add) = &tracker.callbacks.on_add {
            for entry in &initial {
                on_add(entry);
            }
        }
        if let Some(on_update) = &tracker.callbacks.on_update {
            on_update(&initial);
        }

        self.state.lock().trackers.insert(id, tracker);
        TrackerHandle { id }
    }

    /// Closes a tracker. Delivers a `remove` for every currently
    /// tracked service, then disconnects.
    pub fn close_tracker(&self, handle: TrackerHandle) {
        let (tracker, removed) = {
            let mut state = self.state.lock();
            let Some(tracker) = state.trackers.remove(&handle.id) else { return };
            let removed = tracker.matching.iter().filter_map(|id| state.entries.get(id).cloned()).collect::<Vec<_>>();
            (tracker, removed)
        };
        if let Some(on_remove) = &tracker.callbacks.on_remove {
            for entry in &removed {
                on_remove(entry);
            }
        }
    }

    /// Iterates the matching list in ranked order, up to
    /// `limit` (0 = all), holding a reference on each service for the
    /// duration of `callback`. Blocks up to `wait_for` if the match set is
    /// initially empty.
    pub fn use_services(
        &self,
        interface: &str,
        filter: Option<&Filter>,
        limit: usize,
        wait_for: Duration,
        consumer_bundle_id: i64,
        mut callback: impl FnMut(&ServiceEntry, &SharedInstance),
    ) -> Result<usize, Error> {
        let mut matches = self.find_entries(interface, filter);
        if matches.is_empty() && !wait_for.is_zero() {
            let deadline = Instant::now() + wait_for;
            let mut state = self.state.lock();
            loop {
                let has_match = state.entries.values().any(|e| e.interface == interface && filter.map(|f| f.matches(&e.properties)).unwrap_or(true));
                if has_match {
                    break;
                }
                let now = Instant::now();
                if now >= deadline {
                    return Err(Error::Timeout);
                }
                self.changed.wait_for(&mut state, deadline - now);
            }
            drop(state);
            matches = self.find_entries(interface, filter);
        }

        let iter = if limit == 0 { matches.len() } else { limit.min(matches.len()) };
        let mut invocations = 0;
        for entry in matches.iter().take(iter) {
            let instance = self.acquire_instance(entry, consumer_bundle_id);
            callback(entry, &instance);
            self.release_instance(entry, consumer_bundle_id);
            invocations += 1;
        }
        Ok(invocations)
    }

    fn acquire_instance(&self, entry: &ServiceEntry, consumer_bundle_id: i64) -> SharedInstance {
        match &entry.instance {
            Instance::Direct(instance) => instance.clone(),
            Instance::Factory(factory) => {
                let mut state = self.state.lock();
                state.factories.acquire(entry.id, consumer_bundle_id, factory.as_ref())
            }
        }
    }

    fn release_instance(&self, entry: &ServiceEntry, consumer_bundle_id: i64) {
        if let Instance::Factory(factory) = &entry.instance {
            let released = {
                let mut state = self.state.lock();
                state.factories.release(entry.id, consumer_bundle_id)
            };
            if let Some(instance) = released {
                factory.bundle_specific_service_removed(consumer_bundle_id, &instance);
            }
        }
    }

    /// Registers a find-hook against `interface`;
    /// invocation order among hooks on the same interface is by `ranking`.
    pub fn register_find_hook(&self, interface: &str, ranking: i64, hook: Arc<dyn FindHook>) -> i64 {
        let mut state = self.state.lock();
        let id = state.next_hook_id;
        state.next_hook_id += 1;
        state.hooks.push(RegisteredHook { id, interface: interface.to_string(), ranking, hook });
        id
    }

    pub fn unregister_find_hook(&self, id: i64) {
        let mut state = self.state.lock();
        state.hooks.retain(|h| h.id != id);
    }

    /// Resolves each referenced tracker's callbacks under the lock, then
    /// drops it before invoking anything — a caller callback must never run
    /// with the registry lock held.
    fn dispatch(&self, notifications: Notifications) {
        let mut needed = std::collections::HashSet::new();
        for (id, _) in &notifications.adds {
            needed.insert(*id);
        }
        for (id, _) in &notifications.removes {
            needed.insert(*id);
        }
        for (id, _) in &notifications.modifies {
            needed.insert(*id);
        }
        for (id, _) in &notifications.updates {
            needed.insert(*id);
        }

        let callbacks: HashMap<i64, Arc<TrackerCallbacks>> = {
            let state = self.state.lock();
            needed.into_iter().filter_map(|id| state.trackers.get(&id).map(|t| (id, t.callbacks.clone()))).collect()
        };

        for (tracker_id, entry) in &notifications.adds {
            if let Some(cb) = callbacks.get(tracker_id) {
                if let Some(on_add) = &cb.on_add {
                    on_add(entry);
                }
            }
        }
        for (tracker_id, entry) in &notifications.removes {
            if let Some(cb) = callbacks.get(tracker_id) {
                if let Some(on_remove) = &cb.on_remove {
                    on_remove(entry);
                }
            }
        }
        for (tracker_id, entry) in &notifications.modifies {
            if let Some(cb) = callbacks.get(tracker_id) {
                if let Some(on_modified) = &cb.on_modified {
                    on_modified(entry);
                }
            }
        }
        for (tracker_id, entries) in &notifications.updates {
            if let Some(cb) = callbacks.get(tracker_id) {
                if let Some(on_update) = &cb.on_update {
                    on_update(entries);
                }
            }
        }
    }
}

fn insert_ranked(matching: &mut Vec<i64>, entries: &HashMap<i64, ServiceEntry>, id: i64) {
    let pos = matching
        .iter()
        .position(|other| {
            let other_entry = &entries[other];
            let new_entry = &entries[&id];
            crate::entry::ranked_order(new_entry, other_entry) == std::cmp::Ordering::Less
        })
        .unwrap_or(matching.len());
    matching.insert(pos, id);
}

fn snapshot(matching: &[i64], entries: &HashMap<i64, ServiceEntry>) -> Vec<ServiceEntry> {
    matching.iter().filter_map(|id| entries.get(id).cloned()).collect()
}
