// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Trackers: service-change notification and the ranked-set "update" callback.

use crate::entry::ServiceEntry;
use flux_filter::Filter;
use std::sync::Arc;

/// Callbacks a tracker may supply. All are invoked synchronously by the
/// registry, outside its internal lock, in arrival order for a given
/// tracker.
pub struct TrackerCallbacks {
    pub on_add: Option<Box<dyn Fn(&ServiceEntry) + Send + Sync>>,
    pub on_remove: Option<Box<dyn Fn(&ServiceEntry) + Send + Sync>>,
    pub on_modified: Option<Box<dyn Fn(&ServiceEntry) + Send + Sync>>,
    /// Invoked after add/remove/modified with the full current matching
    /// set in ranked order, for consumers that want snapshots instead of
    /// deltas.
    pub on_update: Option<Box<dyn Fn(&[ServiceEntry]) + Send + Sync>>,
}

impl Default for TrackerCallbacks {
    fn default() -> Self {
        Self { on_add: None, on_remove: None, on_modified: None, on_update: None }
    }
}

pub(crate) struct Tracker {
    pub(crate) id: i64,
    pub(crate) interface: String,
    pub(crate) filter: Filter,
    /// Wrapped in `Arc` so [`crate::Registry::dispatch`] can clone a
    /// reference to invoke outside the state lock instead of holding it
    /// across arbitrary caller callback code.
    pub(crate) callbacks: Arc<TrackerCallbacks>,
    /// Ids currently matched, in ranked order.
    pub(crate) matching: Vec<i64>,
}

impl Tracker {
    pub(crate) fn matches(&self, interface: &str, properties: &flux_properties::Properties) -> bool {
        self.interface == interface && self.filter.matches(properties)
    }
}

/// Handle returned by [`crate::Registry::track`]. Dropping it does not
/// close the tracker — call [`TrackerHandle::close`] explicitly, since
/// closing delivers a `remove` for every currently-tracked service before
/// disconnecting.
pub struct TrackerHandle {
    pub(crate) id: i64,
}

impl TrackerHandle {
    pub fn id(&self) -> i64 {
        self.id
    }
}
