// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Hidden-services hook — a find-hook may prune (never extend) the
//! candidate list the registry resolves for an interface, invoked in
//! ranking order.

use crate::entry::ServiceEntry;

pub trait FindHook: Send + Sync {
    /// Removes entries the hook wants hidden from `candidates`. Adding
    /// entries is not supported; the registry ignores list growth.
    fn filter(&self, interface: &str, candidates: &mut Vec<ServiceEntry>);
}

pub(crate) struct RegisteredHook {
    pub(crate) id: i64,
    pub(crate) interface: String,
    pub(crate) ranking: i64,
    pub(crate) hook: std::sync::Arc<dyn FindHook>,
}

pub(crate) fn apply_hooks(hooks: &[RegisteredHook], interface: &str, mut candidates: Vec<ServiceEntry>) -> Vec<ServiceEntry> {
    let mut ordered: Vec<&RegisteredHook> = hooks.iter().filter(|h| h.interface == interface).collect();
    ordered.sort_by(|a, b| b.ranking.cmp(&a.ranking).then(a.id.cmp(&b.id)));
    for registered in ordered {
        let before = candidates.len();
        registered.hook.filter(interface, &mut candidates);
        if candidates.len() > before {
            tracing::warn!(interface, hook = registered.id, "find-hook attempted to grow candidate list; ignoring added entries");
            candidates.truncate(before);
        }
    }
    candidates
}
