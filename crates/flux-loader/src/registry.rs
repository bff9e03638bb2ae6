// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Process-wide pathname-to-handle lookup. The only static mutable state
//! the loader keeps — lazily initialized on first open, torn down once the
//! last bundle image is closed.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

static LOOKUP: OnceLock<Mutex<HashMap<String, Arc<libloading::Library>>>> = OnceLock::new();

fn table() -> &'static Mutex<HashMap<String, Arc<libloading::Library>>> {
    LOOKUP.get_or_init(|| Mutex::new(HashMap::new()))
}

pub(crate) fn register(key: String, library: Arc<libloading::Library>) {
    table().lock().insert(key, library);
}

pub(crate) fn unregister(key: &str) {
    let mut guard = table().lock();
    guard.remove(key);
}

pub(crate) fn find(key: &str) -> Option<Arc<libloading::Library>> {
    table().lock().get(key).cloned()
}
