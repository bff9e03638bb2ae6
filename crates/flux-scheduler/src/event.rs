// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! A scheduled event's bookkeeping, mirroring
//! `celix_scheduled_event.h`'s use-count/call-count/wake-up fields.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default bound on [`crate::Engine::cancel`], matching
/// `CELIX_SCHEDULED_EVENT_TIMEOUT_WAIT_FOR_PROCESSING_IN_SECONDS`.
pub const DEFAULT_CANCEL_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared, lock-protected call counter a waiter can block on without
/// touching the engine's main state lock.
#[derive(Clone)]
pub(crate) struct CallCounter(pub(crate) Arc<(Mutex<u64>, Condvar)>);

impl CallCounter {
    pub(crate) fn new() -> Self {
        Self(Arc::new((Mutex::new(0), Condvar::new())))
    }

    pub(crate) fn get(&self) -> u64 {
        *self.0 .0.lock()
    }

    pub(crate) fn increment_and_notify(&self) {
        *self.0 .0.lock() += 1;
        self.0 .1.notify_all();
    }

    pub(crate) fn wait_until_past(&self, target: u64, timeout: Duration) -> Result<(), crate::Error> {
        let mut guard = self.0 .0.lock();
        let deadline = Instant::now() + timeout;
        while *guard <= target {
            let now = Instant::now();
            if now >= deadline {
                return Err(crate::Error::Timeout);
            }
            self.0 .1.wait_for(&mut guard, deadline - now);
        }
        Ok(())
    }
}

pub(crate) struct EventRecord {
    pub(crate) id: i64,
    pub(crate) bundle_id: i64,
    pub(crate) name: String,
    /// Zero means one-shot.
    pub(crate) interval: Duration,
    pub(crate) next_deadline: Instant,
    pub(crate) wakeup_requested: bool,
    pub(crate) single_shot_done: bool,
    pub(crate) call_count: CallCounter,
    pub(crate) callback: Box<dyn FnMut() + Send>,
    pub(crate) on_removed: Option<Box<dyn FnOnce() + Send>>,
}

impl EventRecord {
    pub(crate) fn is_due(&self, now: Instant) -> bool {
        self.wakeup_requested || self.next_deadline <= now
    }
}
