// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Single-threaded cooperative scheduled-event dispatcher and command
//! queue.

mod engine;
mod error;
mod event;

pub use engine::Engine;
pub use error::Error;
pub use event::DEFAULT_CANCEL_TIMEOUT;

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn one_shot_event_runs_exactly_once() {
        let engine = Engine::start(Duration::from_millis(5));
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let id = engine.schedule(1, "once", Duration::ZERO, Duration::ZERO, move || { count2.fetch_add(1, Ordering::SeqCst); }, None);

        engine.wakeup(id, Duration::from_millis(200)).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        engine.stop();
    }

    #[test]
    fn periodic_event_processes_at_least_interval_apart() {
        let engine = Engine::start(Duration::from_millis(5));
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let _id = engine.schedule(1, "tick", Duration::ZERO, Duration::from_millis(20), move || { count2.fetch_add(1, Ordering::SeqCst); }, None);

        std::thread::sleep(Duration::from_millis(100));
        let n = count.load(Ordering::SeqCst);
        assert!(n >= 2 && n <= 6, "expected a handful of ticks in 100ms at 20ms interval, got {n}");
        engine.stop();
    }

    #[test]
    fn cancel_invokes_removed_callback_and_is_idempotent() {
        let engine = Engine::start(Duration::from_millis(5));
        let removed = Arc::new(AtomicUsize::new(0));
        let removed2 = removed.clone();
        let id = engine.schedule(1, "x", Duration::from_secs(10), Duration::ZERO, || {}, Some(Box::new(move || { removed2.fetch_add(1, Ordering::SeqCst); })));

        engine.cancel(id).unwrap();
        assert_eq!(removed.load(Ordering::SeqCst), 1);
        engine.cancel(id).unwrap();
        assert_eq!(removed.load(Ordering::SeqCst), 1, "cancelling twice must not double-fire the removed callback");
        engine.stop();
    }

    #[test]
    fn wakeup_on_unknown_event_reports_not_found() {
        let engine = Engine::start(Duration::from_millis(5));
        assert!(matches!(engine.wakeup(999, Duration::ZERO), Err(Error::NotFound(999))));
        engine.stop();
    }

    #[test]
    fn commands_run_in_fifo_order() {
        let engine = Engine::start(Duration::from_millis(5));
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let order = order.clone();
            engine.enqueue_command(move || order.lock().push(i));
        }
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
        engine.stop();
    }
}
