// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! The tick loop. Runs on its own thread, processes queued commands FIFO,
//! then processes every due scheduled event in deadline order, then sleeps
//! until the next tick or an external wake-up.

use crate::event::{CallCounter, EventRecord, DEFAULT_CANCEL_TIMEOUT};
use crate::Error;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

type Command = Box<dyn FnOnce() + Send>;

struct Inner {
    events: HashMap<i64, EventRecord>,
    commands: VecDeque<Command>,
    cancelling: HashSet<i64>,
    next_event_id: i64,
    stopping: bool,
}

/// Single-threaded cooperative dispatcher for one framework instance.
pub struct Engine {
    state: Arc<Mutex<Inner>>,
    work: Arc<Condvar>,
    resolution: Duration,
    thread: Option<JoinHandle<()>>,
}

impl Engine {
    /// Starts the tick thread immediately at the given resolution
    /// (default 25 ms, settable via framework config).
    pub fn start(resolution: Duration) -> Self {
        let state = Arc::new(Mutex::new(Inner {
            events: HashMap::new(),
            commands: VecDeque::new(),
            cancelling: HashSet::new(),
            next_event_id: 1,
            stopping: false,
        }));
        let work = Arc::new(Condvar::new());

        let thread_state = state.clone();
        let thread_work = work.clone();
        let thread = std::thread::Builder::new()
            .name("flux-scheduler".into())
            .spawn(move || run(thread_state, thread_work, resolution))
            .expect("failed to spawn scheduler thread");

        Self { state, work, resolution, thread: Some(thread) }
    }

    pub fn resolution(&self) -> Duration {
        self.resolution
    }

    /// Returns `(bundle_id, name)` for a still-scheduled event.
    pub fn event_info(&self, event_id: i64) -> Option<(i64, String)> {
        let inner = self.state.lock();
        inner.events.get(&event_id).map(|e| (e.bundle_id, e.name.clone()))
    }

    /// Queues an asynchronous command; processed in FIFO order on the tick thread.
    pub fn enqueue_command(&self, command: impl FnOnce() + Send + 'static) {
        self.state.lock().commands.push_back(Box::new(command));
        self.work.notify_all();
    }

    /// Registers a new scheduled event. `interval` of `Duration::ZERO`
    /// means one-shot.
    #[allow(clippy::too_many_arguments)]
    pub fn schedule(
        &self,
        bundle_id: i64,
        name: impl Into<String>,
        initial_delay: Duration,
        interval: Duration,
        callback: impl FnMut() + Send + 'static,
        on_removed: Option<Box<dyn FnOnce() + Send>>,
    ) -> i64 {
        let mut inner = self.state.lock();
        let id = inner.next_event_id;
        inner.next_event_id += 1;
        let record = EventRecord {
            id,
            bundle_id,
            name: name.into(),
            interval,
            next_deadline: Instant::now() + initial_delay,
            wakeup_requested: false,
            single_shot_done: false,
            call_count: CallCounter::new(),
            callback: Box::new(callback),
            on_removed,
        };
        inner.events.insert(id, record);
        drop(inner);
        self.work.notify_all();
        id
    }

    /// Sets the wake-up flag and signals the engine; with
    /// `wait_for > Duration::ZERO`, blocks until the
    /// processed-call counter advances past its pre-wakeup value or the
    /// timeout elapses.
    pub fn wakeup(&self, event_id: i64, wait_for: Duration) -> Result<(), Error> {
        let (counter, baseline) = {
            let mut inner = self.state.lock();
            let record = inner.events.get_mut(&event_id).ok_or(Error::NotFound(event_id))?;
            record.wakeup_requested = true;
            (record.call_count.clone(), record.call_count.get())
        };
        self.work.notify_all();
        if wait_for.is_zero() {
            return Ok(());
        }
        counter.wait_until_past(baseline, wait_for)
    }

    /// Removes the event, invokes its remove callback
    /// on the engine thread if present, and blocks (bounded by
    /// [`DEFAULT_CANCEL_TIMEOUT`]) until any in-flight invocation returns.
    /// Idempotent: cancelling an already-removed id is a no-op.
    pub fn cancel(&self, event_id: i64) -> Result<(), Error> {
        self.cancel_with_timeout(event_id, DEFAULT_CANCEL_TIMEOUT)
    }

    pub fn cancel_with_timeout(&self, event_id: i64, timeout: Duration) -> Result<(), Error> {
        let deadline = Instant::now() + timeout;
        loop {
            let mut inner = self.state.lock();
            if let Some(record) = inner.events.remove(&event_id) {
                inner.cancelling.remove(&event_id);
                drop(inner);
                if let Some(on_removed) = record.on_removed {
                    on_removed();
                }
                return Ok(());
            }
            // Not present: either never existed, already cancelled, or
            // mid-callback (temporarily removed by the tick loop while it
            // runs). Mark it so the tick loop won't reinsert it, then poll
            // briefly until it's gone for good.
            inner.cancelling.insert(event_id);
            drop(inner);

            if Instant::now() >= deadline {
                return Err(Error::Timeout);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    /// Stops accepting new commands, runs what's outstanding,
    /// calls every remaining event's remove callback, then joins the thread.
    pub fn stop(mut self) {
        self.state.lock().stopping = true;
        self.work.notify_all();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn run(state: Arc<Mutex<Inner>>, work: Arc<Condvar>, resolution: Duration) {
    loop {
        let (commands, due, stopping) = {
            let mut inner = state.lock();
            let commands: Vec<Command> = inner.commands.drain(..).collect();
            let now = Instant::now();
            let mut due: Vec<(Instant, i64)> = inner.events.iter().filter(|(_, e)| e.is_due(now)).map(|(id, e)| (e.next_deadline, *id)).collect();
            due.sort_by_key(|&(deadline, id)| (deadline, id));
            (commands, due, inner.stopping)
        };

        for command in commands {
            command();
        }

        for (_, id) in due {
            process_event(&state, id);
        }

        reap_single_shot_done(&state);

        if stopping {
            drain(&state);
            return;
        }

        let mut inner = state.lock();
        let next_wake = inner
            .events
            .values()
            .map(|e| e.next_deadline)
            .min()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(resolution)
            .min(resolution);
        work.wait_for(&mut inner, next_wake.max(Duration::from_millis(1)));
    }
}

/// Invokes the callback while holding a logical reference
/// (the event is removed from the map for the duration of the call, so a
/// concurrent `cancel` can detect "in flight" and wait rather than double
/// free), then reschedule or mark done.
fn process_event(state: &Arc<Mutex<Inner>>, id: i64) {
    let mut record = {
        let mut inner = state.lock();
        match inner.events.remove(&id) {
            Some(record) => record,
            None => return,
        }
    };

    record.wakeup_requested = false;
    (record.callback)();
    record.call_count.increment_and_notify();

    if record.interval.is_zero() {
        record.single_shot_done = true;
    } else {
        record.next_deadline += record.interval;
    }

    let mut inner = state.lock();
    if inner.cancelling.remove(&id) {
        drop(inner);
        if let Some(on_removed) = record.on_removed {
            on_removed();
        }
        return;
    }
    if record.single_shot_done {
        drop(inner);
        if let Some(on_removed) = record.on_removed {
            on_removed();
        }
    } else {
        inner.events.insert(id, record);
    }
}

fn reap_single_shot_done(state: &Arc<Mutex<Inner>>) {
    // process_event already reaps the event it just ran; this pass only
    // matters if a single-shot event's deadline was reached by more than
    // one pass without being selected (defensive, should be unreachable).
    let stale: Vec<i64> = {
        let inner = state.lock();
        inner.events.iter().filter(|(_, e)| e.single_shot_done).map(|(id, _)| *id).collect()
    };
    for id in stale {
        let removed = {
            let mut inner = state.lock();
            inner.events.remove(&id)
        };
        if let Some(record) = removed {
            if let Some(on_removed) = record.on_removed {
                on_removed();
            }
        }
    }
}

fn drain(state: &Arc<Mutex<Inner>>) {
    loop {
        let commands: Vec<Command> = {
            let mut inner = state.lock();
            inner.commands.drain(..).collect()
        };
        if commands.is_empty() {
            break;
        }
        for command in commands {
            command();
        }
    }
    let remaining: Vec<EventRecord> = state.lock().events.drain().map(|(_, v)| v).collect();
    for record in remaining {
        if let Some(on_removed) = record.on_removed {
            on_removed();
        }
    }
}
