// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Synchronization primitives

use crate::macros::{log_debug, log_error};
use crossbeam_channel::{Receiver, Sender};
use crossbeam_utils::CachePadded;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// A one-shot broadcast signal, telling the bridge thread and all the worker
/// threads of a run to stop.
///
/// The signal can be observed in two ways:
/// - polled via [`is_raised()`](Self::is_raised), which is a single atomic
///   load,
/// - waited on via the [`listener()`](Self::listener) channel, which never
///   carries any message but becomes disconnected (and therefore ready in a
///   [`select!`](crossbeam_channel::select)) once the signal is raised.
pub struct StopSignal {
    /// Whether the signal has been raised.
    raised: CachePadded<AtomicBool>,
    /// The only sender of the listener channel, dropped when the signal is
    /// raised.
    trigger: Mutex<Option<Sender<Infallible>>>,
    /// Receiving end of a channel that is disconnected once the signal is
    /// raised.
    listener: Receiver<Infallible>,
}

impl StopSignal {
    /// Creates a new signal, not raised yet.
    pub fn new() -> Self {
        let (trigger, listener) = crossbeam_channel::bounded(0);
        Self {
            raised: CachePadded::new(AtomicBool::new(false)),
            trigger: Mutex::new(Some(trigger)),
            listener,
        }
    }

    /// Raises the signal, waking up all the threads waiting on the
    /// [`listener()`](Self::listener).
    ///
    /// Returns whether this call raised the signal: only the first call
    /// returns [`true`], subsequent calls have no effect.
    pub fn raise(&self) -> bool {
        if self.raised.swap(true, Ordering::SeqCst) {
            return false;
        }
        // The flag is set before the channel is disconnected, so a thread woken
        // up by the listener always observes `is_raised() == true`.
        let trigger = self
            .trigger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(trigger);
        true
    }

    /// Returns whether the signal has been raised.
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Returns a channel receiver that becomes ready (with a disconnection
    /// error) once the signal has been raised.
    pub fn listener(&self) -> &Receiver<Infallible> {
        &self.listener
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Object whose destructor raises a [`StopSignal`], so that a thread exiting
/// for any reason (callback requesting to stop, exhausted input or panic)
/// releases the other threads of the run.
pub struct StopOnExit<'a> {
    /// Name of the owning thread, for logging.
    pub name: &'a str,
    /// Signal to raise on exit.
    pub signal: &'a StopSignal,
}

impl Drop for StopOnExit<'_> {
    fn drop(&mut self) {
        let name = self.name;
        if std::thread::panicking() {
            log_error!("[{name}] Detected panic in this thread, stopping the other threads");
        }
        if self.signal.raise() {
            log_debug!("[{name}] Raised the stop signal");
        }
    }
}

/// Object whose destructor raises a [`StopSignal`] only when unwinding from a
/// panic.
pub struct StopOnPanic<'a> {
    /// Name of the owning thread, for logging.
    pub name: &'a str,
    /// Signal to raise on panic.
    pub signal: &'a StopSignal,
}

impl Drop for StopOnPanic<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() && self.signal.raise() {
            let name = self.name;
            log_error!("[{name}] Detected panic in this thread, stopping the other threads");
        }
    }
}
