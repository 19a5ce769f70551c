// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Bounded parallel executor: fans out a single sequential source to a fixed
//! number of worker threads through a bounded queue.

use super::sync::{StopOnExit, StopOnPanic, StopSignal};
use crate::executor::CpuPinningPolicy;
#[cfg(feature = "log_parallelism")]
use crate::macros::{log_info, log_trace};
use crate::macros::{log_debug, log_error, log_warn};
use crossbeam_channel::{select_biased, Receiver, Sender};
// Platforms that support `libc::sched_setaffinity()`.
#[cfg(all(
    not(miri),
    any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "linux"
    )
))]
use nix::{
    sched::{sched_setaffinity, CpuSet},
    unistd::Pid,
};
use std::num::NonZeroUsize;

/// Runs `process_item` on every item produced by `source`, using `num_workers`
/// worker threads, until either the source is exhausted or a call to
/// `process_item` returns [`false`].
///
/// The source is only ever consumed by a single bridge thread, which pushes
/// items into a queue of capacity `num_workers`. This function returns once
/// the bridge thread and all the worker threads have exited.
///
/// If `process_item` panics, the other threads are stopped and the panic is
/// resumed on the calling thread once all threads have been joined.
pub(crate) fn run<I, F>(
    num_workers: NonZeroUsize,
    cpu_pinning: CpuPinningPolicy,
    mut source: I,
    process_item: F,
) where
    I: Iterator + Send,
    I::Item: Send,
    F: Fn(I::Item) -> bool + Sync,
{
    // Pulling the first item here avoids spawning any thread for an empty
    // source.
    let Some(first) = source.next() else {
        log_debug!("[main thread] Empty source, nothing to do");
        return;
    };

    let num_workers = num_workers.get();
    check_cpu_pinning(cpu_pinning);

    let (sender, receiver) = crossbeam_channel::bounded(num_workers);
    let stop = StopSignal::new();
    let stop = &stop;
    let process_item = &process_item;

    std::thread::scope(|scope| {
        // The bridge doesn't raise the stop signal when exiting: the workers must
        // still drain the queue. Dropping the sender is enough to release them,
        // including when the source panics.
        let bridge_handle =
            scope.spawn(move || bridge(std::iter::once(first).chain(source), sender, stop));

        // Failing to spawn a worker must release the threads already running.
        let spawning = StopOnPanic {
            name: "main thread",
            signal: stop,
        };
        let workers = (0..num_workers)
            .map(|id| {
                let receiver = receiver.clone();
                scope.spawn(move || {
                    let name = format!("worker {id}");
                    let _stop_on_exit = StopOnExit {
                        name: &name,
                        signal: stop,
                    };
                    pin_current_thread(id, cpu_pinning);
                    work(&name, receiver, stop, process_item)
                })
            })
            .collect::<Vec<_>>();
        drop(spawning);
        // Only the workers may keep the queue alive, so that the bridge observes
        // a disconnection if all of them exit.
        drop(receiver);
        log_debug!("[main thread] Spawned the bridge and {num_workers} worker(s)");

        let mut first_panic = None;
        let mut _total = 0;
        match bridge_handle.join() {
            Ok(_pushed) => {
                log_debug!("[main thread] Bridge joined after pushing {_pushed} item(s)");
            }
            Err(payload) => {
                log_error!("[main thread] Bridge thread panicked");
                first_panic = first_panic.or(Some(payload));
            }
        }
        for (_id, worker) in workers.into_iter().enumerate() {
            match worker.join() {
                Ok(processed) => {
                    _total += processed;
                    log_debug!(
                        "[main thread] Worker {_id} joined after processing {processed} item(s)"
                    );
                }
                Err(payload) => {
                    log_error!("[main thread] Worker {_id} panicked");
                    first_panic = first_panic.or(Some(payload));
                }
            }
        }
        log_debug!(
            "[main thread] Joined all threads, {_total} item(s) processed, stop signal raised: {}",
            stop.is_raised()
        );

        if let Some(payload) = first_panic {
            std::panic::resume_unwind(payload);
        }
    });
}

/// Main function of the bridge thread: pushes items from the source into the
/// queue until the source is exhausted, the stop signal is raised or all the
/// workers are gone.
///
/// Returns the number of items pushed to the queue.
fn bridge<I: Iterator>(mut source: I, sender: Sender<I::Item>, stop: &StopSignal) -> usize {
    let mut pushed = 0;
    loop {
        if stop.is_raised() {
            log_debug!("[bridge] Stop signal observed before pulling from the source");
            break;
        }
        let Some(item) = source.next() else {
            log_debug!("[bridge] Source exhausted");
            break;
        };
        // When both are ready, the stop signal wins.
        select_biased! {
            recv(stop.listener()) -> _ => {
                log_debug!("[bridge] Stop signal observed while pushing an item");
                break;
            }
            send(sender, item) -> result => {
                if result.is_err() {
                    log_debug!("[bridge] All workers are gone");
                    break;
                }
                pushed += 1;
            }
        }
    }
    // Dropping the sender closes the queue, so that idle workers exit once it's
    // drained.
    drop(sender);
    pushed
}

/// Main function of a worker thread: processes items from the queue until the
/// queue is closed and drained, the stop signal is raised or `process_item`
/// returns [`false`].
///
/// Returns the number of items processed by this worker.
fn work<T>(
    name: &str,
    receiver: Receiver<T>,
    stop: &StopSignal,
    process_item: &(impl Fn(T) -> bool + Sync),
) -> usize {
    let mut processed = 0;
    loop {
        // When both are ready, the stop signal wins.
        select_biased! {
            recv(stop.listener()) -> _ => {
                log_debug!("[{name}] Stop signal observed");
                break;
            }
            recv(receiver) -> item => {
                let Ok(item) = item else {
                    log_debug!("[{name}] Queue closed and drained");
                    break;
                };
                processed += 1;
                #[cfg(feature = "log_parallelism")]
                log_trace!("[{name}] Processing item #{processed}");
                if !process_item(item) {
                    log_debug!("[{name}] Callback requested to stop");
                    stop.raise();
                    break;
                }
            }
        }
    }

    #[cfg(feature = "log_parallelism")]
    log_info!("[{name}] Processed {processed} item(s)");
    processed
}

/// Reports unsupported CPU pinning on platforms without
/// `sched_setaffinity()`.
#[cfg(any(
    miri,
    not(any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "linux"
    ))
))]
fn check_cpu_pinning(cpu_pinning: CpuPinningPolicy) {
    match cpu_pinning {
        CpuPinningPolicy::No => (),
        CpuPinningPolicy::IfSupported => {
            log_warn!("Pinning threads to CPUs is not implemented on this platform.")
        }
        CpuPinningPolicy::Always => {
            panic!("Pinning threads to CPUs is not implemented on this platform.")
        }
    }
}

#[cfg(all(
    not(miri),
    any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "linux"
    )
))]
fn check_cpu_pinning(_cpu_pinning: CpuPinningPolicy) {}

/// Pins the current worker thread to the CPU of the same index, according to
/// the given policy.
#[cfg(all(
    not(miri),
    any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "linux"
    )
))]
fn pin_current_thread(id: usize, cpu_pinning: CpuPinningPolicy) {
    match cpu_pinning {
        CpuPinningPolicy::No => (),
        CpuPinningPolicy::IfSupported => {
            let mut cpu_set = CpuSet::new();
            if let Err(e) = cpu_set.set(id) {
                log_warn!("Failed to set CPU affinity for worker #{id}: {e}");
            } else if let Err(e) = sched_setaffinity(Pid::from_raw(0), &cpu_set) {
                log_warn!("Failed to set CPU affinity for worker #{id}: {e}");
            } else {
                log_debug!("Pinned worker #{id} to CPU #{id}");
            }
        }
        CpuPinningPolicy::Always => {
            let mut cpu_set = CpuSet::new();
            if let Err(e) = cpu_set.set(id) {
                panic!("Failed to set CPU affinity for worker #{id}: {e}");
            } else if let Err(e) = sched_setaffinity(Pid::from_raw(0), &cpu_set) {
                panic!("Failed to set CPU affinity for worker #{id}: {e}");
            } else {
                log_debug!("Pinned worker #{id} to CPU #{id}");
            }
        }
    }
}

#[cfg(any(
    miri,
    not(any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "linux"
    ))
))]
fn pin_current_thread(_id: usize, _cpu_pinning: CpuPinningPolicy) {}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn workers(count: usize) -> NonZeroUsize {
        NonZeroUsize::try_from(count).unwrap()
    }

    #[test]
    fn run_empty_source_never_calls_back() {
        let calls = AtomicUsize::new(0);
        run(
            workers(4),
            CpuPinningPolicy::No,
            std::iter::empty::<u32>(),
            |_| {
                calls.fetch_add(1, Ordering::Relaxed);
                true
            },
        );
        assert_eq!(calls.into_inner(), 0);
    }

    #[test]
    fn run_pulls_source_lazily_on_early_stop() {
        // With a single worker, the source is pulled at most 3 times: the stopping
        // item, one item waiting in the queue and one item being pushed.
        const NUM_WORKERS: usize = 1;
        let pulled = AtomicUsize::new(0);
        let source = (0..1_000_000u64).inspect(|_| {
            pulled.fetch_add(1, Ordering::Relaxed);
        });
        run(workers(NUM_WORKERS), CpuPinningPolicy::No, source, |x| x != 0);
        let pulled = pulled.into_inner();
        assert!((1..=3).contains(&pulled), "pulled {pulled} items");
    }

    #[test]
    fn bridge_stops_on_raised_signal() {
        let stop = StopSignal::new();
        stop.raise();
        let (sender, receiver) = crossbeam_channel::bounded(1);
        let pushed = bridge(0..10, sender, &stop);
        assert_eq!(pushed, 0);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn bridge_does_not_block_on_full_queue_after_stop() {
        let stop = StopSignal::new();
        let (sender, receiver) = crossbeam_channel::bounded(2);
        std::thread::scope(|scope| {
            let handle = scope.spawn(|| bridge(0.., sender, &stop));
            // Let the bridge fill the queue and block on the next push.
            while !receiver.is_full() {
                std::thread::yield_now();
            }
            stop.raise();
            let pushed = handle.join().unwrap();
            assert_eq!(pushed, 2);
        });
        assert_eq!(receiver.try_iter().collect::<Vec<_>>(), [0, 1]);
    }

    #[test]
    fn bridge_stops_when_workers_are_gone() {
        let stop = StopSignal::new();
        let (sender, receiver) = crossbeam_channel::bounded(1);
        drop(receiver);
        let pushed = bridge(0.., sender, &stop);
        assert_eq!(pushed, 0);
    }

    #[test]
    fn work_drains_closed_queue() {
        let stop = StopSignal::new();
        let (sender, receiver) = crossbeam_channel::bounded(8);
        for i in 0..5 {
            sender.send(i).unwrap();
        }
        drop(sender);

        let seen = Mutex::new(Vec::new());
        let processed = work("worker", receiver, &stop, &|x| {
            seen.lock().unwrap().push(x);
            true
        });
        assert_eq!(processed, 5);
        assert_eq!(seen.into_inner().unwrap(), [0, 1, 2, 3, 4]);
        assert!(!stop.is_raised());
    }

    #[test]
    fn work_raises_signal_on_stop() {
        let stop = StopSignal::new();
        let (sender, receiver) = crossbeam_channel::bounded(8);
        for i in 0..5 {
            sender.send(i).unwrap();
        }

        let processed = work("worker", receiver, &stop, &|x| x < 2);
        assert_eq!(processed, 3);
        assert!(stop.is_raised());
    }

    #[test]
    fn work_exits_on_raised_signal_with_pending_items() {
        let stop = StopSignal::new();
        let (sender, receiver) = crossbeam_channel::bounded(8);
        for i in 0..5 {
            sender.send(i).unwrap();
        }
        stop.raise();

        let processed = work("worker", receiver, &stop, &|_| true);
        assert_eq!(processed, 0);
    }

    #[test]
    fn cpu_pinning_if_supported() {
        let sum = AtomicUsize::new(0);
        run(
            workers(2),
            CpuPinningPolicy::IfSupported,
            1..=10usize,
            |x| {
                sum.fetch_add(x, Ordering::Relaxed);
                true
            },
        );
        assert_eq!(sum.into_inner(), 5 * 11);
    }

    #[cfg(any(
        miri,
        not(any(
            target_os = "android",
            target_os = "dragonfly",
            target_os = "freebsd",
            target_os = "linux"
        ))
    ))]
    #[test]
    #[should_panic = "Pinning threads to CPUs is not implemented on this platform."]
    fn cpu_pinning_always_not_supported() {
        run(workers(2), CpuPinningPolicy::Always, 0..10, |_| true);
    }

    #[cfg(all(
        not(miri),
        any(
            target_os = "android",
            target_os = "dragonfly",
            target_os = "freebsd",
            target_os = "linux"
        )
    ))]
    #[test]
    #[should_panic = "Failed to set CPU affinity for worker"]
    fn cpu_pinning_always_failure_stops_run() {
        // The last worker's index is out of range of any CPU set, so pinning it
        // fails. The run must stop even though the callback never does.
        let num_workers = CpuSet::count() + 1;
        run(workers(num_workers), CpuPinningPolicy::Always, 0u64.., |_| true);
    }
}
