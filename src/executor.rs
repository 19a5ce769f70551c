// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Configuration of the executor, and entry points to run it.

use crate::core::run;
use crate::macros::log_warn;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

/// Maximum number of worker threads to spawn for a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WorkerCount {
    /// Spawn the number of threads returned by
    /// [`std::thread::available_parallelism()`].
    #[default]
    AvailableParallelism,
    /// Spawn the given number of threads.
    Count(NonZeroUsize),
}

impl WorkerCount {
    /// Resolves the number of worker threads to spawn.
    ///
    /// If the available parallelism can't be queried, this falls back to a
    /// single worker.
    pub fn count(self) -> NonZeroUsize {
        match self {
            WorkerCount::AvailableParallelism => {
                std::thread::available_parallelism().unwrap_or_else(|e| {
                    log_warn!("Getting the available parallelism failed, using 1 worker: {e}");
                    NonZeroUsize::MIN
                })
            }
            WorkerCount::Count(count) => count,
        }
    }
}

impl TryFrom<usize> for WorkerCount {
    type Error = <NonZeroUsize as TryFrom<usize>>::Error;

    fn try_from(worker_count: usize) -> Result<Self, Self::Error> {
        let count = NonZeroUsize::try_from(worker_count)?;
        Ok(WorkerCount::Count(count))
    }
}

impl From<NonZeroUsize> for WorkerCount {
    fn from(count: NonZeroUsize) -> Self {
        WorkerCount::Count(count)
    }
}

/// Policy to pin worker threads to CPUs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CpuPinningPolicy {
    /// Don't pin worker threads to CPUs.
    #[default]
    No,
    /// Pin each worker thread to a CPU, if CPU pinning is supported and
    /// implemented on this platform.
    IfSupported,
    /// Pin each worker thread to a CPU. If CPU pinning isn't supported on this
    /// platform (or not implemented), running the executor will panic.
    Always,
}

/// Configuration to run a callback in parallel over a sequence.
///
/// The default value uses as many workers as the available parallelism, and
/// doesn't pin threads to CPUs.
///
/// An executor doesn't hold any state between runs: the same value can be
/// reused for multiple runs, including concurrently from multiple threads.
/// Each run spawns its own threads and joins them before returning.
///
/// ```
/// # use seqpool::{CpuPinningPolicy, SeqExecutor, WorkerCount};
/// # use std::sync::atomic::{AtomicU64, Ordering};
/// let executor = SeqExecutor {
///     max_workers: WorkerCount::try_from(4).unwrap(),
///     cpu_pinning: CpuPinningPolicy::No,
/// };
///
/// let sum = AtomicU64::new(0);
/// executor.for_each(1..=10, |x| {
///     sum.fetch_add(x, Ordering::Relaxed);
///     true
/// });
/// assert_eq!(sum.into_inner(), 5 * 11);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SeqExecutor {
    /// Maximum number of worker threads to spawn. This is also the capacity of
    /// the queue between the input sequence and the workers.
    pub max_workers: WorkerCount,
    /// Policy to pin worker threads to CPUs.
    pub cpu_pinning: CpuPinningPolicy,
}

impl SeqExecutor {
    /// Creates an executor with the given maximum number of workers, where
    /// zero means the available parallelism.
    ///
    /// ```
    /// # use seqpool::{SeqExecutor, WorkerCount};
    /// assert_eq!(
    ///     SeqExecutor::with_max_workers(0).max_workers,
    ///     WorkerCount::AvailableParallelism
    /// );
    /// assert_eq!(SeqExecutor::with_max_workers(3).num_workers().get(), 3);
    /// ```
    pub fn with_max_workers(max_workers: usize) -> Self {
        Self {
            max_workers: WorkerCount::try_from(max_workers)
                .unwrap_or(WorkerCount::AvailableParallelism),
            ..Self::default()
        }
    }

    /// Returns the number of worker threads that a run of this executor
    /// spawns.
    pub fn num_workers(&self) -> NonZeroUsize {
        self.max_workers.count()
    }

    /// Runs `f` in parallel on each item of `input`, until the input is
    /// exhausted or `f` returns [`false`].
    ///
    /// The input is consumed lazily by a single thread, so it doesn't need to
    /// be thread-safe and may be infinite. Items are dispatched in order, but
    /// the order in which the calls to `f` complete is unspecified. Once `f`
    /// returns [`false`], no new item is dispatched, but calls already running
    /// on other workers are allowed to complete.
    ///
    /// This function returns once all the worker threads have exited. If `f`
    /// panics, the panic is propagated to the caller after all threads have
    /// exited.
    ///
    /// ```
    /// # use seqpool::SeqExecutor;
    /// # use std::sync::atomic::{AtomicBool, Ordering};
    /// // Stops on the first multiple of 7 in an infinite sequence.
    /// let found = AtomicBool::new(false);
    /// SeqExecutor::default().for_each(1u64.., |x| {
    ///     if x % 7 == 0 {
    ///         found.store(true, Ordering::Relaxed);
    ///         return false;
    ///     }
    ///     true
    /// });
    /// assert!(found.into_inner());
    /// ```
    pub fn for_each<I>(&self, input: I, f: impl Fn(I::Item) -> bool + Sync)
    where
        I: IntoIterator,
        I::IntoIter: Send,
        I::Item: Send,
    {
        self.for_each2(input.into_iter().map(|item| (item, ())), |item, ()| f(item))
    }

    /// Runs `f` in parallel on each pair of `input`, until the input is
    /// exhausted or `f` returns [`false`].
    ///
    /// This is the same as [`for_each()`](Self::for_each), for sequences of
    /// key-value pairs. Together with [`slice_idx()`](crate::seq::slice_idx),
    /// this allows to map a slice in place.
    ///
    /// ```
    /// # use seqpool::{seq, SeqExecutor};
    /// let mut squares = vec![0; 100];
    /// SeqExecutor::default().for_each2(seq::slice_idx(&mut squares), |i, x| {
    ///     *x = i * i;
    ///     true
    /// });
    /// assert_eq!(squares[9], 81);
    /// ```
    pub fn for_each2<I, A, B>(&self, input: I, f: impl Fn(A, B) -> bool + Sync)
    where
        I: IntoIterator<Item = (A, B)>,
        I::IntoIter: Send,
        A: Send,
        B: Send,
    {
        run(
            self.num_workers(),
            self.cpu_pinning,
            input.into_iter(),
            |(a, b)| f(a, b),
        )
    }

    /// Runs the fallible function `f` in parallel on each item of `input`,
    /// until the input is exhausted or `f` returns an error.
    ///
    /// Returns the first error that was recorded, if any. Other calls to `f`
    /// that were already running when the first error occurred are allowed to
    /// complete, and their errors are discarded.
    ///
    /// ```
    /// # use seqpool::SeqExecutor;
    /// let inputs = ["1", "2", "three", "4"];
    /// let result = SeqExecutor::default().try_for_each(inputs, |s| {
    ///     s.parse::<u32>().map(|_| ()).map_err(|_| format!("invalid: {s}"))
    /// });
    /// assert_eq!(result, Err("invalid: three".to_owned()));
    /// ```
    pub fn try_for_each<I, E>(
        &self,
        input: I,
        f: impl Fn(I::Item) -> Result<(), E> + Sync,
    ) -> Result<(), E>
    where
        I: IntoIterator,
        I::IntoIter: Send,
        I::Item: Send,
        E: Send,
    {
        let first_error = Mutex::new(None);
        self.for_each(input, |item| match f(item) {
            Ok(()) => true,
            Err(e) => {
                let mut first_error = first_error.lock().unwrap_or_else(PoisonError::into_inner);
                if first_error.is_none() {
                    *first_error = Some(e);
                }
                false
            }
        });
        match first_error
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
        {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Runs `f` in parallel on each item of `input` with a default
/// [`SeqExecutor`], until the input is exhausted or `f` returns [`false`].
///
/// See [`SeqExecutor::for_each()`] for details.
///
/// ```
/// # use seqpool::{for_each_seq, seq};
/// let mut values = vec![1; 10_000];
/// for_each_seq(seq::slice(&mut values), |x| {
///     *x = 0;
///     true
/// });
/// assert!(values.iter().all(|&x| x == 0));
/// ```
pub fn for_each_seq<I>(input: I, f: impl Fn(I::Item) -> bool + Sync)
where
    I: IntoIterator,
    I::IntoIter: Send,
    I::Item: Send,
{
    SeqExecutor::default().for_each(input, f)
}

/// Runs `f` in parallel on each pair of `input` with a default
/// [`SeqExecutor`], until the input is exhausted or `f` returns [`false`].
///
/// See [`SeqExecutor::for_each2()`] for details.
pub fn for_each_seq2<I, A, B>(input: I, f: impl Fn(A, B) -> bool + Sync)
where
    I: IntoIterator<Item = (A, B)>,
    I::IntoIter: Send,
    A: Send,
    B: Send,
{
    SeqExecutor::default().for_each2(input, f)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_worker_count_try_from_usize() {
        assert!(WorkerCount::try_from(0).is_err());
        assert_eq!(
            WorkerCount::try_from(1),
            Ok(WorkerCount::Count(NonZeroUsize::try_from(1).unwrap()))
        );
    }

    #[test]
    fn test_worker_count_count() {
        assert_eq!(
            WorkerCount::AvailableParallelism.count(),
            std::thread::available_parallelism().unwrap()
        );
        assert_eq!(WorkerCount::try_from(7).unwrap().count().get(), 7);
        assert_eq!(
            WorkerCount::from(NonZeroUsize::try_from(3).unwrap()).count().get(),
            3
        );
    }

    #[test]
    fn test_default_executor() {
        let executor = SeqExecutor::default();
        assert_eq!(executor.max_workers, WorkerCount::AvailableParallelism);
        assert_eq!(executor.cpu_pinning, CpuPinningPolicy::No);
        assert_eq!(
            executor.num_workers(),
            std::thread::available_parallelism().unwrap()
        );
    }

    #[test]
    fn test_with_max_workers_normalizes_zero() {
        assert_eq!(SeqExecutor::with_max_workers(0), SeqExecutor::default());
        assert_eq!(
            SeqExecutor::with_max_workers(5),
            SeqExecutor {
                max_workers: WorkerCount::try_from(5).unwrap(),
                cpu_pinning: CpuPinningPolicy::No,
            }
        );
    }

    #[test]
    fn test_try_for_each_ok() {
        let sum = AtomicUsize::new(0);
        let result: Result<(), String> =
            SeqExecutor::with_max_workers(4).try_for_each(0..1000, |x| {
                sum.fetch_add(x, Ordering::Relaxed);
                Ok(())
            });
        assert_eq!(result, Ok(()));
        assert_eq!(sum.into_inner(), 999 * 1000 / 2);
    }

    #[test]
    fn test_try_for_each_returns_error() {
        let result = SeqExecutor::with_max_workers(4).try_for_each(0..1000, |x| {
            if x % 100 == 42 {
                Err(x)
            } else {
                Ok(())
            }
        });
        let error = result.unwrap_err();
        assert_eq!(error % 100, 42);
    }

    #[test]
    fn test_try_for_each_error_on_infinite_input() {
        let result = SeqExecutor::with_max_workers(4).try_for_each(0u64.., |x| {
            if x == 100 {
                Err("reached 100")
            } else {
                Ok(())
            }
        });
        assert_eq!(result, Err("reached 100"));
    }

    #[test]
    fn test_for_each_seq2_pairs() {
        let sum = AtomicUsize::new(0);
        for_each_seq2((0..100).map(|i| (i, 2 * i)), |a, b| {
            sum.fetch_add(a * b, Ordering::Relaxed);
            true
        });
        // sum of 2 * i^2 for i in 0..100
        assert_eq!(sum.into_inner(), 2 * (99 * 100 * 199 / 6));
    }
}
