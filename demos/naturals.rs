// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Program that consumes an infinite sequence of natural numbers in parallel,
//! until one worker observes the value 100.

use seqpool::prelude::*;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

fn main() {
    env_logger::init();

    let executor = SeqExecutor {
        max_workers: WorkerCount::AvailableParallelism,
        cpu_pinning: CpuPinningPolicy::IfSupported,
    };

    let processed = AtomicUsize::new(0);
    let max_seen = AtomicU64::new(0);
    executor.for_each(0u64.., |x| {
        processed.fetch_add(1, Ordering::Relaxed);
        max_seen.fetch_max(x, Ordering::Relaxed);
        x != 100
    });

    println!(
        "stopped after processing {} item(s) with {} worker(s), max value = {}",
        processed.into_inner(),
        executor.num_workers(),
        max_seen.into_inner()
    );
}
