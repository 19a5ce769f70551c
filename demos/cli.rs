// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! CLI tool to run examples of parallel tasks over sequences.

use clap::{Parser, ValueEnum};
use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use seqpool::{seq, CpuPinningPolicy, SeqExecutor, WorkerCount};
use std::hint::black_box;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let executor = SeqExecutor {
        max_workers: match cli.num_workers {
            Some(num_workers) => WorkerCount::Count(num_workers),
            None => WorkerCount::AvailableParallelism,
        },
        cpu_pinning: match cli.cpu_pinning {
            CpuPinningCli::No => CpuPinningPolicy::No,
            CpuPinningCli::IfSupported => CpuPinningPolicy::IfSupported,
            CpuPinningCli::Always => CpuPinningPolicy::Always,
        },
    };

    match cli.scenario {
        Scenario::Fill => {
            let mut values = vec![1u64; cli.input_size as usize];
            executor.for_each(seq::slice(black_box(values.as_mut_slice())), |x| {
                *x = 0;
                true
            });
            let zeroes = values.iter().filter(|&&x| x == 0).count();
            println!("zeroes = {zeroes}");
        }
        Scenario::Sum => {
            let input = (0..cli.input_size).collect::<Vec<u64>>();
            let sum = AtomicU64::new(0);
            executor.for_each(black_box(input), |x| {
                sum.fetch_add(x, Ordering::Relaxed);
                true
            });
            println!("sum = {}", sum.into_inner());
        }
        Scenario::FindAny => {
            let input = fill_needles(cli.input_size as usize, cli.density);
            let found = Mutex::new(None);
            let processed = AtomicUsize::new(0);
            executor.for_each2(black_box(input).into_iter().enumerate(), |i, x| {
                processed.fetch_add(1, Ordering::Relaxed);
                if x {
                    *found.lock().unwrap() = Some(i);
                }
                !x
            });
            println!(
                "found = {:?} after processing {} item(s)",
                found.into_inner().unwrap(),
                processed.into_inner()
            );
        }
        Scenario::Naturals => {
            let max_seen = AtomicU64::new(0);
            executor.for_each(0u64.., |x| {
                max_seen.fetch_max(x, Ordering::Relaxed);
                x < cli.input_size
            });
            println!("max = {}", max_seen.into_inner());
        }
    }
}

/// Creates a vector of `input_size` booleans, `density` of which are set to
/// [`true`] (the needles). The set of needles follows a uniform distribution,
/// but is fixed by a constant-time seed for reproducibility.
fn fill_needles(input_size: usize, density: usize) -> Vec<bool> {
    let mut input = vec![false; input_size];

    let mut rng = ChaCha12Rng::seed_from_u64(42);
    let needles = index::sample(&mut rng, input_size, density.min(input_size));
    for needle in needles {
        input[needle] = true;
    }

    input
}

/// CLI tool to run examples of parallel tasks over sequences.
#[derive(Parser, Debug, PartialEq, Eq)]
#[command(version)]
struct Cli {
    /// Number of worker threads. Default to the available parallelism.
    #[arg(long)]
    num_workers: Option<NonZeroUsize>,

    /// Policy to pin worker threads to CPUs.
    #[arg(long, value_enum, default_value_t = CpuPinningCli::No)]
    cpu_pinning: CpuPinningCli,

    /// Scenario to run in parallel.
    #[arg(long, value_enum)]
    scenario: Scenario,

    /// Number of items in the input. For the naturals scenario, the value at
    /// which to stop.
    #[arg(long, default_value_t = 1_000_000)]
    input_size: u64,

    /// Number of items that match the search. Used only for the find-any
    /// scenario.
    #[arg(long, default_value_t = 1)]
    density: usize,
}

/// Policy to pin worker threads to CPUs.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum CpuPinningCli {
    /// Don't pin worker threads.
    No,
    /// Pin worker threads if the platform supports it.
    IfSupported,
    /// Pin worker threads, failing if the platform doesn't support it.
    Always,
}

/// Scenario to run.
#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
enum Scenario {
    /// Zero a slice in place.
    Fill,
    /// Sum an owned vector of numbers.
    Sum,
    /// Find any needle, stopping early.
    FindAny,
    /// Consume an infinite sequence until reaching the input size.
    Naturals,
}
