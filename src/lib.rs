// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#![doc = include_str!("../README.md")]
#![forbid(missing_docs, unsafe_code)]

mod core;
mod executor;
mod macros;
pub mod seq;

pub use executor::{for_each_seq, for_each_seq2, CpuPinningPolicy, SeqExecutor, WorkerCount};

/// Prelude of the most commonly used items of this crate.
pub mod prelude {
    pub use crate::seq::{slice, slice_idx};
    pub use crate::{for_each_seq, for_each_seq2, CpuPinningPolicy, SeqExecutor, WorkerCount};
}
