// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Simple program that zeroes a slice using the standard library.

use std::hint::black_box;

fn main() {
    let input_size = 100_000_000;

    let mut values = vec![1u64; input_size];
    black_box(values.as_mut_slice())
        .iter_mut()
        .for_each(|x| *x = 0);
    println!("zeroed {} elements", black_box(values).len());
}
