// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Adapters to run the executor over slices, mutating them in place.
//!
//! Any [`IntoIterator`] can be used as the input of a
//! [`SeqExecutor`](crate::SeqExecutor), as long as its iterator and items can
//! be sent to another thread. The adapters in this module yield mutable
//! references to the elements of a slice, so that the callback can modify the
//! slice in place. Each element is yielded exactly once, so no two callbacks
//! ever alias the same element.

use std::iter::{Enumerate, FusedIterator};
use std::slice::IterMut;

/// Returns a sequence of mutable references to the elements of a slice, in
/// order.
///
/// ```
/// # use seqpool::{seq, SeqExecutor};
/// let mut values = (0..1000).collect::<Vec<u64>>();
/// SeqExecutor::default().for_each(seq::slice(&mut values), |x| {
///     *x *= 2;
///     true
/// });
/// assert_eq!(values[500], 1000);
/// ```
pub fn slice<T>(slice: &mut [T]) -> Slice<'_, T> {
    Slice {
        inner: slice.iter_mut(),
    }
}

/// Returns a sequence of `(index, element)` pairs over a slice, in ascending
/// index order, where each element is a mutable reference.
///
/// ```
/// # use seqpool::{seq, SeqExecutor};
/// let mut values = vec![0; 1000];
/// SeqExecutor::default().for_each2(seq::slice_idx(&mut values), |i, x| {
///     *x = i;
///     true
/// });
/// assert!(values.iter().enumerate().all(|(i, &x)| i == x));
/// ```
pub fn slice_idx<T>(slice: &mut [T]) -> SliceIdx<'_, T> {
    SliceIdx {
        inner: slice.iter_mut().enumerate(),
    }
}

/// Sequence of mutable references to the elements of a slice.
///
/// This `struct` is created by the [`slice()`] function.
#[derive(Debug)]
#[must_use = "sequences are lazy and do nothing unless consumed"]
pub struct Slice<'a, T> {
    inner: IterMut<'a, T>,
}

impl<'a, T> Iterator for Slice<'a, T> {
    type Item = &'a mut T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> DoubleEndedIterator for Slice<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl<T> ExactSizeIterator for Slice<'_, T> {}

impl<T> FusedIterator for Slice<'_, T> {}

/// Sequence of `(index, element)` pairs over a slice, where each element is a
/// mutable reference.
///
/// This `struct` is created by the [`slice_idx()`] function.
#[derive(Debug)]
#[must_use = "sequences are lazy and do nothing unless consumed"]
pub struct SliceIdx<'a, T> {
    inner: Enumerate<IterMut<'a, T>>,
}

impl<'a, T> Iterator for SliceIdx<'a, T> {
    type Item = (usize, &'a mut T);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> DoubleEndedIterator for SliceIdx<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl<T> ExactSizeIterator for SliceIdx<'_, T> {}

impl<T> FusedIterator for SliceIdx<'_, T> {}
