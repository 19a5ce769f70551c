// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Internal logging macros, forwarding to the [`log`](https://docs.rs/log)
//! crate when the `log` feature is enabled.
//!
//! When logging is disabled, the arguments are still type-checked (inside a
//! branch that never runs) so that variables only used for logging don't
//! trigger unused warnings, but nothing is evaluated at runtime.

#[cfg(feature = "log")]
macro_rules! log_debug {
    ( $($args:tt)* ) => {
        log::debug!( $($args)* )
    };
}

#[cfg(feature = "log")]
macro_rules! log_error {
    ( $($args:tt)* ) => {
        log::error!( $($args)* )
    };
}

#[cfg(feature = "log")]
macro_rules! log_warn {
    ( $($args:tt)* ) => {
        log::warn!( $($args)* )
    };
}

/// Per-worker statistics, only emitted with the `log_parallelism` feature.
#[cfg(feature = "log_parallelism")]
macro_rules! log_info {
    ( $($args:tt)* ) => {
        log::info!( $($args)* )
    };
}

/// Per-item tracing, only emitted with the `log_parallelism` feature.
#[cfg(feature = "log_parallelism")]
macro_rules! log_trace {
    ( $($args:tt)* ) => {
        log::trace!( $($args)* )
    };
}

#[cfg(not(feature = "log"))]
macro_rules! log_disabled {
    ( $($args:tt)* ) => {
        if false {
            let _ = ::std::format_args!( $($args)* );
        }
    };
}

#[cfg(not(feature = "log"))]
macro_rules! log_debug {
    ( $($args:tt)* ) => {
        $crate::macros::log_disabled!( $($args)* )
    };
}

#[cfg(not(feature = "log"))]
macro_rules! log_error {
    ( $($args:tt)* ) => {
        $crate::macros::log_disabled!( $($args)* )
    };
}

#[cfg(not(feature = "log"))]
macro_rules! log_warn {
    ( $($args:tt)* ) => {
        $crate::macros::log_disabled!( $($args)* )
    };
}

pub(crate) use log_debug;
#[cfg(not(feature = "log"))]
pub(crate) use log_disabled;
pub(crate) use log_error;
#[cfg(feature = "log_parallelism")]
pub(crate) use log_info;
#[cfg(feature = "log_parallelism")]
pub(crate) use log_trace;
pub(crate) use log_warn;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    #[deny(dropping_copy_types, unused_variables)]
    fn test_logging_only_variables() {
        let name = "worker 0";
        let count = 42usize;
        log_debug!("[{name}] Processed {count} item(s)");
        log_warn!("[{name}] Warning with positional argument {}", count + 1);
        log_error!("[{name}] Error");
    }
}
