// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! warden-daemon: lifecycle pieces behind the `wardend` binary

pub mod lifecycle;

pub use lifecycle::{Daemon, LifecycleError};
