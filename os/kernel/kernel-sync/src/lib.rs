//! # Kernel synchronization primitives
//!
//! Busy-waiting locks for kernel data structures that are touched from many
//! cores and never held across anything that could suspend.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod spin_lock;

pub use spin_lock::{SpinLock, SpinLockGuard};
