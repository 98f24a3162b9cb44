//! Core types shared by the CMOS bank driver crates.
//!
//! This crate holds the host-testable pieces that every other crate in the
//! workspace builds on: device-number and handle newtypes, the spin lock
//! used to guard per-bank state, and the leveled kernel log facility.
//!
//! Nothing here touches hardware, so everything can be exercised with
//! `cargo test` on the host.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

pub mod id;
pub mod log;
pub mod sync;
