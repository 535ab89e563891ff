//! # Grid Headless
//!
//! Headless driver for the grid simulation: loads a scenario, runs it
//! for a number of steps, and reports statistics as JSON lines. Used for
//! CI verification, determinism checks, and throughput benchmarking.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod runner;
pub mod scenario;
