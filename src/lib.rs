//! Search-result rank tracking for a known domain across one or more queries.

// No unsafe anywhere
#![deny(unsafe_code)]
#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(unused_must_use)]
#![deny(nonstandard_style)]
#![deny(overflowing_literals)]

// Clippy discipline
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![cfg_attr(test, allow(clippy::panic))]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::print_stdout)]
#![deny(clippy::redundant_clone)]
#![deny(clippy::module_inception)]

/// Command-line entrypoint.
#[allow(clippy::print_stdout, clippy::print_stderr)]
pub mod cli;
/// Paginated extraction and rank tracking.
#[allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
pub mod tracking;
