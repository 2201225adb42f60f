//! Command Line Interface (CLI) layer for s2pipe.
//!
//! This module defines argument parsing (`args`), error types (`errors`),
//! and the orchestration logic (`runner`) for the `download`, `extract`
//! and `breaks` subcommands. Each subcommand loads an optional JSON
//! parameter file, applies flag overrides and calls `s2pipe::api`.
//!
//! If you are embedding s2pipe into another application, prefer using
//! the high-level `s2pipe::api` module instead of calling the CLI code.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
