//! # Sparks
//!
//! Terminal host for Sparklet mini-apps built on `sparklet-core`.
//!
//! ## Modules
//!
//! - `repl`: the interactive loop. It multiplexes typed commands, timer
//!   firings and file-watch events onto one thread.
//! - `commands`: the command registry and the context shared by handlers.
//! - `terminal`: renders a view tree as a numbered text outline.
//! - `timers`: wall-clock `TimerBackend` driven by a background thread.
//! - `storage`: file-backed spark data store and Sparklet library.
//! - `generator`: HTTP client for the sparklet generator service.
//! - `config` / `logging`: command line and tracing setup.

pub mod commands;
pub mod config;
pub mod generator;
pub mod logging;
pub mod repl;
pub mod storage;
pub mod terminal;
pub mod timers;

pub use crate::config::Cli;
pub use crate::storage::{FileDataStore, FileRepository};
pub use crate::timers::{ThreadTimers, TimerFired};
