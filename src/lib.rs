//! Stackwatch - in-process diagnostics for long-running programs
//!
//! Captures stack traces of the running process on demand (console),
//! periodically (timer) or on a fatal signal (crash handler), using an
//! external debugger in batch mode with an in-process unwind as fallback.
//! Captured output is parsed into threads and frames and rendered with
//! optional ANSI highlighting.

pub mod app;
pub mod config;
pub mod core;
pub mod lexer;
pub mod monitor;
pub mod trace;
pub mod ui;

pub use app::Runtime;
pub use config::Config;
