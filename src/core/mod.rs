//! Core module - debugger bridge, crash handler and procfs listings
//!
//! This module holds the process-level plumbing: driving the external
//! debugger, catching fatal signals, and reading `/proc/self`.

pub mod crash;
pub mod debugger;
pub mod procfs;

// Re-export common types
pub use debugger::{CaptureOutcome, CaptureReport, DebugError, Debugger};
