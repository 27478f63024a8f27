//! Monitor module - periodic background diagnostics

pub mod timer;

pub use timer::{TimerActions, TimerOptions, TimerStatus, TimerThread, DEFAULT_INTERVAL_MS, TICK};
