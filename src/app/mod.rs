//! App module - runtime state and console commands
//!
//! Provides the runtime object shared by the console, the timer and the
//! crash handler, plus the console command model.

mod commands;
mod state;

pub use commands::*;
pub use state::*;
