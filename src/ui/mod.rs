//! UI module - interactive diagnostics console

pub mod cli;
