//! Runtime configuration

use std::path::PathBuf;

use crate::core::debugger::DEFAULT_DEBUGGER_PATH;
use crate::trace::ThreadFilter;

#[derive(Debug, Clone)]
pub struct Config {
    /// External debugger binary
    pub debugger_path: PathBuf,
    /// Directory receiving `segfault.<pid>.dump.*` artifacts
    pub crash_dir: PathBuf,
    /// Colored output, and crash captures streamed to the console
    pub interactive: bool,
    /// Threads hidden from rendered traces
    pub thread_filter: ThreadFilter,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debugger_path: PathBuf::from(DEFAULT_DEBUGGER_PATH),
            crash_dir: PathBuf::from("/tmp"),
            interactive: false,
            thread_filter: ThreadFilter::default(),
        }
    }
}
