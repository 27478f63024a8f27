//! Thread filter - hides known long-lived service threads from rendered dumps.

use super::types::ThreadInfo;

/// Thread names that are always idle runtime plumbing
const DEFAULT_NAMES: &[&str] = &[
    "pool-0",
    "pool-1",
    "pool-spawner",
    "gmain",
    "gdbus",
    "libusb_event",
];

const DEFAULT_NAME_PREFIXES: &[&str] = &["[pango]"];

/// Symbols identifying a service loop
const DEFAULT_SYMBOLS: &[&str] = &["HttpDaemon::serverLoop"];

/// Denylist deciding which threads are rendered.
///
/// A thread is excluded if its name equals one of `names`, starts with one of
/// `name_prefixes`, or if any of its frames mentions one of `symbols` in the
/// symbol or raw line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadFilter {
    pub names: Vec<String>,
    pub name_prefixes: Vec<String>,
    pub symbols: Vec<String>,
}

impl ThreadFilter {
    /// Filter that includes every thread
    pub fn none() -> Self {
        Self {
            names: Vec::new(),
            name_prefixes: Vec::new(),
            symbols: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbols.push(symbol.into());
        self
    }

    pub fn includes(&self, thread: &ThreadInfo) -> bool {
        if self.names.iter().any(|n| *n == thread.name) {
            return false;
        }
        if self.name_prefixes.iter().any(|p| thread.name.starts_with(p.as_str())) {
            return false;
        }
        !thread
            .frames
            .iter()
            .any(|f| self.symbols.iter().any(|s| f.mentions(s)))
    }
}

impl Default for ThreadFilter {
    fn default() -> Self {
        let owned = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        Self {
            names: owned(DEFAULT_NAMES),
            name_prefixes: owned(DEFAULT_NAME_PREFIXES),
            symbols: owned(DEFAULT_SYMBOLS),
        }
    }
}
