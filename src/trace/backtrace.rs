//! Parser for the in-process fallback backtrace.
//!
//! Written by [`crate::core::debugger`] when the debugger is unavailable:
//!
//! ```text
//! === Thread (current) ===
//! #0  0x000055d0c1e2a1b4 in stackwatch::core::debugger::write_fallback at src/core/debugger.rs:210
//! ```

use std::io::BufRead;

use super::types::ThreadInfo;
use super::{collect_threads, LineKind};

/// Name used when a header carries no parenthesized name
const DEFAULT_THREAD_NAME: &str = "current";

pub fn parse<R: BufRead>(reader: R) -> Vec<ThreadInfo> {
    collect_threads(reader, classify)
}

pub fn parse_str(output: &str) -> Vec<ThreadInfo> {
    parse(output.as_bytes())
}

fn classify(line: &str) -> LineKind {
    if line.contains("===") && line.contains("Thread") {
        LineKind::Header(Some(ThreadInfo::new(0, 0, thread_name(line))))
    } else {
        LineKind::Other
    }
}

/// `=== Thread (worker) ===` -> `worker`
fn thread_name(line: &str) -> String {
    line.find('(')
        .and_then(|open| {
            let rest = &line[open + 1..];
            rest.find(')').filter(|&close| close > 0).map(|close| rest[..close].to_string())
        })
        .unwrap_or_else(|| DEFAULT_THREAD_NAME.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fallback_output() {
        let threads = parse_str(
            "=== Thread (current) ===\n\
             #0  0x000055d0c1e2a1b4 in capture at src/core/debugger.rs:210\n\
             #1  0x000055d0c1e2a2c0 in main\n",
        );
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].name, "current");
        assert_eq!(threads[0].thread_id, 0);
        assert_eq!(threads[0].frames.len(), 2);
        assert_eq!(threads[0].frames[0].symbol.as_deref(), Some("capture"));
        assert_eq!(threads[0].frames[0].line, 210);
        assert_eq!(threads[0].frames[1].symbol.as_deref(), Some("main"));
    }

    #[test]
    fn test_header_name_fallbacks() {
        assert_eq!(thread_name("=== Thread (worker-3) ==="), "worker-3");
        assert_eq!(thread_name("=== Thread () ==="), "current");
        assert_eq!(thread_name("=== Thread ==="), "current");
    }
}
