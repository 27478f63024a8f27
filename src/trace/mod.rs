//! Trace module - parsing and rendering of captured stack traces.
//!
//! Two input formats are understood:
//! - GDB `thread apply all bt` output (`<base>.gdb`)
//! - the in-process fallback backtrace (`<base>.bt`)
//!
//! Both parse into the same [`ThreadInfo`]/[`StackFrame`] model, which the
//! formatter renders with an optional ANSI [`ColorSchema`].

pub mod backtrace;
pub mod filter;
pub mod format;
pub mod gdb;
pub mod types;

use std::io::BufRead;
use std::path::Path;

pub use filter::ThreadFilter;
pub use format::{highlight, highlight_file, ColorSchema};
pub use types::{StackFrame, ThreadInfo};

/// Format of a captured trace artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceFormat {
    /// Raw debugger output
    Gdb,
    /// In-process fallback backtrace
    Backtrace,
}

impl TraceFormat {
    /// Guess the format from an artifact path: `.bt` is a fallback backtrace,
    /// anything else is treated as debugger output.
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("bt") => TraceFormat::Backtrace,
            _ => TraceFormat::Gdb,
        }
    }

    pub fn parse<R: BufRead>(self, reader: R) -> Vec<ThreadInfo> {
        match self {
            TraceFormat::Gdb => gdb::parse(reader),
            TraceFormat::Backtrace => backtrace::parse(reader),
        }
    }
}

/// How a parser sees one input line
pub(crate) enum LineKind {
    /// Discard before any other matching
    Noise,
    /// A thread header; `None` if it looked like one but did not parse
    Header(Option<ThreadInfo>),
    /// Anything else; kept only if it is a frame line
    Other,
}

/// Shared line loop: headers open a new thread, `#` lines attach to the most
/// recently opened one, everything else is dropped. Read errors end the
/// parse with whatever was collected so far.
pub(crate) fn collect_threads<R, F>(mut reader: R, classify: F) -> Vec<ThreadInfo>
where
    R: BufRead,
    F: Fn(&str) -> LineKind,
{
    let mut threads: Vec<ThreadInfo> = Vec::new();
    let mut current: Option<usize> = None;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                log::debug!("trace read stopped: {}", e);
                break;
            }
        }
        let line = String::from_utf8_lossy(&buf);

        match classify(&line) {
            LineKind::Noise => {}
            LineKind::Header(Some(thread)) => {
                threads.push(thread);
                current = Some(threads.len() - 1);
            }
            LineKind::Header(None) => current = None,
            LineKind::Other => {
                let Some(index) = current else { continue };
                if !line.trim_start_matches([' ', '\t']).starts_with('#') {
                    continue;
                }
                if let Some(frame) = gdb::parse_frame(&line) {
                    threads[index].frames.push(frame);
                }
            }
        }
    }

    threads
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_for_path() {
        assert_eq!(TraceFormat::for_path(Path::new("/tmp/x.dump.bt")), TraceFormat::Backtrace);
        assert_eq!(TraceFormat::for_path(Path::new("/tmp/x.dump.gdb")), TraceFormat::Gdb);
        assert_eq!(TraceFormat::for_path(Path::new("trace")), TraceFormat::Gdb);
    }

    #[test]
    fn test_malformed_input_never_fails() {
        let threads = TraceFormat::Gdb.parse(&b"\xff\xfe garbage\n#\n#x\nThread\n"[..]);
        assert!(threads.is_empty());
    }
}
