//! Integration tests for the debugger bridge
//!
//! `/bin/echo` stands in for a debugger that exits successfully; a missing
//! binary forces the in-process fallback.
//!
//! Run with: cargo test --test debugger_test

#[cfg(test)]
mod tests {
    use std::fs;

    use stackwatch::core::crash::crash_dump_base;
    use stackwatch::core::debugger::{ArtifactPaths, CaptureOutcome, Debugger};
    use stackwatch::trace::{backtrace, ColorSchema, TraceFormat};

    #[test]
    fn test_missing_debugger_writes_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("dump");
        let debugger = Debugger::new("/nonexistent/gdb");

        let report = debugger.capture_self(&base);
        assert!(matches!(report.outcome, CaptureOutcome::Fallback { .. }));
        assert_eq!(report.format(), TraceFormat::Backtrace);
        assert_eq!(report.raw(), dir.path().join("dump.bt"));
        assert!(report.highlighted.is_none());

        let text = fs::read_to_string(report.raw()).unwrap();
        let threads = backtrace::parse_str(&text);
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].name, "current");
        assert!(!threads[0].frames.is_empty());
        assert!(report.to_string().contains("gdb failed"));
    }

    #[test]
    fn test_fallback_highlighted_sibling() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("dump");
        let debugger = Debugger::new("/nonexistent/gdb").with_highlight(Some(ColorSchema::ANSI));

        let report = debugger.capture_self(&base);
        let colored = dir.path().join("dump.bt.colored");
        assert_eq!(report.highlighted.as_deref(), Some(colored.as_path()));
        assert_eq!(report.artifact(), colored);
        assert!(fs::read_to_string(&colored).unwrap().contains("\x1b["));
    }

    #[test]
    fn test_successful_debugger_output_captured() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("dump");
        let debugger = Debugger::new("/bin/echo").with_highlight(Some(ColorSchema::ANSI));

        let report = debugger.capture(4242, &base);
        assert_eq!(report.outcome, CaptureOutcome::Debugger);
        assert_eq!(report.raw(), dir.path().join("dump.gdb"));
        assert!(!dir.path().join("dump.bt").exists());

        let args = fs::read_to_string(report.raw()).unwrap();
        assert_eq!(
            args.trim_end(),
            "-p 4242 -batch -ex set pagination off -ex thread apply all bt -ex quit"
        );

        // echo output holds no threads; the highlighted file is still written
        let colored = dir.path().join("dump.gdb.colored");
        assert_eq!(report.highlighted.as_deref(), Some(colored.as_path()));
        assert_eq!(fs::read_to_string(colored).unwrap(), "");
    }

    #[test]
    fn test_failing_debugger_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("dump");
        let debugger = Debugger::new("/bin/false");

        let report = debugger.capture_self(&base);
        match &report.outcome {
            CaptureOutcome::Fallback { reason } => assert!(reason.contains("exit")),
            other => panic!("expected fallback, got {:?}", other),
        }
        assert!(dir.path().join("dump.bt").exists());
    }

    #[test]
    fn test_artifact_names_for_crash_base() {
        let base = crash_dump_base(std::path::Path::new("/tmp"), 77);
        let paths = ArtifactPaths::new(&base);
        assert_eq!(paths.gdb, std::path::Path::new("/tmp/segfault.77.dump.gdb"));
        assert_eq!(paths.bt_colored, std::path::Path::new("/tmp/segfault.77.dump.bt.colored"));
    }
}
