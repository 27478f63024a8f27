//! Integration tests for the diagnostics console
//!
//! Run with: cargo test --test console_test

#[cfg(test)]
mod tests {
    use std::ops::ControlFlow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use stackwatch::ui::cli::{Console, ConsoleThread, ReaderSource};
    use stackwatch::{Config, Runtime};

    /// Runtime whose debugger never exists, so captures use the fallback
    fn runtime() -> Arc<Runtime> {
        let crash_dir = std::env::temp_dir();
        Arc::new(Runtime::new(Config {
            debugger_path: "/nonexistent/gdb".into(),
            crash_dir,
            ..Default::default()
        }))
    }

    fn run(console: &Console, line: &str) -> (ControlFlow<()>, String, String) {
        let mut out = Vec::new();
        let mut diag = Vec::new();
        let flow = console.handle_line(line, &mut out, &mut diag);
        (
            flow,
            String::from_utf8_lossy(&out).into_owned(),
            String::from_utf8_lossy(&diag).into_owned(),
        )
    }

    #[test]
    fn test_unknown_command_continues() {
        let console = Console::new(runtime());
        let (flow, out, diag) = run(&console, "frobnicate now");
        assert_eq!(flow, ControlFlow::Continue(()));
        assert!(out.is_empty());
        assert!(diag.contains("unknown command: 'frobnicate'"));
        assert_eq!(diag.lines().count(), 1);
    }

    #[test]
    fn test_parse_error_continues() {
        let console = Console::new(runtime());
        let (flow, _, diag) = run(&console, "bt -f \"unterminated");
        assert_eq!(flow, ControlFlow::Continue(()));
        assert!(diag.contains("parse error"));
    }

    #[test]
    fn test_blank_line_is_ignored() {
        let console = Console::new(runtime());
        let (flow, out, diag) = run(&console, "   ");
        assert_eq!(flow, ControlFlow::Continue(()));
        assert!(out.is_empty() && diag.is_empty());
    }

    #[test]
    fn test_help_lists_commands() {
        let console = Console::new(runtime());
        let (_, out, _) = run(&console, "H");
        for cmd in ["bt", "list-fd", "timer", "status", "exit"] {
            assert!(out.contains(cmd), "help is missing {}", cmd);
        }
    }

    #[test]
    fn test_timer_commands_and_status() {
        let runtime = runtime();
        let console = Console::new(runtime.clone());

        let (_, out, _) = run(&console, "\\s");
        assert!(out.contains("=== status ==="));
        assert!(out.contains("timer: stopped"));
        assert!(out.contains("=== end status ==="));

        let (_, _, diag) = run(&console, "w -w 60s");
        assert!(diag.contains("timer: interval=60000 ms stackdump=0 health=1 dump_fd=0"));
        assert!(runtime.timer().is_running());

        let (_, out, _) = run(&console, "status");
        assert!(out.contains("timer: running"));
        assert!(out.contains("interval_ms: 60000"));
        assert!(out.contains("counter: 0"));

        let (_, _, diag) = run(&console, "timer -q");
        assert!(diag.contains("timer stopped"));
        assert!(!runtime.timer().is_running());
    }

    #[test]
    fn test_threads_and_fds() {
        let console = Console::new(runtime());
        let (_, out, _) = run(&console, "threads");
        assert!(out.contains("=== end threads ==="));

        let (_, out, _) = run(&console, "f");
        assert!(out.contains("=== Open file descriptors ==="));
        assert!(out.contains("=== end fd ==="));
    }

    #[test]
    fn test_backtrace_falls_back_and_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("manual");
        let console = Console::new(runtime());

        let line = format!("bt -f {}", base.display());
        let (flow, out, diag) = run(&console, &line);
        assert_eq!(flow, ControlFlow::Continue(()));
        assert!(diag.contains("stackdump: gdb failed"));
        assert!(out.contains("\"current\""));
        assert!(dir.path().join("manual.bt").exists());
        assert!(!dir.path().join("manual.bt.colored").exists());
    }

    #[test]
    fn test_exit_runs_callback_and_breaks() {
        let runtime = runtime();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        runtime.set_exit_callback(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let console = Console::new(runtime);
        let (flow, _, _) = run(&console, "EXIT");
        assert_eq!(flow, ControlFlow::Break(()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_console_thread_ends_at_end_of_input() {
        let runtime = runtime();
        let console = ConsoleThread::spawn(runtime.clone(), || {
            ReaderSource::new(&b"nonsense\nw -w 60s\nw -q\n"[..])
        })
        .unwrap();
        console.join();
        assert!(!runtime.timer().is_running());
    }

    #[test]
    fn test_console_thread_survives_invalid_utf8() {
        let runtime = runtime();
        let console = ConsoleThread::spawn(runtime.clone(), || {
            ReaderSource::new(&b"\xff\xfe\nw -w 60s\n"[..])
        })
        .unwrap();
        console.join();

        // the line after the unreadable one still ran
        assert!(runtime.timer().is_running());
        assert!(runtime.timer().stop());
    }

    #[test]
    fn test_console_thread_stops_on_exit() {
        let runtime = runtime();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        runtime.set_exit_callback(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        // lines after exit are never read
        let console = ConsoleThread::spawn(runtime, || ReaderSource::new(&b"exit\nexit\n"[..])).unwrap();
        console.join();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
