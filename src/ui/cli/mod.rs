//! CLI - diagnostics console
//!
//! A background thread reads lines from a [`LineSource`], tokenizes them
//! with the lexer and dispatches console commands. Command failures print
//! one diagnostic line and the loop continues; only end of input, `exit`
//! or [`ConsoleThread::stop`] end it.

mod source;

pub use source::{ConsolePrompt, EditorSource, LineSource, ReaderSource};

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use colored::Colorize;

use crate::app::{parse_command, ConsoleCommand, Runtime, TimerCommand};
use crate::core::debugger::temp_base;
use crate::core::procfs;
use crate::lexer;
use crate::trace::highlight;

/// Command dispatcher bound to a runtime
pub struct Console {
    runtime: Arc<Runtime>,
}

impl Console {
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Self { runtime }
    }

    /// Tokenize and run one input line. Traces go to `out`, diagnostics to
    /// `diag`. Returns `Break` when the console should stop.
    pub fn handle_line(&self, line: &str, out: &mut dyn Write, diag: &mut dyn Write) -> ControlFlow<()> {
        let argv = match lexer::parse(line, self.runtime.enumerator()) {
            Ok(argv) => argv,
            Err(e) => {
                let _ = writeln!(diag, "{} parse error: {}", "[!]".red(), e);
                return ControlFlow::Continue(());
            }
        };
        let Some(command) = parse_command(&argv) else {
            return ControlFlow::Continue(());
        };

        log::debug!("console: {:?}", command);
        match self.execute(command, out, diag) {
            Ok(flow) => flow,
            Err(e) => {
                log::warn!("console output failed: {}", e);
                ControlFlow::Continue(())
            }
        }
    }

    pub fn execute(
        &self,
        command: ConsoleCommand,
        out: &mut dyn Write,
        diag: &mut dyn Write,
    ) -> io::Result<ControlFlow<()>> {
        match command {
            ConsoleCommand::Backtrace { file } => self.backtrace(file, out, diag)?,
            ConsoleCommand::Threads => {
                if let Err(e) = procfs::dump_threads(out) {
                    writeln!(diag, "{} threads: {:#}", "[!]".red(), e)?;
                }
            }
            ConsoleCommand::ListFd => {
                if let Err(e) = procfs::dump_fds(out) {
                    writeln!(diag, "{} list-fd: {:#}", "[!]".red(), e)?;
                }
            }
            ConsoleCommand::Timer(TimerCommand::Stop) => {
                self.runtime.timer().stop();
                writeln!(diag, "[*] timer stopped")?;
            }
            ConsoleCommand::Timer(TimerCommand::Start(options)) => match self.runtime.timer().start(options) {
                Ok(o) => writeln!(
                    diag,
                    "[*] timer: interval={} ms stackdump={} health={} dump_fd={}",
                    o.interval_ms, o.do_stackdump as u8, o.do_health as u8, o.do_dump_fd as u8
                )?,
                Err(e) => writeln!(diag, "{} timer: {:#}", "[!]".red(), e)?,
            },
            ConsoleCommand::Status => self.status(out)?,
            ConsoleCommand::Help => print_help(out)?,
            ConsoleCommand::Exit => {
                self.runtime.request_exit();
                return Ok(ControlFlow::Break(()));
            }
            ConsoleCommand::Unknown(name) => {
                writeln!(diag, "{} unknown command: '{}' (h for help)", "[!]".red(), name)?;
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn backtrace(&self, file: Option<PathBuf>, out: &mut dyn Write, diag: &mut dyn Write) -> io::Result<()> {
        let keep = file.is_some();
        let base = match file {
            Some(file) => file,
            None => match temp_base("stackdump.") {
                Ok(base) => base,
                Err(e) => {
                    writeln!(diag, "{} bt: cannot create temp file: {}", "[!]".red(), e)?;
                    return Ok(());
                }
            },
        };

        let debugger = self.runtime.debugger().plain();
        let report = debugger.capture_self(&base);
        writeln!(diag, "[*] {}", report)?;

        match File::open(report.raw()) {
            Ok(raw) => highlight(
                BufReader::new(raw),
                out,
                report.format(),
                &self.runtime.schema(),
                debugger.filter(),
            )?,
            Err(e) => writeln!(diag, "{} bt: cannot read {}: {}", "[!]".red(), report.raw().display(), e)?,
        }

        if !keep {
            report.paths.remove_all();
        }
        Ok(())
    }

    fn status(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "{}", "=== status ===".bold().cyan())?;
        match self.runtime.timer().status() {
            None => writeln!(out, "timer: stopped")?,
            Some(status) => {
                let o = &status.options;
                writeln!(out, "timer: running")?;
                writeln!(out, "  interval_ms: {}", o.interval_ms)?;
                writeln!(out, "  stackdump: {}", o.do_stackdump as u8)?;
                if let Some(file) = &o.stackdump_file {
                    writeln!(out, "  stackdump_file: {}", file.display())?;
                }
                writeln!(out, "  health: {}", o.do_health as u8)?;
                writeln!(out, "  dump_fd: {}", o.do_dump_fd as u8)?;
                writeln!(out, "  counter: {}", status.counter)?;
            }
        }
        writeln!(out, "crash dump: {}.*", self.runtime.crash_base().display())?;
        writeln!(out, "{}", "=== end status ===".bold().cyan())
    }
}

/// Print help message
pub fn print_help(out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "{}", "Console Commands".bold().cyan())?;
    writeln!(out, "{}", "═".repeat(50).cyan())?;
    let rows = [
        ("bt [-f FILE]", "Capture all threads and print them (aliases: backtrace, stackdump)"),
        ("t", "List threads (threads)"),
        ("f", "List open file descriptors (list-fd)"),
        ("w [-s] [-h] [-d]", "Start or update the timer: stackdump, health, fd dump (timer)"),
        ("  [-f FILE]", "Timer stack dump base path"),
        ("  [-w INTERVAL]", "Interval: 500, 500ms or 2s"),
        ("  [-q]", "Stop the timer"),
        ("\\s", "Show timer status (status)"),
        ("h", "Show this help (help)"),
        ("exit", "Leave the console"),
    ];
    for (cmd, what) in rows {
        writeln!(out, "  {:<18} {}", cmd.green(), what)?;
    }
    Ok(())
}

/// The console loop running on its own thread
pub struct ConsoleThread {
    quit: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ConsoleThread {
    /// Spawn the console. The line source is built on the console thread.
    pub fn spawn<F, S>(runtime: Arc<Runtime>, make_source: F) -> Result<Self>
    where
        F: FnOnce() -> S + Send + 'static,
        S: LineSource,
    {
        let quit = Arc::new(AtomicBool::new(false));
        let thread_quit = Arc::clone(&quit);

        let handle = thread::Builder::new()
            .name("diag-console".into())
            .spawn(move || {
                let console = Console::new(runtime);
                run_loop(&console, make_source(), &thread_quit);
            })
            .context("Failed to spawn console thread")?;

        log::info!("console started");
        Ok(Self {
            quit,
            handle: Some(handle),
        })
    }

    /// Ask the loop to end before its next read. A read already blocked
    /// waits for its line first.
    pub fn stop(&self) {
        self.quit.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("console thread panicked");
            }
        }
        log::info!("console stopped");
    }
}

fn run_loop<S: LineSource>(console: &Console, mut source: S, quit: &AtomicBool) {
    while !quit.load(Ordering::Acquire) {
        let line = match source.read_line() {
            Ok(Some(line)) => line,
            Ok(None) => {
                log::debug!("console: end of input");
                break;
            }
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                eprintln!("{} unreadable input line: {}", "[!]".red(), e);
                continue;
            }
            Err(e) => {
                log::error!("console read failed: {}", e);
                break;
            }
        };

        let stdout = io::stdout();
        let stderr = io::stderr();
        let flow = console.handle_line(&line, &mut stdout.lock(), &mut stderr.lock());
        if flow.is_break() {
            break;
        }
    }
}
