//! Shared runtime state
//!
//! One [`Runtime`] is built at startup and handed to the console thread, the
//! timer and the crash handler. It owns the timer, the interactive flag and
//! the exit callback.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use colored::Colorize;

use crate::config::Config;
use crate::core::crash;
use crate::core::debugger::{DebugError, Debugger};
use crate::core::procfs;
use crate::lexer::Enumerator;
use crate::monitor::{TimerActions, TimerThread};
use crate::trace::ColorSchema;

type ExitCallback = Box<dyn Fn() + Send + Sync>;

/// Timer actions backed by the runtime's debugger; reports go to stderr
struct DiagnosticActions {
    debugger: Debugger,
    interactive: Arc<AtomicBool>,
}

impl TimerActions for DiagnosticActions {
    fn health(&self, counter: u64) {
        let line = format!("[*] timer triggered {}", counter);
        if self.interactive.load(Ordering::Relaxed) {
            eprintln!("{}", line.green());
        } else {
            eprintln!("{}", line);
        }
    }

    fn stackdump(&self, base: &Path) {
        let report = self.debugger.capture_self(base);
        eprintln!("[*] {}", report);
    }

    fn dump_fd(&self) {
        let stderr = io::stderr();
        let mut out = stderr.lock();
        if let Err(e) = procfs::dump_fds(&mut out) {
            let _ = writeln!(out, "{} {:#}", "[!] fd dump failed:".red(), e);
        }
    }
}

pub struct Runtime {
    config: Config,
    debugger: Debugger,
    interactive: Arc<AtomicBool>,
    timer: TimerThread,
    /// Fixed at construction from the process id
    crash_base: PathBuf,
    exit_callback: Mutex<Option<ExitCallback>>,
    enumerator: Option<Box<dyn Enumerator + Send + Sync>>,
}

impl Runtime {
    pub fn new(config: Config) -> Self {
        let schema = config.interactive.then_some(ColorSchema::ANSI);
        let debugger = Debugger::new(&config.debugger_path)
            .with_highlight(schema)
            .with_filter(config.thread_filter.clone());
        let interactive = Arc::new(AtomicBool::new(config.interactive));

        let actions = DiagnosticActions {
            debugger: debugger.clone(),
            interactive: Arc::clone(&interactive),
        };
        let crash_base = crash::crash_dump_base(&config.crash_dir, std::process::id());

        Debugger::allow_attach();

        Self {
            config,
            debugger,
            interactive,
            timer: TimerThread::new(Arc::new(actions)),
            crash_base,
            exit_callback: Mutex::new(None),
            enumerator: None,
        }
    }

    /// Enumerator used for console wildcard expansion
    pub fn with_enumerator(mut self, enumerator: Box<dyn Enumerator + Send + Sync>) -> Self {
        self.enumerator = Some(enumerator);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn debugger(&self) -> &Debugger {
        &self.debugger
    }

    pub fn timer(&self) -> &TimerThread {
        &self.timer
    }

    pub fn crash_base(&self) -> &Path {
        &self.crash_base
    }

    pub fn enumerator(&self) -> Option<&dyn Enumerator> {
        self.enumerator.as_deref().map(|e| e as &dyn Enumerator)
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive.load(Ordering::Relaxed)
    }

    pub fn set_interactive(&self, interactive: bool) {
        self.interactive.store(interactive, Ordering::Relaxed);
    }

    /// Styling for traces printed to the console
    pub fn schema(&self) -> ColorSchema {
        if self.is_interactive() {
            ColorSchema::ANSI
        } else {
            ColorSchema::PLAIN
        }
    }

    /// Route fatal signals to a capture at [`Runtime::crash_base`]
    pub fn install_crash_handler(&self) -> Result<(), DebugError> {
        crash::install(
            self.debugger.clone(),
            self.crash_base.clone(),
            Arc::clone(&self.interactive),
            ColorSchema::ANSI,
        )
    }

    pub fn set_exit_callback<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut slot = self.exit_callback.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Box::new(callback));
    }

    /// Run the exit callback. Without one the process exits with status 0.
    pub fn request_exit(&self) {
        let slot = self.exit_callback.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(callback) => {
                log::info!("exit requested");
                callback();
            }
            None => std::process::exit(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_crash_base_from_pid() {
        let runtime = Runtime::new(Config::default());
        let expected = format!("/tmp/segfault.{}.dump", std::process::id());
        assert_eq!(runtime.crash_base(), Path::new(&expected));
    }

    #[test]
    fn test_schema_follows_interactive() {
        let runtime = Runtime::new(Config::default());
        assert_eq!(runtime.schema(), ColorSchema::PLAIN);
        runtime.set_interactive(true);
        assert_eq!(runtime.schema(), ColorSchema::ANSI);
    }

    #[test]
    fn test_exit_callback_runs() {
        let runtime = Runtime::new(Config::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        runtime.set_exit_callback(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        runtime.request_exit();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
