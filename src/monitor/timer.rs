//! Periodic timer thread.
//!
//! Wakes every [`TICK`] and fires the enabled actions once the accumulated
//! time reaches the configured interval. Options can be replaced while the
//! thread runs; the next tick picks them up.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::core::debugger::temp_base;

/// Sleep granularity, and so the resolution of the interval
pub const TICK: Duration = Duration::from_millis(100);

pub const DEFAULT_INTERVAL_MS: u64 = 2000;

/// What the timer does on each fire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerOptions {
    /// Zero means [`DEFAULT_INTERVAL_MS`]
    pub interval_ms: u64,
    pub do_stackdump: bool,
    pub do_health: bool,
    pub do_dump_fd: bool,
    /// Base path for stack dumps; generated on start when unset
    pub stackdump_file: Option<PathBuf>,
}

impl Default for TimerOptions {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            do_stackdump: false,
            do_health: false,
            do_dump_fd: false,
            stackdump_file: None,
        }
    }
}

impl TimerOptions {
    pub fn normalized(mut self) -> Self {
        if self.interval_ms == 0 {
            self.interval_ms = DEFAULT_INTERVAL_MS;
        }
        self
    }

    /// Whether any action is enabled
    pub fn has_action(&self) -> bool {
        self.do_stackdump || self.do_health || self.do_dump_fd
    }
}

/// Work performed when the timer fires. Called on the timer thread with no
/// lock held.
pub trait TimerActions: Send + Sync {
    /// Health report; `counter` is the 1-based fire count
    fn health(&self, counter: u64);

    /// Capture all threads into artifacts next to `base`
    fn stackdump(&self, base: &Path);

    fn dump_fd(&self);
}

/// Snapshot of a running timer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerStatus {
    pub options: TimerOptions,
    pub counter: u64,
}

struct TimerState {
    options: TimerOptions,
    counter: u64,
}

struct Shared {
    quit: AtomicBool,
    state: Mutex<TimerState>,
}

struct Running {
    shared: Arc<Shared>,
    handle: JoinHandle<()>,
}

/// Owner of at most one timer thread
pub struct TimerThread {
    actions: Arc<dyn TimerActions>,
    running: Mutex<Option<Running>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fill in a dump path if stack dumps are on and none was given
fn with_dump_path(mut options: TimerOptions) -> Result<TimerOptions> {
    if options.do_stackdump && options.stackdump_file.is_none() {
        let base = temp_base("stack.").context("Failed to create stack dump path")?;
        let mut name = base.into_os_string();
        name.push(".dump");
        options.stackdump_file = Some(PathBuf::from(name));
    }
    Ok(options)
}

impl TimerThread {
    pub fn new(actions: Arc<dyn TimerActions>) -> Self {
        Self {
            actions,
            running: Mutex::new(None),
        }
    }

    /// Start the timer, or reconfigure it in place if it is already running.
    /// A reconfigure keeps the fire counter and only replaces the stack dump
    /// path when the new options carry one.
    pub fn start(&self, options: TimerOptions) -> Result<TimerOptions> {
        let mut running = lock(&self.running);
        let options = options.normalized();

        if let Some(current) = running.as_ref() {
            // the registry lock keeps other starts out; the state lock is
            // only taken to copy and to update, never around file creation
            let mut options = options;
            if options.stackdump_file.is_none() {
                options.stackdump_file = lock(&current.shared.state).options.stackdump_file.clone();
            }
            let options = with_dump_path(options)?;
            log::debug!("timer reconfigured: {:?}", options);
            lock(&current.shared.state).options = options.clone();
            return Ok(options);
        }

        let options = with_dump_path(options)?;
        let shared = Arc::new(Shared {
            quit: AtomicBool::new(false),
            state: Mutex::new(TimerState {
                options: options.clone(),
                counter: 0,
            }),
        });

        let actions = Arc::clone(&self.actions);
        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("diag-timer".into())
            .spawn(move || run(&thread_shared, actions.as_ref()))
            .context("Failed to spawn timer thread")?;

        log::info!("timer started: {:?}", options);
        *running = Some(Running { shared, handle });
        Ok(options)
    }

    /// Stop and join the timer thread. Returns `false` if it was not running.
    /// An action in progress finishes first.
    pub fn stop(&self) -> bool {
        let mut running = lock(&self.running);
        let Some(current) = running.take() else {
            return false;
        };

        current.shared.quit.store(true, Ordering::Release);
        if current.handle.join().is_err() {
            log::warn!("timer thread panicked");
        }
        log::info!("timer stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        lock(&self.running).is_some()
    }

    pub fn status(&self) -> Option<TimerStatus> {
        let running = lock(&self.running);
        let current = running.as_ref()?;
        let state = lock(&current.shared.state);
        Some(TimerStatus {
            options: state.options.clone(),
            counter: state.counter,
        })
    }
}

impl Drop for TimerThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(shared: &Shared, actions: &dyn TimerActions) {
    let tick_ms = TICK.as_millis() as u64;
    let mut accumulated = 0u64;

    while !shared.quit.load(Ordering::Acquire) {
        thread::sleep(TICK);
        if shared.quit.load(Ordering::Acquire) {
            break;
        }

        accumulated += tick_ms;
        let fired = {
            let mut state = lock(&shared.state);
            if accumulated < state.options.interval_ms {
                None
            } else {
                accumulated = 0;
                state.counter += 1;
                Some((state.options.clone(), state.counter))
            }
        };

        if let Some((options, counter)) = fired {
            fire(&options, counter, actions);
        }
    }
}

fn fire(options: &TimerOptions, counter: u64, actions: &dyn TimerActions) {
    if options.do_health {
        actions.health(counter);
    }
    if options.do_stackdump {
        if let Some(path) = &options.stackdump_file {
            actions.stackdump(path);
        }
    }
    if options.do_dump_fd {
        actions.dump_fd();
    }
}
