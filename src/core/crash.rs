//! Crash handler - fatal signal capture
//!
//! On SIGSEGV, SIGABRT, SIGBUS or SIGFPE the handler forks. The child
//! resets the handlers, captures all threads of the crashed process through
//! the [`Debugger`] and exits; the parent waits for it and then terminates
//! with `128 + signal`. The crashed process is never resumed.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use nix::libc;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::sys::wait::waitpid;
use nix::unistd::{fork, getpid, ForkResult};

use super::debugger::{DebugError, Debugger};
use crate::trace::{highlight, ColorSchema};

/// Signals routed to the crash handler
pub const CRASH_SIGNALS: [Signal; 4] = [Signal::SIGSEGV, Signal::SIGABRT, Signal::SIGBUS, Signal::SIGFPE];

/// State the signal handler reads; set once by [`install`]
struct CrashContext {
    debugger: Debugger,
    base: PathBuf,
    /// Stream the capture to the console when set
    interactive: Arc<AtomicBool>,
    schema: ColorSchema,
}

static CRASH_CONTEXT: OnceLock<CrashContext> = OnceLock::new();

/// `<crash_dir>/segfault.<pid>.dump`
pub fn crash_dump_base(crash_dir: &Path, pid: u32) -> PathBuf {
    crash_dir.join(format!("segfault.{}.dump", pid))
}

/// Exit status of a process that crashed with `signal`
pub fn exit_status_for(signal: i32) -> i32 {
    128 + signal
}

/// Install the crash handler for every signal in [`CRASH_SIGNALS`].
///
/// Only the first call takes effect; the process keeps one crash handler
/// for its whole lifetime.
pub fn install(
    debugger: Debugger,
    base: PathBuf,
    interactive: Arc<AtomicBool>,
    schema: ColorSchema,
) -> Result<(), DebugError> {
    let context = CrashContext {
        debugger,
        base,
        interactive,
        schema,
    };
    if CRASH_CONTEXT.set(context).is_err() {
        log::debug!("crash handler already installed");
        return Ok(());
    }

    Debugger::allow_attach();

    let action = SigAction::new(SigHandler::Handler(on_crash), SaFlags::empty(), SigSet::empty());
    for signal in CRASH_SIGNALS {
        // SAFETY: on_crash only touches state that is fully initialized above
        unsafe { sigaction(signal, &action) }.map_err(DebugError::Signal)?;
    }

    if let Some(context) = CRASH_CONTEXT.get() {
        log::info!("crash handler installed, dumps go to {}.*", context.base.display());
    }
    Ok(())
}

/// Whether [`install`] has run
pub fn is_installed() -> bool {
    CRASH_CONTEXT.get().is_some()
}

extern "C" fn on_crash(signal: libc::c_int) {
    let crashed = getpid();

    // SAFETY: the child only runs the capture and leaves through _exit
    match unsafe { fork() } {
        Ok(ForkResult::Child) => {
            reset_handlers();
            capture_crash(crashed.as_raw() as u32, signal);
            // SAFETY: terminate the child without running atexit handlers
            unsafe { libc::_exit(0) }
        }
        Ok(ForkResult::Parent { child }) => {
            let _ = waitpid(child, None);
        }
        Err(_) => {}
    }

    // SAFETY: the crashed process must not return into the faulting code
    unsafe { libc::_exit(exit_status_for(signal)) }
}

fn reset_handlers() {
    let default = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    for signal in CRASH_SIGNALS {
        // SAFETY: restoring the default disposition
        let _ = unsafe { sigaction(signal, &default) };
    }
}

fn capture_crash(pid: u32, signal: libc::c_int) {
    let Some(context) = CRASH_CONTEXT.get() else {
        return;
    };

    let name = Signal::try_from(signal).map(|s| s.as_str()).unwrap_or("unknown signal");
    eprintln!("[!] process {} caught {}, capturing threads", pid, name);

    let report = context.debugger.capture(pid, &context.base);

    if context.interactive.load(Ordering::Acquire) {
        match std::fs::File::open(report.raw()) {
            Ok(file) => {
                let stdout = std::io::stdout();
                let mut out = stdout.lock();
                let _ = highlight(
                    std::io::BufReader::new(file),
                    &mut out,
                    report.format(),
                    &context.schema,
                    context.debugger.filter(),
                );
            }
            Err(e) => eprintln!("[!] cannot read {}: {}", report.raw().display(), e),
        }
    }

    eprintln!("{}", report);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crash_dump_base() {
        assert_eq!(
            crash_dump_base(Path::new("/tmp"), 4242),
            Path::new("/tmp/segfault.4242.dump")
        );
    }

    #[test]
    fn test_exit_status() {
        assert_eq!(exit_status_for(libc::SIGSEGV), 139);
        assert_eq!(exit_status_for(libc::SIGABRT), 134);
    }
}
