//! Debugger - external debugger bridge with an in-process fallback
//!
//! Runs `gdb -batch` against a target process and stores its raw output in
//! `<base>.gdb`. When the debugger is missing or fails, the current thread is
//! unwound in-process and written to `<base>.bt` instead, so every capture
//! leaves some artifact behind.

use std::ffi::OsString;
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;

use crate::trace::{highlight_file, ColorSchema, ThreadFilter, TraceFormat};

/// Default location of the external debugger
pub const DEFAULT_DEBUGGER_PATH: &str = "/usr/bin/gdb";

/// Upper bound on fallback frames
const MAX_FALLBACK_FRAMES: usize = 64;

/// Debugger-specific errors
#[derive(Error, Debug)]
pub enum DebugError {
    #[error("Failed to launch debugger {path}: {source}")]
    Spawn {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Debugger exited with {status}")]
    DebuggerFailed { status: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to fork: {0}")]
    Fork(#[source] nix::Error),

    #[error("Failed to install signal handler: {0}")]
    Signal(#[source] nix::Error),
}

impl DebugError {
    fn io(path: &Path, source: io::Error) -> Self {
        DebugError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Artifact files derived from one base path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub base: PathBuf,
    /// Raw debugger output
    pub gdb: PathBuf,
    pub gdb_colored: PathBuf,
    /// Fallback backtrace
    pub bt: PathBuf,
    pub bt_colored: PathBuf,
}

impl ArtifactPaths {
    pub fn new(base: &Path) -> Self {
        let with = |suffix: &str| {
            let mut s = OsString::from(base.as_os_str());
            s.push(suffix);
            PathBuf::from(s)
        };
        Self {
            base: base.to_path_buf(),
            gdb: with(".gdb"),
            gdb_colored: with(".gdb.colored"),
            bt: with(".bt"),
            bt_colored: with(".bt.colored"),
        }
    }

    /// Remove the base file and every artifact, ignoring missing ones
    pub fn remove_all(&self) {
        for path in [&self.base, &self.gdb, &self.gdb_colored, &self.bt, &self.bt_colored] {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Capture progress: `Idle -> Forked -> Succeeded | Failed -> FallbackCapture -> Done`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Forked { child: u32 },
    Succeeded,
    Failed { reason: String },
    FallbackCapture,
    Done,
}

impl CaptureState {
    fn advance(&mut self, next: CaptureState) {
        log::debug!("capture: {:?} -> {:?}", self, next);
        *self = next;
    }
}

/// Which path produced the artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// The debugger ran and exited successfully
    Debugger,
    /// The debugger was unavailable or failed; the fallback trace was written
    Fallback { reason: String },
}

/// Result of one capture. Never an error: failures are reported here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureReport {
    pub outcome: CaptureOutcome,
    pub paths: ArtifactPaths,
    /// Highlighted rendering, when requested and written
    pub highlighted: Option<PathBuf>,
}

impl CaptureReport {
    /// Raw artifact: `<base>.gdb` or `<base>.bt`
    pub fn raw(&self) -> &Path {
        match self.outcome {
            CaptureOutcome::Debugger => &self.paths.gdb,
            CaptureOutcome::Fallback { .. } => &self.paths.bt,
        }
    }

    pub fn format(&self) -> TraceFormat {
        match self.outcome {
            CaptureOutcome::Debugger => TraceFormat::Gdb,
            CaptureOutcome::Fallback { .. } => TraceFormat::Backtrace,
        }
    }

    /// The most useful artifact: highlighted if present, else raw
    pub fn artifact(&self) -> &Path {
        self.highlighted.as_deref().unwrap_or_else(|| self.raw())
    }
}

impl fmt::Display for CaptureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.highlighted.is_some() { "highlighted" } else { "plain" };
        match &self.outcome {
            CaptureOutcome::Debugger => {
                write!(f, "stackdump: gdb {} output: {}", kind, self.artifact().display())
            }
            CaptureOutcome::Fallback { reason } => write!(
                f,
                "stackdump: gdb failed ({}), current thread {} output: {}",
                reason,
                kind,
                self.artifact().display()
            ),
        }
    }
}

/// Bridge to the external debugger
#[derive(Debug, Clone)]
pub struct Debugger {
    /// Debugger binary
    path: PathBuf,
    /// Schema for the highlighted sibling file; `None` skips it
    highlight: Option<ColorSchema>,
    /// Threads hidden from highlighted output
    filter: ThreadFilter,
}

impl Debugger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            highlight: None,
            filter: ThreadFilter::default(),
        }
    }

    pub fn with_highlight(mut self, schema: Option<ColorSchema>) -> Self {
        self.highlight = schema;
        self
    }

    pub fn with_filter(mut self, filter: ThreadFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Same debugger, without the highlighted sibling file
    pub fn plain(&self) -> Self {
        self.clone().with_highlight(None)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn filter(&self) -> &ThreadFilter {
        &self.filter
    }

    /// Capture all threads of `pid` into artifacts next to `base`.
    ///
    /// Blocks until the debugger exits or the fallback is written.
    pub fn capture(&self, pid: u32, base: &Path) -> CaptureReport {
        let paths = ArtifactPaths::new(base);
        let mut state = CaptureState::Idle;

        log::debug!("stackdump: pid {} -> {}", pid, paths.gdb.display());

        let outcome = match self.run_debugger(pid, &paths.gdb, &mut state) {
            Ok(()) => {
                state.advance(CaptureState::Succeeded);
                CaptureOutcome::Debugger
            }
            Err(e) => {
                log::warn!("stackdump: debugger failed: {}", e);
                let reason = e.to_string();
                state.advance(CaptureState::Failed { reason: reason.clone() });
                state.advance(CaptureState::FallbackCapture);
                if let Err(e) = write_fallback(&paths.bt) {
                    log::warn!("stackdump: fallback trace failed: {}", e);
                }
                CaptureOutcome::Fallback { reason }
            }
        };

        let mut report = CaptureReport {
            outcome,
            paths,
            highlighted: None,
        };

        if let Some(schema) = &self.highlight {
            let colored = match report.outcome {
                CaptureOutcome::Debugger => report.paths.gdb_colored.clone(),
                CaptureOutcome::Fallback { .. } => report.paths.bt_colored.clone(),
            };
            match highlight_file(report.raw(), &colored, report.format(), schema, &self.filter) {
                Ok(()) => report.highlighted = Some(colored),
                Err(e) => log::warn!("stackdump: failed to highlight {}: {}", report.raw().display(), e),
            }
        }

        state.advance(CaptureState::Done);
        report
    }

    /// Capture the calling process
    pub fn capture_self(&self, base: &Path) -> CaptureReport {
        self.capture(std::process::id(), base)
    }

    fn run_debugger(&self, pid: u32, output: &Path, state: &mut CaptureState) -> Result<(), DebugError> {
        let stdout = File::create(output).map_err(|e| DebugError::io(output, e))?;
        let stderr = stdout.try_clone().map_err(|e| DebugError::io(output, e))?;

        let mut child = Command::new(&self.path)
            .arg("-p")
            .arg(pid.to_string())
            .arg("-batch")
            .args(["-ex", "set pagination off"])
            .args(["-ex", "thread apply all bt"])
            .args(["-ex", "quit"])
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .map_err(|source| DebugError::Spawn {
                path: self.path.display().to_string(),
                source,
            })?;
        state.advance(CaptureState::Forked { child: child.id() });

        let status = child.wait().map_err(|e| DebugError::io(&self.path, e))?;
        if status.success() {
            Ok(())
        } else {
            Err(DebugError::DebuggerFailed {
                status: status.to_string(),
            })
        }
    }
}

impl Default for Debugger {
    fn default() -> Self {
        Self::new(DEFAULT_DEBUGGER_PATH)
    }
}

/// Unwind the current thread in-process and write it in the fallback
/// backtrace format, one frame per return address.
pub fn write_fallback(path: &Path) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "=== Thread (current) ===")?;

    let mut index = 0usize;
    let mut written: io::Result<()> = Ok(());
    backtrace::trace(|frame| {
        let mut line = format!("#{} {:#018x}", index, frame.ip() as usize);
        let mut resolved = false;
        backtrace::resolve_frame(frame, |symbol| {
            if resolved {
                return;
            }
            resolved = true;
            if let Some(name) = symbol.name() {
                line.push_str(&format!(" in {:#}", name));
            }
            if let (Some(file), Some(lineno)) = (symbol.filename(), symbol.lineno()) {
                line.push_str(&format!(" at {}:{}", file.display(), lineno));
            }
        });

        if let Err(e) = writeln!(out, "{}", line) {
            written = Err(e);
            return false;
        }
        index += 1;
        index < MAX_FALLBACK_FRAMES
    });
    written?;

    out.flush()
}

/// Unique base path for a capture, e.g. `/tmp/stackdump.a1B2c3`. The
/// placeholder file is removed again; only the name is reserved.
pub fn temp_base(prefix: &str) -> io::Result<PathBuf> {
    let file = tempfile::Builder::new().prefix(prefix).tempfile()?;
    let path = file.path().to_path_buf();
    file.close()?;
    Ok(path)
}

// Linux-specific implementations
#[cfg(target_os = "linux")]
impl Debugger {
    /// Let any process ptrace us, so a debugger spawned by a child (crash
    /// capture) or by ourselves can attach under Yama `ptrace_scope = 1`.
    pub fn allow_attach() {
        use nix::libc;

        // SAFETY: prctl with integer arguments only; no memory is passed.
        let rc = unsafe { libc::prctl(libc::PR_SET_PTRACER, libc::PR_SET_PTRACER_ANY, 0, 0, 0) };
        if rc != 0 {
            log::debug!("prctl(PR_SET_PTRACER) failed: {}", io::Error::last_os_error());
        }
    }
}

#[cfg(not(target_os = "linux"))]
impl Debugger {
    pub fn allow_attach() {}
}
