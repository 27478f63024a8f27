//! Stackwatch host - runs the diagnostics subsystem in this process
//!
//! Installs the crash handler, optionally starts the timer, and serves the
//! console on stdin. `--attach` and `--render` are one-shot modes.

use std::fs::{self, File};
use std::io::{self, BufReader, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use stackwatch::app::parse_interval_ms;
use stackwatch::lexer::{EnumerateError, Enumerator};
use stackwatch::monitor::TimerOptions;
use stackwatch::trace::{highlight, ColorSchema, TraceFormat};
use stackwatch::ui::cli::{ConsoleThread, EditorSource, ReaderSource};
use stackwatch::{Config, Runtime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

/// Stackwatch: stack trace capture for a running process
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// External debugger binary
    #[arg(long, default_value = "/usr/bin/gdb")]
    gdb: PathBuf,

    /// Directory for crash dumps
    #[arg(long, default_value = "/tmp")]
    crash_dir: PathBuf,

    /// Do not read commands from stdin
    #[arg(long, default_value_t = false)]
    no_console: bool,

    /// Do not install the crash handler
    #[arg(long, default_value_t = false)]
    no_crash_handler: bool,

    /// Colored output
    #[arg(long, value_enum, default_value_t = ColorMode::Auto)]
    color: ColorMode,

    /// Capture another process once and exit
    #[arg(long, value_name = "PID")]
    attach: Option<u32>,

    /// Highlight a saved .gdb or .bt file and exit
    #[arg(long, value_name = "FILE")]
    render: Option<PathBuf>,

    /// Timer: print a health ping on each fire
    #[arg(long, default_value_t = false)]
    timer_health: bool,

    /// Timer: capture a stack dump on each fire
    #[arg(long, default_value_t = false)]
    timer_stackdump: bool,

    /// Timer: dump open file descriptors on each fire
    #[arg(long, default_value_t = false)]
    timer_dump_fd: bool,

    /// Timer: stack dump base path
    #[arg(long, value_name = "FILE")]
    timer_file: Option<PathBuf>,

    /// Timer interval: 500, 500ms or 2s
    #[arg(long, value_name = "INTERVAL")]
    timer_interval: Option<String>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    /// Timer options if any timer flag was given
    fn timer_options(&self) -> Option<TimerOptions> {
        let requested = self.timer_health
            || self.timer_stackdump
            || self.timer_dump_fd
            || self.timer_file.is_some()
            || self.timer_interval.is_some();
        if !requested {
            return None;
        }

        let mut options = TimerOptions {
            do_health: self.timer_health,
            do_stackdump: self.timer_stackdump,
            do_dump_fd: self.timer_dump_fd,
            stackdump_file: self.timer_file.clone(),
            ..Default::default()
        };
        match self.timer_interval.as_deref().map(parse_interval_ms) {
            Some(Some(ms)) => options.interval_ms = ms,
            Some(None) => log::warn!("invalid timer interval, using {} ms", options.interval_ms),
            None => {}
        }
        if !options.has_action() {
            options.do_health = true;
        }
        Some(options)
    }
}

/// Flat listing of one directory for console wildcards
struct DirEnumerator {
    cwd: String,
}

impl DirEnumerator {
    fn current() -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        Ok(Self {
            cwd: cwd.display().to_string(),
        })
    }
}

impl Enumerator for DirEnumerator {
    fn context(&self) -> Option<&str> {
        Some(&self.cwd)
    }

    fn enumerate(
        &self,
        dir: Option<&str>,
        prefix: Option<&str>,
        _pattern: &str,
        item: &mut dyn FnMut(&str) -> bool,
    ) -> Result<(), EnumerateError> {
        let dir = dir.unwrap_or(&self.cwd);
        let entries = fs::read_dir(dir).map_err(|source| EnumerateError::Io {
            dir: dir.to_string(),
            source,
        })?;

        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| prefix.map_or(true, |p| name.starts_with(p)))
            .collect();
        names.sort();

        for name in names {
            if !item(&name) {
                break;
            }
        }
        Ok(())
    }
}

fn render(path: &Path, schema: &ColorSchema, config: &Config) -> Result<()> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let stdout = io::stdout();
    highlight(
        BufReader::new(file),
        &mut stdout.lock(),
        TraceFormat::for_path(path),
        schema,
        &config.thread_filter,
    )?;
    Ok(())
}

fn main() -> Result<()> {
    // 1. Parse command line arguments
    let args = Args::parse();

    // 2. Initialize logger with verbosity level
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }))
    .init();

    let interactive = match args.color {
        ColorMode::Auto => io::stdin().is_terminal(),
        ColorMode::Always => true,
        ColorMode::Never => false,
    };
    colored::control::set_override(interactive);

    let config = Config {
        debugger_path: args.gdb.clone(),
        crash_dir: args.crash_dir.clone(),
        interactive,
        ..Default::default()
    };
    let schema = if interactive { ColorSchema::ANSI } else { ColorSchema::PLAIN };

    log::info!("Stackwatch v{} initialized", env!("CARGO_PKG_VERSION"));
    log::debug!("{:?}", config);

    // 3. One-shot modes
    if let Some(path) = &args.render {
        return render(path, &schema, &config);
    }

    let runtime = Arc::new(Runtime::new(config).with_enumerator(Box::new(DirEnumerator::current()?)));

    if let Some(pid) = args.attach {
        let base = stackwatch::core::crash::crash_dump_base(&runtime.config().crash_dir, pid);
        let report = runtime.debugger().capture(pid, &base);
        eprintln!("[*] {}", report);
        return render(report.raw(), &schema, runtime.config());
    }

    // 4. Long-running mode
    if !args.no_crash_handler {
        runtime.install_crash_handler()?;
    }

    if let Some(options) = args.timer_options() {
        let options = runtime.timer().start(options)?;
        eprintln!(
            "[*] timer: interval={} ms stackdump={} health={} dump_fd={}",
            options.interval_ms, options.do_stackdump as u8, options.do_health as u8, options.do_dump_fd as u8
        );
    }

    if args.no_console {
        println!("[*] Stackwatch v{} - pid {}, no console", env!("CARGO_PKG_VERSION"), std::process::id());
        loop {
            std::thread::park();
        }
    }

    println!("[*] Stackwatch v{} - pid {}, 'h' for help", env!("CARGO_PKG_VERSION"), std::process::id());
    runtime.set_exit_callback(|| log::info!("console exit"));

    let console = if io::stdin().is_terminal() {
        ConsoleThread::spawn(Arc::clone(&runtime), EditorSource::new)?
    } else {
        ConsoleThread::spawn(Arc::clone(&runtime), ReaderSource::stdin)?
    };
    console.join();

    runtime.timer().stop();
    Ok(())
}
