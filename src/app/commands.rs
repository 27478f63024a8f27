//! Command processing
//!
//! Console command model. Input arrives already tokenized by the lexer.

use std::path::PathBuf;

use crate::monitor::TimerOptions;

/// Commands understood by the diagnostics console
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Capture all threads and print them; `-f FILE` keeps the artifacts
    Backtrace { file: Option<PathBuf> },
    /// List threads of this process
    Threads,
    /// List open file descriptors
    ListFd,
    /// Start, reconfigure or stop the timer
    Timer(TimerCommand),
    /// Show timer state
    Status,
    /// Show help
    Help,
    /// Run the exit callback, or terminate
    Exit,
    /// Unknown command
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerCommand {
    Start(TimerOptions),
    Stop,
}

/// Map an argument vector to a command. `None` for an empty line.
pub fn parse_command(argv: &[String]) -> Option<ConsoleCommand> {
    let (cmd, args) = argv.split_first()?;

    let command = match cmd.to_ascii_lowercase().as_str() {
        "bt" | "backtrace" | "stackdump" => ConsoleCommand::Backtrace {
            file: option_value(args, &["-f", "--file"]).map(PathBuf::from),
        },
        "t" | "threads" => ConsoleCommand::Threads,
        "f" | "list-fd" => ConsoleCommand::ListFd,
        "w" | "timer" => ConsoleCommand::Timer(parse_timer_args(args)),
        // the lexer turns a typed `\s` into `s`
        "\\s" | "s" | "status" => ConsoleCommand::Status,
        "h" | "help" => ConsoleCommand::Help,
        "exit" => ConsoleCommand::Exit,
        _ => ConsoleCommand::Unknown(cmd.clone()),
    };
    Some(command)
}

/// Value following the first occurrence of any of `names`
fn option_value<'a>(args: &'a [String], names: &[&str]) -> Option<&'a str> {
    args.iter()
        .position(|a| names.contains(&a.as_str()))
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// `[-s] [-h] [-d] [-f FILE] [-w INTERVAL] [-q]`
///
/// A bare argument starting with a digit is an interval. Invalid intervals
/// are ignored. With no action flag, health pings are enabled.
pub fn parse_timer_args(args: &[String]) -> TimerCommand {
    let mut options = TimerOptions::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-q" | "--quit" => return TimerCommand::Stop,
            "-s" | "--stackdump" => options.do_stackdump = true,
            "-h" | "--health" => options.do_health = true,
            "-d" | "--dump-fd" => options.do_dump_fd = true,
            "-f" | "--file" => {
                if let Some(file) = iter.next() {
                    options.stackdump_file = Some(PathBuf::from(file));
                }
            }
            "-w" | "--interval" => {
                if let Some(ms) = iter.next().and_then(|v| parse_interval_ms(v)) {
                    options.interval_ms = ms;
                }
            }
            other if other.starts_with(|c: char| c.is_ascii_digit()) => {
                if let Some(ms) = parse_interval_ms(other) {
                    options.interval_ms = ms;
                }
            }
            other => log::debug!("timer: ignoring argument {:?}", other),
        }
    }

    if !options.has_action() {
        options.do_health = true;
    }
    TimerCommand::Start(options)
}

/// Parse `<n>`, `<n>ms` or `<n>s` into milliseconds. An unknown suffix is
/// read as milliseconds; zero, non-numeric or overflowing input is `None`.
pub fn parse_interval_ms(s: &str) -> Option<u64> {
    let s = s.trim();
    let digits = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if digits == 0 {
        return None;
    }

    let value: u64 = s[..digits].parse().ok()?;
    let unit = s[digits..].trim();
    let ms = if unit.eq_ignore_ascii_case("s") {
        value.checked_mul(1000)?
    } else {
        value
    };

    (ms > 0).then_some(ms)
}
