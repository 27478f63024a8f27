//! Trace formatter with optional ANSI highlighting.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use super::filter::ThreadFilter;
use super::types::{StackFrame, ThreadInfo};
use super::TraceFormat;

/// Raw ANSI SGR sequences
pub mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD_CYAN: &str = "\x1b[1m\x1b[36m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const GRAY: &str = "\x1b[90m";
}

/// Style tokens written around each highlighted element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorSchema {
    pub reset: &'static str,
    pub header: &'static str,
    pub frame_index: &'static str,
    pub symbol: &'static str,
    pub params: &'static str,
    pub location: &'static str,
}

impl ColorSchema {
    pub const ANSI: ColorSchema = ColorSchema {
        reset: ansi::RESET,
        header: ansi::BOLD_CYAN,
        frame_index: ansi::CYAN,
        symbol: ansi::GREEN,
        params: ansi::GRAY,
        location: ansi::YELLOW,
    };

    /// No styling at all; output is plain text
    pub const PLAIN: ColorSchema = ColorSchema {
        reset: "",
        header: "",
        frame_index: "",
        symbol: "",
        params: "",
        location: "",
    };
}

impl Default for ColorSchema {
    fn default() -> Self {
        ColorSchema::ANSI
    }
}

pub fn write_thread_header<W: Write + ?Sized>(out: &mut W, thread: &ThreadInfo, s: &ColorSchema) -> io::Result<()> {
    writeln!(out, "{}{}{}", s.header, thread.header(), s.reset)
}

pub fn write_frame<W: Write + ?Sized>(out: &mut W, frame: &StackFrame, s: &ColorSchema) -> io::Result<()> {
    write!(out, "{}#{}{}", s.frame_index, frame.frame_number, s.reset)?;

    if let Some(address) = frame.address.as_deref().filter(|a| !a.is_empty()) {
        write!(out, " {} in ", address)?;
    }
    if let Some(symbol) = frame.symbol.as_deref().filter(|m| !m.is_empty()) {
        write!(out, "{}{}{}", s.symbol, symbol, s.reset)?;
    }
    if let Some(params) = frame.params.as_deref().filter(|p| !p.is_empty()) {
        write!(out, " {}{}{}", s.params, params, s.reset)?;
    }
    if let Some(location) = frame.location() {
        write!(out, " at {}{}{}", s.location, location, s.reset)?;
    }

    writeln!(out)
}

/// Render every included thread, separated by one blank line.
pub fn write_threads<W: Write + ?Sized>(
    out: &mut W,
    threads: &[ThreadInfo],
    s: &ColorSchema,
    filter: &ThreadFilter,
) -> io::Result<()> {
    for (index, thread) in threads.iter().filter(|t| filter.includes(t)).enumerate() {
        if index > 0 {
            writeln!(out)?;
        }
        write_thread_header(out, thread, s)?;
        for frame in &thread.frames {
            out.write_all(b"    ")?;
            write_frame(out, frame, s)?;
        }
    }
    Ok(())
}

pub fn render_threads(threads: &[ThreadInfo], s: &ColorSchema, filter: &ThreadFilter) -> String {
    let mut buf = Vec::new();
    // writing into a Vec cannot fail
    let _ = write_threads(&mut buf, threads, s, filter);
    String::from_utf8_lossy(&buf).into_owned()
}

/// Parse `input` as `format` and write the highlighted rendering to `out`.
pub fn highlight<R, W>(input: R, out: &mut W, format: TraceFormat, s: &ColorSchema, filter: &ThreadFilter) -> io::Result<()>
where
    R: io::BufRead,
    W: Write + ?Sized,
{
    let threads = format.parse(input);
    write_threads(out, &threads, s, filter)?;
    out.flush()
}

/// Highlight a saved artifact into a sibling file.
pub fn highlight_file(
    input: &Path,
    output: &Path,
    format: TraceFormat,
    s: &ColorSchema,
    filter: &ThreadFilter,
) -> io::Result<()> {
    let reader = BufReader::new(File::open(input)?);
    let mut writer = BufWriter::new(File::create(output)?);
    highlight(reader, &mut writer, format, s, filter)
}
