//! GDB output parser
//!
//! Understands the output of `gdb -batch -ex "thread apply all bt"`:
//!
//! ```text
//! Thread 2 (Thread 0x7f1a8b0196c0 (LWP 3116497) "pool-1"):
//! #0  0x00007f1a8d2a3f9d in syscall () at ../sysdeps/unix/sysv/linux/x86_64/syscall.S:38
//! #1  0x000055d0c1e2a1b4 in worker_loop (ctx=0x55d0c2f0) at src/worker.c:88
//! ```
//!
//! The frame grammar is shared with the in-process backtrace format.

use std::io::BufRead;

use super::types::{StackFrame, ThreadInfo};
use super::{collect_threads, LineKind};

/// Lines gdb prints while attaching, never part of a trace
const NOISE_PREFIXES: &[&str] = &[
    "[New LWP ",
    "[Thread debugging using libthread_db enabled]",
    "Using host libthread_db library ",
];

/// Parse full `thread apply all bt` output. Unrecognized lines are dropped.
pub fn parse<R: BufRead>(reader: R) -> Vec<ThreadInfo> {
    collect_threads(reader, classify)
}

/// Convenience wrapper over [`parse`] for in-memory output
pub fn parse_str(output: &str) -> Vec<ThreadInfo> {
    parse(output.as_bytes())
}

fn classify(line: &str) -> LineKind {
    let trimmed = trim_blanks(line);
    if NOISE_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
        return LineKind::Noise;
    }
    if trimmed.starts_with("Thread ") {
        return LineKind::Header(parse_thread_header(line));
    }
    LineKind::Other
}

/// Parse `Thread 2 (Thread 0x7f... (LWP 3116497) "pool-1")` into a [`ThreadInfo`]
/// with no frames. Returns `None` unless the line starts with `Thread <digits>`.
pub fn parse_thread_header(line: &str) -> Option<ThreadInfo> {
    let rest = trim_blanks(line).strip_prefix("Thread ")?;
    let (thread_id, after_id) = leading_number(rest)?;

    let lwp = after_id
        .find("(LWP ")
        .and_then(|i| leading_number(&after_id[i + 5..]))
        .map(|(n, _)| n)
        .unwrap_or(0);

    let name = first_quoted(line).unwrap_or_default();

    Some(ThreadInfo::new(thread_id, lwp, name))
}

/// Parse a `#N ...` frame line.
///
/// Handles the glued form `#40x7f...` where gdb dropped the space between
/// the frame number and the address: a number ending in `0` that runs into
/// an `x` is split back into frame `4` and address `0x7f...`.
pub fn parse_frame(line: &str) -> Option<StackFrame> {
    let raw = line.trim_end_matches(['\n', '\r']);
    let bytes = raw.as_bytes();

    let mut p = skip_blanks(bytes, 0);
    if bytes.get(p) != Some(&b'#') || !bytes.get(p + 1).is_some_and(u8::is_ascii_digit) {
        return None;
    }
    p += 1;

    let digits_end = p + bytes[p..].iter().take_while(|b| b.is_ascii_digit()).count();
    let number = bytes[p..digits_end]
        .iter()
        .fold(0u32, |n, d| n.saturating_mul(10).saturating_add(u32::from(d - b'0')));

    let glued = number > 0 && number % 10 == 0 && matches!(bytes.get(digits_end), Some(b'x' | b'X'));
    let mut frame = StackFrame {
        raw_line: raw.to_string(),
        ..Default::default()
    };
    if glued {
        frame.frame_number = number / 10;
        p = digits_end - 1;
    } else {
        frame.frame_number = number;
        p = digits_end;
    }

    // address
    p = skip_blanks(bytes, p);
    if bytes.get(p) == Some(&b'0') && matches!(bytes.get(p + 1), Some(b'x' | b'X')) {
        let start = p;
        p += 2;
        while bytes.get(p).is_some_and(u8::is_ascii_hexdigit) {
            p += 1;
        }
        frame.address = Some(raw[start..p].to_string());
    }

    // symbol, with or without a leading "in "
    p = skip_blanks(bytes, p);
    if bytes[p..].starts_with(b"in ") {
        p += 3;
    }
    let sym_start = p;
    while p < bytes.len() && !bytes[p..].starts_with(b" at ") && !bytes[p..].starts_with(b" (") {
        p += 1;
    }
    if p > sym_start {
        frame.symbol = Some(raw[sym_start..p].to_string());
    }

    // (params), balanced
    p = skip_blanks(bytes, p);
    if bytes.get(p) == Some(&b'(') {
        let start = p;
        let mut depth = 1usize;
        p += 1;
        while p < bytes.len() && depth > 0 {
            match bytes[p] {
                b'(' => depth += 1,
                b')' => depth -= 1,
                _ => {}
            }
            p += 1;
        }
        if depth == 0 {
            frame.params = Some(raw[start..p].to_string());
        }
    }

    // at file:line
    p = skip_blanks(bytes, p);
    if bytes[p..].starts_with(b"at ") {
        let location = &raw[p + 3..];
        let split = location
            .as_bytes()
            .windows(2)
            .position(|w| w[0] == b':' && w[1].is_ascii_digit());
        match split {
            Some(colon) if colon > 0 => {
                frame.file = Some(location[..colon].to_string());
                frame.line = leading_number(&location[colon + 1..]).map(|(n, _)| n).unwrap_or(0);
            }
            _ if !location.is_empty() => frame.file = Some(location.to_string()),
            _ => {}
        }
    }

    Some(frame)
}

fn trim_blanks(line: &str) -> &str {
    line.trim_start_matches([' ', '\t'])
}

fn skip_blanks(bytes: &[u8], mut p: usize) -> usize {
    while matches!(bytes.get(p), Some(b' ' | b'\t')) {
        p += 1;
    }
    p
}

/// Leading decimal number and the rest of the string
fn leading_number(s: &str) -> Option<(u32, &str)> {
    let end = s.bytes().take_while(u8::is_ascii_digit).count();
    if end == 0 {
        return None;
    }
    let n = s.as_bytes()[..end]
        .iter()
        .fold(0u32, |n, d| n.saturating_mul(10).saturating_add(u32::from(d - b'0')));
    Some((n, &s[end..]))
}

/// Content of the first `"..."` pair, if non-empty
fn first_quoted(line: &str) -> Option<String> {
    let open = line.find('"')?;
    let rest = &line[open + 1..];
    let close = rest.find('"')?;
    (close > 0).then(|| rest[..close].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
[New LWP 3116498]
[Thread debugging using libthread_db enabled]
Using host libthread_db library \"/lib/x86_64-linux-gnu/libthread_db.so.1\".
0x00007f1a8d2a3f9d in syscall () from /lib/x86_64-linux-gnu/libc.so.6

Thread 2 (Thread 0x7f1a8b0196c0 (LWP 3116497) \"pool-1\"):
#0  0x00007f1a8d2a3f9d in syscall () at ../sysdeps/unix/sysv/linux/x86_64/syscall.S:38
#1  0x00007f1a8d5e1c2a in g_cond_wait_until (cond=0x55d0, mutex=0x55d8) at ../glib/gthread-posix.c:1475

Thread 1 (Thread 0x7f1a8b01a940 (LWP 3116496) \"toggler\"):
#0  0x00007f1a8d29b7ef in __GI___poll (fds=0x55d0c2f0, nfds=2, timeout=-1) at ../sysdeps/unix/sysv/linux/poll.c:29
#1  0x000055d0c1e2a1b4 in main (argc=1, argv=0x7ffd) at src/main.cpp:37
";

    #[test]
    fn test_parse_sample() {
        let threads = parse_str(SAMPLE);
        assert_eq!(threads.len(), 2);

        assert_eq!(threads[0].thread_id, 2);
        assert_eq!(threads[0].lwp, 3116497);
        assert_eq!(threads[0].name, "pool-1");
        assert_eq!(threads[0].frames.len(), 2);
        assert_eq!(threads[0].frames[1].symbol.as_deref(), Some("g_cond_wait_until"));
        assert_eq!(threads[0].frames[1].line, 1475);

        assert_eq!(threads[1].name, "toggler");
        assert_eq!(threads[1].frames[1].file.as_deref(), Some("src/main.cpp"));
        assert_eq!(threads[1].frames[1].params.as_deref(), Some("(argc=1, argv=0x7ffd)"));
    }

    #[test]
    fn test_glued_frame_number() {
        let f = parse_frame("#40x7fcabc123 in foo () at bar.c:12").unwrap();
        assert_eq!(f.frame_number, 4);
        assert_eq!(f.address.as_deref(), Some("0x7fcabc123"));
        assert_eq!(f.symbol.as_deref(), Some("foo"));
        assert_eq!(f.params.as_deref(), Some("()"));
        assert_eq!(f.file.as_deref(), Some("bar.c"));
        assert_eq!(f.line, 12);
    }

    #[test]
    fn test_frame_number_not_multiple_of_ten_is_kept() {
        // 41 runs into 'x' but is not a multiple of ten: no split
        let f = parse_frame("#41x7f in foo ()").unwrap();
        assert_eq!(f.frame_number, 41);
        assert_eq!(f.address, None);
    }

    #[test]
    fn test_frame_without_address() {
        let f = parse_frame("#5  g_main_context_iteration (context=0x0) at gmain.c:4301").unwrap();
        assert_eq!(f.frame_number, 5);
        assert_eq!(f.address, None);
        assert_eq!(f.symbol.as_deref(), Some("g_main_context_iteration"));
        assert_eq!(f.params.as_deref(), Some("(context=0x0)"));
        assert_eq!(f.location().as_deref(), Some("gmain.c:4301"));
    }

    #[test]
    fn test_nested_params() {
        let f = parse_frame("#2 0x1 in cb (f=(void (*)(int)) 0x4011) at cb.c:3").unwrap();
        assert_eq!(f.params.as_deref(), Some("(f=(void (*)(int)) 0x4011)"));
        assert_eq!(f.line, 3);
    }

    #[test]
    fn test_location_colon_needs_digit() {
        // first colon followed by a digit splits; "C:" style prefixes stay in the file
        let f = parse_frame("#0 0x1 in f () at C:/src/a.c:7").unwrap();
        assert_eq!(f.file.as_deref(), Some("C:/src/a.c"));
        assert_eq!(f.line, 7);

        let f = parse_frame("#0 0x1 in f () at libfoo.so").unwrap();
        assert_eq!(f.file.as_deref(), Some("libfoo.so"));
        assert_eq!(f.line, 0);
    }

    #[test]
    fn test_header_without_lwp_or_name() {
        let t = parse_thread_header("Thread 7 (process 1234):").unwrap();
        assert_eq!(t.thread_id, 7);
        assert_eq!(t.lwp, 0);
        assert_eq!(t.name, "");
        assert!(parse_thread_header("Thread apply all").is_none());
    }

    #[test]
    fn test_frames_before_header_are_dropped() {
        let threads = parse_str("#0 0x1 in orphan ()\nThread 1 (LWP 5):\n#0 0x2 in kept ()\n");
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].frames.len(), 1);
        assert_eq!(threads[0].frames[0].symbol.as_deref(), Some("kept"));
    }
}
