//! Common types for parsed stack traces.

/// One call-stack entry: `#N [0x... in ]symbol [(params)] [at file:line]`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackFrame {
    /// Frame index as printed by the debugger
    pub frame_number: u32,
    /// `0x...` hex string, if present
    pub address: Option<String>,
    /// Function name
    pub symbol: Option<String>,
    /// Argument list including the enclosing parens
    pub params: Option<String>,
    /// Source path
    pub file: Option<String>,
    /// Source line, 0 if unknown
    pub line: u32,
    /// Original line, kept for fallback display and filtering
    pub raw_line: String,
}

impl StackFrame {
    /// Source location as `file:line`, or just `file` when the line is unknown
    pub fn location(&self) -> Option<String> {
        let file = self.file.as_deref().filter(|f| !f.is_empty())?;
        if self.line > 0 {
            Some(format!("{}:{}", file, self.line))
        } else {
            Some(file.to_string())
        }
    }

    /// Whether the symbol or the raw line mentions `needle`
    pub fn mentions(&self, needle: &str) -> bool {
        self.symbol.as_deref().is_some_and(|s| s.contains(needle)) || self.raw_line.contains(needle)
    }
}

/// A thread header plus its frames in trace order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadInfo {
    /// Debugger thread number
    pub thread_id: u32,
    /// Kernel thread id, 0 if unknown
    pub lwp: u32,
    /// Thread name, may be empty
    pub name: String,
    /// Frames in the order they were read
    pub frames: Vec<StackFrame>,
}

impl ThreadInfo {
    pub fn new(thread_id: u32, lwp: u32, name: impl Into<String>) -> Self {
        Self {
            thread_id,
            lwp,
            name: name.into(),
            frames: Vec::new(),
        }
    }

    /// Header line without styling: `Thread N (LWP M) "name"`
    pub fn header(&self) -> String {
        if self.lwp > 0 {
            format!("Thread {} (LWP {}) \"{}\"", self.thread_id, self.lwp, self.name)
        } else {
            format!("Thread {} \"{}\"", self.thread_id, self.name)
        }
    }
}
