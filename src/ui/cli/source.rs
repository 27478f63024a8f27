//! Line sources for the console: a reedline editor for terminals and a
//! plain buffered reader for pipes.

use std::borrow::Cow;
use std::io::{self, BufRead, Write};

use reedline::{Prompt, PromptEditMode, PromptHistorySearch, PromptHistorySearchStatus, Reedline, Signal};

/// Blocking supplier of console input lines
pub trait LineSource {
    /// Next line without its terminator; `None` at end of input
    fn read_line(&mut self) -> io::Result<Option<String>>;
}

/// Console prompt: `Dbg> `
pub struct ConsolePrompt;

impl Prompt for ConsolePrompt {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        Cow::Borrowed("Dbg")
    }

    fn render_prompt_right(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _prompt_mode: PromptEditMode) -> Cow<'_, str> {
        Cow::Borrowed("> ")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
        Cow::Borrowed("... ")
    }

    fn render_prompt_history_search_indicator(&self, history_search: PromptHistorySearch) -> Cow<'_, str> {
        let prefix = match history_search.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "(failed) ",
        };
        Cow::Owned(format!("(search: {}{}) ", prefix, history_search.term))
    }
}

/// Line editor with history, for terminals
pub struct EditorSource {
    editor: Reedline,
    prompt: ConsolePrompt,
}

impl EditorSource {
    pub fn new() -> Self {
        Self {
            editor: Reedline::create(),
            prompt: ConsolePrompt,
        }
    }
}

impl Default for EditorSource {
    fn default() -> Self {
        Self::new()
    }
}

impl LineSource for EditorSource {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        match self.editor.read_line(&self.prompt)? {
            Signal::Success(buffer) => Ok(Some(buffer)),
            Signal::CtrlD | Signal::CtrlC => Ok(None),
        }
    }
}

/// Any buffered reader; the prompt, if set, goes to stderr
pub struct ReaderSource<R> {
    reader: R,
    prompt: Option<String>,
}

impl<R: BufRead> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, prompt: None }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }
}

impl ReaderSource<io::StdinLock<'static>> {
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock()).with_prompt("Dbg> ")
    }
}

impl<R: BufRead> LineSource for ReaderSource<R> {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        if let Some(prompt) = &self.prompt {
            let mut stderr = io::stderr();
            write!(stderr, "{}", prompt)?;
            stderr.flush()?;
        }

        // raw bytes, so a line that is not UTF-8 still reaches the lexer
        let mut buf = Vec::new();
        if self.reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&buf);
        Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
    }
}
