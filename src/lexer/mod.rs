//! Command line lexer for the diagnostics console.
//!
//! Turns one input line into an argument vector:
//! - whitespace separates tokens outside quotes
//! - `'...'` and `"..."` group text and are stripped
//! - `\` escapes the next character, also inside quotes
//! - `{a,b}` brace groups expand in place
//! - tokens with `*`, `?` or `[` are matched against directory entries
//!   supplied by an [`Enumerator`]; a glob that matches nothing stays literal

pub mod brace;
pub mod glob;

use std::io;
use std::ops::Deref;

use thiserror::Error;

/// Lexer errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("unterminated {quote} quote starting at offset {offset}")]
    UnterminatedQuote { quote: char, offset: usize },
}

/// Failure reported by an [`Enumerator`]. Never surfaced from [`parse`]: the
/// token that triggered it is kept literally.
#[derive(Error, Debug)]
pub enum EnumerateError {
    #[error("cannot list {dir}: {source}")]
    Io {
        dir: String,
        #[source]
        source: io::Error,
    },

    #[error("enumeration failed: {0}")]
    Other(String),
}

/// Directory listing used for wildcard expansion, supplied by the embedding
/// application.
pub trait Enumerator {
    /// Directory that relative patterns resolve against, if any
    fn context(&self) -> Option<&str> {
        None
    }

    /// List `dir` (`None` = the enumerator's own default directory), calling
    /// `item` with each entry's path or name. `prefix` is a hint for early
    /// filtering and `pattern` the glob that will be applied; neither needs
    /// to be honored. Stop when `item` returns `false`.
    fn enumerate(
        &self,
        dir: Option<&str>,
        prefix: Option<&str>,
        pattern: &str,
        item: &mut dyn FnMut(&str) -> bool,
    ) -> Result<(), EnumerateError>;
}

/// Owned argument vector produced by [`parse`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedArgv(Vec<String>);

impl ParsedArgv {
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }

    /// First token, the command name
    pub fn command(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }
}

impl Deref for ParsedArgv {
    type Target = [String];

    fn deref(&self) -> &[String] {
        &self.0
    }
}

impl IntoIterator for ParsedArgv {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Tokenize `line` and expand braces and wildcards.
///
/// Fails only on an unterminated quote, in which case nothing is returned.
pub fn parse(line: &str, enumerator: Option<&dyn Enumerator>) -> Result<ParsedArgv, LexError> {
    let raw = split_tokens(line)?;

    let mut args = Vec::with_capacity(raw.len());
    for token in raw {
        match brace::expand(&token) {
            Some(items) => {
                for item in items {
                    expand_wildcard(item, enumerator, &mut args);
                }
            }
            None => expand_wildcard(token, enumerator, &mut args),
        }
    }

    Ok(ParsedArgv(args))
}

/// First pass: quoting and escaping
fn split_tokens(line: &str) -> Result<Vec<String>, LexError> {
    let mut tokens = Vec::new();
    let mut chars = line.char_indices().peekable();

    loop {
        while chars.next_if(|(_, c)| c.is_ascii_whitespace()).is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut token = String::new();
        let mut quote: Option<(char, usize)> = None;

        while let Some(&(offset, c)) = chars.peek() {
            match (quote, c) {
                (_, '\\') => {
                    chars.next();
                    if let Some((_, escaped)) = chars.next() {
                        token.push(escaped);
                    }
                    continue;
                }
                (Some((q, _)), c) if c == q => quote = None,
                (Some(_), c) => token.push(c),
                (None, '\'' | '"') => quote = Some((c, offset)),
                (None, c) if c.is_ascii_whitespace() => break,
                (None, c) => token.push(c),
            }
            chars.next();
        }

        if let Some((quote, offset)) = quote {
            return Err(LexError::UnterminatedQuote { quote, offset });
        }
        tokens.push(token);
    }

    Ok(tokens)
}

/// Second pass for one token: replace it by its matches, or keep it literal
fn expand_wildcard(token: String, enumerator: Option<&dyn Enumerator>, out: &mut Vec<String>) {
    if !glob::has_wildcard(&token) {
        out.push(token);
        return;
    }

    let matches = enumerator.map(|e| glob_matches(&token, e)).unwrap_or_default();
    if matches.is_empty() {
        out.push(token);
    } else {
        out.extend(matches);
    }
}

fn glob_matches(token: &str, enumerator: &dyn Enumerator) -> Vec<String> {
    let (dir_part, file_pattern) = match token.rfind('/') {
        Some(slash) => (Some(&token[..slash]), &token[slash + 1..]),
        None => (None, token),
    };

    let hint = match glob::first_wildcard(file_pattern) {
        Some(at) => &file_pattern[..at],
        None => file_pattern,
    };
    let hint = (!hint.is_empty()).then_some(hint);

    let dir = resolve_dir(dir_part, enumerator.context());

    let mut found = Vec::new();
    let mut on_item = |item: &str| {
        let name = item.rsplit('/').next().unwrap_or(item);
        if glob::matches(file_pattern, name) {
            found.push(match dir_part {
                Some(d) => format!("{}/{}", d, name),
                None => name.to_string(),
            });
        }
        true
    };

    match enumerator.enumerate(dir.as_deref(), hint, file_pattern, &mut on_item) {
        Ok(()) => found,
        Err(e) => {
            log::debug!("wildcard {} left unexpanded: {}", token, e);
            Vec::new()
        }
    }
}

/// Directory to enumerate for a pattern's directory component
fn resolve_dir(dir_part: Option<&str>, context: Option<&str>) -> Option<String> {
    let Some(dir) = dir_part else {
        return context.map(str::to_string);
    };
    if dir.is_empty() {
        return Some("/".to_string());
    }
    if dir.starts_with('/') {
        return Some(dir.to_string());
    }
    match context.filter(|c| !c.is_empty()) {
        Some(base) => Some(format!("{}/{}", base.trim_end_matches('/'), dir)),
        None => Some(dir.to_string()),
    }
}
