//! Integration tests for the console lexer
//!
//! Run with: cargo test --test lexer_test

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use stackwatch::lexer::{parse, EnumerateError, Enumerator, LexError};

    /// Serves a fixed listing for one directory and records each call
    struct StubEnumerator {
        dir: &'static str,
        entries: Vec<&'static str>,
        calls: RefCell<Vec<(Option<String>, Option<String>, String)>>,
    }

    impl StubEnumerator {
        fn new(dir: &'static str, entries: &[&'static str]) -> Self {
            Self {
                dir,
                entries: entries.to_vec(),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Enumerator for StubEnumerator {
        fn enumerate(
            &self,
            dir: Option<&str>,
            prefix: Option<&str>,
            pattern: &str,
            item: &mut dyn FnMut(&str) -> bool,
        ) -> Result<(), EnumerateError> {
            self.calls.borrow_mut().push((
                dir.map(str::to_string),
                prefix.map(str::to_string),
                pattern.to_string(),
            ));
            if dir != Some(self.dir) {
                return Ok(());
            }
            for entry in &self.entries {
                if !item(entry) {
                    break;
                }
            }
            Ok(())
        }
    }

    struct FailingEnumerator;

    impl Enumerator for FailingEnumerator {
        fn enumerate(
            &self,
            _dir: Option<&str>,
            _prefix: Option<&str>,
            _pattern: &str,
            _item: &mut dyn FnMut(&str) -> bool,
        ) -> Result<(), EnumerateError> {
            Err(EnumerateError::Other("listing unavailable".into()))
        }
    }

    #[test]
    fn test_quoting_and_escaping() {
        let argv = parse(r#"a "b c" 'd e' f\ g"#, None).unwrap();
        assert_eq!(argv.into_vec(), vec!["a", "b c", "d e", "f g"]);
    }

    #[test]
    fn test_unterminated_quote_has_no_result() {
        let err = parse(r#"a "b"#, None).unwrap_err();
        assert!(matches!(err, LexError::UnterminatedQuote { quote: '"', .. }));
    }

    #[test]
    fn test_brace_expansion_without_enumerator() {
        let argv = parse("file.{a,b,c}", None).unwrap();
        assert_eq!(argv.into_vec(), vec!["file.a", "file.b", "file.c"]);
    }

    #[test]
    fn test_wildcard_expands_in_directory() {
        let stub = StubEnumerator::new("d", &["x.txt", "notes.md", "y.txt"]);
        let argv = parse("d/*.txt", Some(&stub)).unwrap();
        assert_eq!(argv.into_vec(), vec!["d/x.txt", "d/y.txt"]);

        let calls = stub.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], (Some("d".to_string()), None, "*.txt".to_string()));
    }

    #[test]
    fn test_prefix_hint_passed_to_enumerator() {
        let stub = StubEnumerator::new("d", &["log1", "log2", "other"]);
        let argv = parse("cat d/log?", Some(&stub)).unwrap();
        assert_eq!(argv.into_vec(), vec!["cat", "d/log1", "d/log2"]);
        assert_eq!(stub.calls.borrow()[0].1.as_deref(), Some("log"));
    }

    #[test]
    fn test_no_match_keeps_literal() {
        let stub = StubEnumerator::new("d", &["x.txt", "y.txt"]);
        let argv = parse("ls d/*.png", Some(&stub)).unwrap();
        assert_eq!(argv.into_vec(), vec!["ls", "d/*.png"]);
    }

    #[test]
    fn test_enumerator_failure_keeps_literal() {
        let argv = parse("ls *.log", Some(&FailingEnumerator)).unwrap();
        assert_eq!(argv.into_vec(), vec!["ls", "*.log"]);
    }

    #[test]
    fn test_braces_then_wildcards() {
        let stub = StubEnumerator::new("d", &["a.txt", "b.log", "c.md"]);
        let argv = parse("d/*.{txt,log}", Some(&stub)).unwrap();
        assert_eq!(argv.into_vec(), vec!["d/a.txt", "d/b.log"]);
    }

    #[test]
    fn test_command_is_first_token() {
        let argv = parse("  timer -w 2s ", None).unwrap();
        assert_eq!(argv.command(), Some("timer"));
        assert_eq!(argv.len(), 3);
    }
}
