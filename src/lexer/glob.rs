//! Shell glob matching for a single path component (`fnmatch` with no flags).
//!
//! Supports `*`, `?`, bracket sets with ranges and negation (`[a-z]`,
//! `[!0-9]`, `[^x]`), POSIX classes (`[[:digit:]]`) and backslash escapes.
//! An unterminated `[` matches itself.

/// Whether `s` contains a glob metacharacter
pub fn has_wildcard(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// Byte offset of the first metacharacter
pub fn first_wildcard(s: &str) -> Option<usize> {
    s.find(['*', '?', '['])
}

pub fn matches(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();

    let (mut pi, mut ni) = (0, 0);
    // last `*` seen and the name position it is currently absorbing up to
    let mut star: Option<(usize, usize)> = None;

    while ni < n.len() {
        if p.get(pi) == Some(&'*') {
            star = Some((pi, ni));
            pi += 1;
            continue;
        }
        if pi < p.len() {
            if let Some(next) = step(&p, pi, n[ni]) {
                pi = next;
                ni += 1;
                continue;
            }
        }
        match star {
            Some((sp, sn)) => {
                pi = sp + 1;
                ni = sn + 1;
                star = Some((sp, sn + 1));
            }
            None => return false,
        }
    }

    while p.get(pi) == Some(&'*') {
        pi += 1;
    }
    pi == p.len()
}

/// Match one non-star pattern element at `pi` against `c`; returns the next
/// pattern index on success.
fn step(p: &[char], pi: usize, c: char) -> Option<usize> {
    match p[pi] {
        '?' => Some(pi + 1),
        '[' => match bracket(p, pi + 1, c) {
            Some((true, next)) => Some(next),
            Some((false, _)) => None,
            None => (c == '[').then_some(pi + 1),
        },
        '\\' if pi + 1 < p.len() => (p[pi + 1] == c).then_some(pi + 2),
        literal => (literal == c).then_some(pi + 1),
    }
}

/// Evaluate a bracket expression starting just after `[`. Returns whether `c`
/// matched and the index after the closing `]`, or `None` if unterminated.
fn bracket(p: &[char], mut i: usize, c: char) -> Option<(bool, usize)> {
    let negate = matches!(p.get(i), Some('!' | '^'));
    if negate {
        i += 1;
    }

    let mut matched = false;
    let mut first = true;
    loop {
        let ch = *p.get(i)?;
        if ch == ']' && !first {
            return Some((matched != negate, i + 1));
        }
        first = false;

        if ch == '[' && p.get(i + 1) == Some(&':') {
            if let Some(len) = class_len(p, i + 2) {
                let name: String = p[i + 2..i + 2 + len].iter().collect();
                matched |= class_matches(&name, c);
                i += len + 4;
                continue;
            }
        }

        let lo = if ch == '\\' && i + 1 < p.len() {
            i += 1;
            p[i]
        } else {
            ch
        };

        match (p.get(i + 1), p.get(i + 2)) {
            (Some('-'), Some(&hi)) if hi != ']' => {
                matched |= lo <= c && c <= hi;
                i += 3;
            }
            _ => {
                matched |= lo == c;
                i += 1;
            }
        }
    }
}

/// Length of a class name starting at `start`, terminated by `:]`
fn class_len(p: &[char], start: usize) -> Option<usize> {
    (start..p.len().saturating_sub(1))
        .find(|&j| p[j] == ':' && p[j + 1] == ']')
        .map(|j| j - start)
}

fn class_matches(name: &str, c: char) -> bool {
    match name {
        "alpha" => c.is_ascii_alphabetic(),
        "digit" => c.is_ascii_digit(),
        "alnum" => c.is_ascii_alphanumeric(),
        "upper" => c.is_ascii_uppercase(),
        "lower" => c.is_ascii_lowercase(),
        "space" => c.is_ascii_whitespace() || c == '\x0b',
        "blank" => c == ' ' || c == '\t',
        "punct" => c.is_ascii_punctuation(),
        "xdigit" => c.is_ascii_hexdigit(),
        "cntrl" => c.is_ascii_control(),
        "graph" => c.is_ascii_graphic(),
        "print" => c.is_ascii_graphic() || c == ' ',
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_and_question() {
        assert!(matches("*.txt", "x.txt"));
        assert!(matches("*.txt", ".txt"));
        assert!(!matches("*.txt", "x.txt.bak"));
        assert!(matches("a*b*c", "aXXbYYc"));
        assert!(matches("file?.png", "file1.png"));
        assert!(!matches("file?.png", "file10.png"));
        assert!(matches("*", ""));
        assert!(!matches("?", ""));
    }

    #[test]
    fn test_brackets() {
        assert!(matches("img[0-9].png", "img7.png"));
        assert!(!matches("img[!0-9].png", "img7.png"));
        assert!(matches("img[^0-9].png", "imgx.png"));
        assert!(matches("[]a]", "]"));
        assert!(matches("[a-]", "-"));
        assert!(matches("[[:digit:]][[:upper:]]", "4Q"));
        assert!(!matches("[[:alpha:]]", "4"));
    }

    #[test]
    fn test_unterminated_bracket_is_literal() {
        assert!(matches("a[b", "a[b"));
        assert!(!matches("a[b", "ab"));
    }

    #[test]
    fn test_escape() {
        assert!(matches("a\\*", "a*"));
        assert!(!matches("a\\*", "ab"));
    }

    #[test]
    fn test_metachar_detection() {
        assert!(has_wildcard("d/*.txt"));
        assert!(has_wildcard("x[1]"));
        assert!(!has_wildcard("plain.txt"));
        assert_eq!(first_wildcard("abc?d*"), Some(3));
    }
}
