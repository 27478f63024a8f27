//! Brace expansion: `file.{a,b}` -> `file.a file.b`.
//!
//! Only the first `{` and the first `}` after it form a group; nested
//! groups are not expanded.

/// Expand the first brace group of `token`. Returns `None` when there is no
/// complete group or it holds no items.
pub fn expand(token: &str) -> Option<Vec<String>> {
    let open = token.find('{')?;
    let close = open + token[open..].find('}')?;

    let prefix = &token[..open];
    let content = &token[open + 1..close];
    let suffix = &token[close + 1..];

    let items = split_items(content);
    if items.is_empty() {
        return None;
    }

    Some(
        items
            .into_iter()
            .map(|item| format!("{}{}{}", prefix, item, suffix))
            .collect(),
    )
}

/// Split on commas outside quotes. Leading whitespace of each item is
/// skipped and a trailing empty item is dropped.
fn split_items(content: &str) -> Vec<&str> {
    let bytes = content.as_bytes();
    let mut items = Vec::new();
    let mut p = 0;

    while p < bytes.len() {
        while p < bytes.len() && bytes[p].is_ascii_whitespace() {
            p += 1;
        }
        if p == bytes.len() {
            break;
        }

        let start = p;
        let mut quote: Option<u8> = None;
        while p < bytes.len() {
            match (quote, bytes[p]) {
                (None, b'\'' | b'"') => quote = Some(bytes[p]),
                (Some(q), b) if b == q => quote = None,
                (None, b',') => break,
                _ => {}
            }
            p += 1;
        }
        items.push(&content[start..p]);

        if p == bytes.len() {
            break;
        }
        // skip the comma
        p += 1;
    }

    items
}
