//! Diff rendering used by assertion failure messages.

use std::fmt::Write;

use serde::Serialize;
use similar::{ChangeTag, TextDiff};

use crate::error::StepError;

/// Inline character diff between two strings. Runs present only in
/// `expected` are wrapped in `[-…]`, runs present only in `actual` in
/// `[+…]`. Output is deterministic for fixed inputs.
pub fn text_diff(expected: &str, actual: &str) -> String {
    let diff = TextDiff::from_chars(expected, actual);
    let mut out = String::new();
    let mut current = ChangeTag::Equal;
    for change in diff.iter_all_changes() {
        let tag = change.tag();
        if tag != current {
            if current != ChangeTag::Equal {
                out.push(']');
            }
            match tag {
                ChangeTag::Delete => out.push_str("[-"),
                ChangeTag::Insert => out.push_str("[+"),
                ChangeTag::Equal => {}
            }
            current = tag;
        }
        out.push_str(change.value());
    }
    if current != ChangeTag::Equal {
        out.push(']');
    }
    out
}

/// Pretty JSON rendering of a value, for diagnostics.
pub fn render<T: Serialize>(value: &T) -> Result<String, StepError> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Line-oriented structural diff of two serializable values. Lines present
/// only in `have` are prefixed with `-`, lines present only in `want` with
/// `+`. An empty string denotes equality.
pub fn pretty_diff<A, B>(have: &A, want: &B) -> Result<String, StepError>
where
    A: Serialize,
    B: Serialize,
{
    let have = render(have)?;
    let want = render(want)?;
    if have == want {
        return Ok(String::new());
    }
    let diff = TextDiff::from_lines(&have, &want);
    let mut out = String::new();
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => '-',
            ChangeTag::Insert => '+',
            ChangeTag::Equal => ' ',
        };
        let _ = write!(out, "{sign}{}", change.value());
        if !change.value().ends_with('\n') {
            out.push('\n');
        }
    }
    Ok(out.trim_end_matches('\n').to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_diff_marks_replaced_characters() {
        assert_eq!(text_diff("a", "b"), "[-a][+b]");
        assert_eq!(text_diff("abc", "abd"), "ab[-c][+d]");
    }

    #[test]
    fn text_diff_of_equal_strings_is_the_string() {
        assert_eq!(text_diff("same", "same"), "same");
    }

    #[test]
    fn pretty_diff_empty_for_equal_values() {
        assert_eq!(pretty_diff(&"a", &"a").unwrap(), "");
    }

    #[test]
    fn pretty_diff_marks_have_and_want() {
        let diff = pretty_diff(&"a", &"b").unwrap();
        assert_eq!(diff, "-\"a\"\n+\"b\"");
    }

    #[test]
    fn pretty_diff_is_line_oriented_for_structures() {
        let have = serde_json::json!({"name": "a", "count": 1});
        let want = serde_json::json!({"name": "a", "count": 2});
        let diff = pretty_diff(&have, &want).unwrap();
        assert!(diff.lines().any(|line| line.starts_with('-') && line.contains('1')));
        assert!(diff.lines().any(|line| line.starts_with('+') && line.contains('2')));
        assert!(diff.lines().any(|line| line.starts_with(' ') && line.contains("name")));
    }
}
