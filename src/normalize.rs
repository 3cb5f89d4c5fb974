//! Whitespace normalization for embedded multi-line query strings.
//!
//! Block scalars in YAML lose blank lines that are shorter than the block's
//! indentation. Padding those lines to the common indent keeps the text
//! byte-for-byte recoverable.

use once_cell::sync::Lazy;
use regex::Regex;

static LINE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\r\n|[\n\r]").expect("line break pattern is valid"));

/// Pads every line after the first that is shorter than the common indent of
/// the non-blank lines after the first, and joins with `\n`.
///
/// The first line never counts towards the indent and is never touched. With
/// no non-blank line after the first there is nothing to pad to, and only the
/// line breaks are rewritten.
pub fn normalize_whitespace(raw: &str) -> String {
    let lines: Vec<&str> = LINE_BREAK.split(raw).collect();

    let common_indent = lines
        .iter()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.chars().take_while(|c| c.is_whitespace()).count())
        .min();

    let indent = common_indent.unwrap_or(0);

    let mut out = String::with_capacity(raw.len());
    for (idx, line) in lines.iter().enumerate() {
        if idx > 0 {
            out.push('\n');
            if line.chars().count() < indent {
                out.extend(std::iter::repeat_n(' ', indent));
                continue;
            }
        }
        out.push_str(line);
    }
    out
}
