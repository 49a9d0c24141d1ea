use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const ELLIPSIS: &str = "...";

/// Truncates to at most `limit` characters, appending `...` when anything
/// was cut. A string of exactly `limit` characters passes through
/// untouched; one character more yields `limit + 3` characters total.
pub fn truncate_chars(s: &str, limit: usize) -> Cow<'_, str> {
    match s.char_indices().nth(limit) {
        Some((byte_idx, _)) => {
            let mut out = String::with_capacity(byte_idx + ELLIPSIS.len());
            out.push_str(&s[..byte_idx]);
            out.push_str(ELLIPSIS);
            Cow::Owned(out)
        }
        None => Cow::Borrowed(s),
    }
}

/// Truncates to at most `max_width` terminal columns, appending `...` when
/// anything was cut. Width-aware: CJK characters and emoji count as two
/// columns, combining marks as zero.
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if UnicodeWidthStr::width(s) <= max_width {
        return Cow::Borrowed(s);
    }

    let target = max_width.saturating_sub(ELLIPSIS.len());
    let mut used = 0;
    let mut end = 0;
    for (idx, c) in s.char_indices() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > target {
            break;
        }
        used += w;
        end = idx + c.len_utf8();
    }
    Cow::Owned(format!("{}{}", &s[..end], ELLIPSIS))
}

/// Reduces HTML-ish feed content to plain text for terminal display.
///
/// Paragraph and line-break tags become newlines, a generic single-pass
/// scanner drops every remaining tag, and HTML entities are unescaped
/// last. Only used at the presentation boundary; stored content keeps its
/// markup.
pub fn strip_markup(s: &str) -> String {
    let with_breaks = s
        .replace("<p>", "\n")
        .replace("</p>", "")
        .replace("<br>", "\n")
        .replace("<br/>", "\n")
        .replace("<br />", "\n");

    let mut out = String::with_capacity(with_breaks.len());
    let mut in_tag = false;
    for c in with_breaks.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }

    html_escape::decode_html_entities(&out).into_owned()
}
