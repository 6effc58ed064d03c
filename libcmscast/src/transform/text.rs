//! Text cleanup and length-aware truncation

use once_cell::sync::Lazy;
use regex::Regex;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("static regex"));
static HORIZONTAL_WS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]+").expect("static regex"));

const ELLIPSIS: &str = "...";

/// Remove anything that looks like an HTML tag
pub fn strip_html(html: &str) -> String {
    TAG_RE.replace_all(html, "").into_owned()
}

/// Decode the handful of entities CMS editors actually produce.
///
/// `&amp;` goes last so `&amp;lt;` stays `&lt;`.
pub fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Collapse spaces and tabs, keep newlines, trim the ends
pub fn normalize_whitespace(text: &str) -> String {
    HORIZONTAL_WS_RE.replace_all(text, " ").trim().to_string()
}

/// Full cleanup pipeline for CMS body text
pub fn clean_html(html: &str) -> String {
    normalize_whitespace(&decode_entities(&strip_html(html)))
}

/// Shorten `text` to at most `max_chars` characters plus an ellipsis.
///
/// Prefers ending on the last sentence terminator when it falls within the
/// final fifth of the budget.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    truncate_at(text, max_chars, |c| matches!(c, '.' | '!' | '?'), true)
}

/// Like [`truncate_text`] but breaks on the last space, for link previews.
pub fn truncate_description(text: &str, max_chars: usize) -> String {
    truncate_at(text, max_chars, |c| c == ' ', false)
}

fn truncate_at(
    text: &str,
    max_chars: usize,
    is_boundary: impl Fn(char) -> bool,
    keep_boundary: bool,
) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let cut: Vec<char> = text.chars().take(max_chars).collect();
    let boundary = cut.iter().rposition(|c| is_boundary(*c));

    // index >= 80% of the budget, in integer arithmetic
    match boundary {
        Some(index) if index * 5 >= max_chars * 4 => {
            let end = if keep_boundary { index + 1 } else { index };
            let kept: String = cut[..end].iter().collect();
            format!("{}{}", kept, ELLIPSIS)
        }
        _ => {
            let kept: String = cut.iter().collect();
            format!("{}{}", kept.trim_end(), ELLIPSIS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_and_decode() {
        let html = "<p>Fish &amp; chips&nbsp;&lt;3 &quot;tasty&quot; it&#39;s</p>";
        assert_eq!(clean_html(html), "Fish & chips <3 \"tasty\" it's");
    }

    #[test]
    fn test_double_encoded_amp_decodes_once() {
        assert_eq!(decode_entities("&amp;lt;b&amp;gt;"), "&lt;b&gt;");
    }

    #[test]
    fn test_whitespace_collapse_keeps_newlines() {
        let text = "  First \t\t line  \nSecond    line \n\n Third  ";
        assert_eq!(normalize_whitespace(text), "First line \nSecond line \n\n Third");
    }

    #[test]
    fn test_short_text_is_untouched() {
        assert_eq!(truncate_text("Short.", 100), "Short.");
        assert_eq!(truncate_text("Exactly ten", 11), "Exactly ten");
    }

    #[test]
    fn test_truncate_prefers_late_sentence_boundary() {
        // "." at index 17 of a 20-char budget is past 80%
        let text = "Sentence number 1. And then more words follow here";
        let result = truncate_text(text, 20);
        assert_eq!(result, "Sentence number 1....");
        assert!(result.chars().count() <= 23);
    }

    #[test]
    fn test_truncate_hard_cuts_when_boundary_is_early() {
        let text = "Hi. This sentence keeps going without a stop for a while";
        let result = truncate_text(text, 20);
        assert_eq!(result, "Hi. This sentence ke...");
        assert_eq!(result.chars().count(), 23);
    }

    #[test]
    fn test_truncate_counts_characters_not_bytes() {
        let text = "é".repeat(50);
        let result = truncate_text(&text, 10);
        assert_eq!(result, format!("{}...", "é".repeat(10)));
    }

    #[test]
    fn test_truncate_bound_holds_for_many_lengths() {
        let text = "Leadership matters. Boards hire for it! Do they measure it? Rarely. ".repeat(20);
        for max in [1, 5, 17, 80, 299, 300, 1000] {
            let result = truncate_text(&text, max);
            assert!(result.chars().count() <= max + 3, "max {} gave {}", max, result.len());
        }
    }

    #[test]
    fn test_description_breaks_on_space() {
        let text = "one two three four five six seven eight nine ten";
        let result = truncate_description(text, 24);
        // last space within the first 24 chars is at index 23
        assert_eq!(result, "one two three four five...");
    }

    #[test]
    fn test_description_hard_cut_without_late_space() {
        let text = "Supercalifragilisticexpialidocious words";
        assert_eq!(truncate_description(text, 10), "Supercalif...");
    }
}
