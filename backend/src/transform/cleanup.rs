//! Text cleanup for marketplace-bound descriptions.
//!
//! Catalog exports routinely carry HTML bodies, entity-escaped text and
//! UTF-8 that was decoded as Windows-1252 somewhere upstream ("CafÃ©").
//! [`clean_text`] turns such a value into a single line of plain text:
//!
//! ```text
//! "<p>CafÃ© &amp; Bar</p>\n<br>"  →  "Café & Bar"
//! ```
//!
//! Markup is read with an HTML parser, so attribute values containing `>`
//! and unclosed tags do not leak into the result.

use html_escape::decode_html_entities;
use scraper::{Html, Node};

use crate::parser::Table;

/// Elements whose text is never visible.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Clean a raw cell value.
///
/// Mojibake repair and entity decoding run until the text is stable, then
/// the value is parsed as an HTML fragment and its visible text nodes are
/// joined with spaces and whitespace-collapsed.
pub fn clean_text(raw: &str) -> String {
    let mut text = raw.to_string();
    loop {
        let repaired = repair_mojibake(&text);
        let decoded = decode_html_entities(&repaired).into_owned();
        if decoded == text {
            break;
        }
        text = decoded;
    }

    collapse_whitespace(&visible_text(&text))
}

/// Text nodes of an HTML fragment joined with `" "`, skipping hidden
/// elements and comments.
fn visible_text(html: &str) -> String {
    if !html.contains('<') {
        return html.to_string();
    }

    let fragment = Html::parse_fragment(html);
    let mut parts: Vec<&str> = Vec::new();

    for node in fragment.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
        });
        if !hidden {
            parts.push(text);
        }
    }

    parts.join(" ")
}

/// Join whitespace-separated words with single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Undo UTF-8 text that was decoded as Windows-1252.
///
/// Each maximal run of non-ASCII characters is re-encoded to Windows-1252.
/// The run is replaced only when those bytes are valid UTF-8 and every
/// sequence starts the way common mojibake does (see [`is_mojibake`]).
/// Anything else ("é", "ß“", CJK, emoji) is left untouched.
pub fn repair_mojibake(text: &str) -> String {
    if text.is_ascii() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut run = String::new();

    for ch in text.chars() {
        if ch.is_ascii() {
            flush_run(&mut run, &mut out);
            out.push(ch);
        } else {
            run.push(ch);
        }
    }
    flush_run(&mut run, &mut out);

    out
}

fn flush_run(run: &mut String, out: &mut String) {
    if run.is_empty() {
        return;
    }

    let (bytes, _, unmappable) = encoding_rs::WINDOWS_1252.encode(run);
    match std::str::from_utf8(&bytes) {
        Ok(fixed) if !unmappable && is_mojibake(&bytes) => out.push_str(fixed),
        _ => out.push_str(run),
    }
    run.clear();
}

/// Whether valid UTF-8 `bytes` only hold sequences that read as mojibake
/// when shown as Windows-1252.
///
/// Accepted lead bytes: `C2`/`C3` (shown as `Â`/`Ã`, Latin-1 letters and
/// symbols) and `E2 80`/`E2 84` (shown as `â€`/`â„`, punctuation and `™`).
pub fn is_mojibake(bytes: &[u8]) -> bool {
    let mut i = 0;
    let mut sequences = 0;

    while i < bytes.len() {
        match bytes[i] {
            0x00..=0x7F => i += 1,
            0xC2 | 0xC3 => {
                sequences += 1;
                i += 2;
            }
            0xE2 if matches!(bytes.get(i + 1), Some(0x80) | Some(0x84)) => {
                sequences += 1;
                i += 3;
            }
            _ => return false,
        }
    }

    sequences > 0
}

/// Apply [`clean_text`] in place to the named columns.
///
/// Names resolve case-insensitively; unknown names are ignored. Returns the
/// headers that were actually cleaned.
pub fn clean_columns(table: &mut Table, columns: &[String]) -> Vec<String> {
    let mut cleaned = Vec::new();

    for name in columns {
        if let Some(col) = table.resolve(name) {
            let header = table.headers()[col].clone();
            if cleaned.contains(&header) {
                continue;
            }
            table.map_column(col, clean_text);
            cleaned.push(header);
        }
    }

    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_markup_and_collapses_whitespace() {
        let raw = "<p>Soft   cotton</p>\n<ul><li>Machine wash</li><li>Slim fit</li></ul>";
        assert_eq!(clean_text(raw), "Soft cotton Machine wash Slim fit");
    }

    #[test]
    fn test_tag_boundaries_become_spaces() {
        assert_eq!(clean_text("one<br>two<br/>three"), "one two three");
    }

    #[test]
    fn test_decodes_entities() {
        assert_eq!(clean_text("Salt &amp; Pepper &quot;Mill&quot;"), "Salt & Pepper \"Mill\"");
        assert_eq!(clean_text("50&nbsp;ml"), "50 ml");
    }

    #[test]
    fn test_escaped_markup_is_stripped() {
        assert_eq!(clean_text("&lt;b&gt;Bold&lt;/b&gt; claim"), "Bold claim");
    }

    #[test]
    fn test_repairs_mojibake() {
        assert_eq!(clean_text("CafÃ© crÃ¨me"), "Café crème");
        assert_eq!(clean_text("Itâ€™s here"), "It’s here");
    }

    #[test]
    fn test_leaves_valid_text_alone() {
        assert_eq!(repair_mojibake("Café"), "Café");
        assert_eq!(repair_mojibake("日本語 ✓"), "日本語 ✓");
        assert_eq!(clean_text("Café Ã© mix"), "Café é mix");
    }

    #[test]
    fn test_valid_non_ascii_runs_untouched() {
        assert_eq!(clean_text("„Gruß“ aus Köln"), "„Gruß“ aus Köln");
        assert_eq!(clean_text("CAFÉ—Paris"), "CAFÉ—Paris");
        assert_eq!(repair_mojibake("naïve façade"), "naïve façade");
    }

    #[test]
    fn test_mojibake_signatures() {
        assert!(is_mojibake("é".as_bytes()));
        assert!(is_mojibake("’".as_bytes()));
        assert!(is_mojibake("™".as_bytes()));
        assert!(!is_mojibake("ߓ".as_bytes()));
        assert!(!is_mojibake("ɗ".as_bytes()));
        assert!(!is_mojibake(b"plain"));
    }

    #[test]
    fn test_quoted_attribute_with_angle_bracket() {
        assert_eq!(clean_text(r#"<a title="a>b">Link</a> text"#), "Link text");
        assert_eq!(clean_text(r#"<img alt="x > y" src="a.png">Caption"#), "Caption");
    }

    #[test]
    fn test_comparison_operators_survive() {
        assert_eq!(clean_text("size < 10 and > 2"), "size < 10 and > 2");
    }

    #[test]
    fn test_script_and_comments_removed() {
        let raw = "Intro<!-- hidden --><script>alert('x')</script><style>p{}</style> end";
        assert_eq!(clean_text(raw), "Intro end");
        assert_eq!(clean_text("<div><b>Bold</b><i>italic</i></div>"), "Bold italic");
    }

    #[test]
    fn test_empty_and_absent() {
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text("  \t\n "), "");
        assert_eq!(clean_text(" <i>x</i> "), "x");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "<p>CafÃ© &amp;amp; Bar</p>",
            "&amp;lt;b&amp;gt;nested&amp;lt;/b&amp;gt;",
            "ÃƒÂ© double",
            "a < b > c",
            "<<b>b>",
            "plain text",
            "tab\tand\u{a0}nbsp",
        ];
        for raw in samples {
            let once = clean_text(raw);
            assert_eq!(clean_text(&once), once, "not idempotent for {:?}", raw);
        }
    }

    #[test]
    fn test_clean_columns_resolves_case_insensitively() {
        let mut table = Table::new(
            vec!["Handle".into(), "Body (HTML)".into()],
            vec![vec!["h".into(), "<p>Hi &amp; bye</p>".into()]],
        );
        let cleaned = clean_columns(
            &mut table,
            &["body (html)".to_string(), "Missing".to_string()],
        );

        assert_eq!(cleaned, vec!["Body (HTML)"]);
        assert_eq!(table.cell(0, 1), "Hi & bye");
        assert_eq!(table.cell(0, 0), "h");
    }
}
