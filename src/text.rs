//! Plain-text front-end: splits a text file into chapters.
//!
//! A chapter starts at a heading line such as `第十二章 归来` or
//! `Chapter 12 The Return`. Text before the first heading becomes its own
//! untitled chapter; a file with no headings is one chapter.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::config::RawChapter;

#[allow(clippy::expect_used)]
static HEADING_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t\x{3000}]*(第\s*[一二三四五六七八九十百千万亿零〇两0-9]+\s*[章节回卷][^\r\n]*|Chapter\s+[0-9]+\b[^\r\n]*)\r?$",
    )
    .expect("heading regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static LINE_BREAKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*[\r\n]+\s*").expect("line break regex is valid") // Static pattern, safe to panic
});

/// Splits `text` on chapter headings, in order.
#[must_use]
pub fn split_chapters(text: &str) -> Vec<RawChapter> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let headings: Vec<_> = HEADING_PATTERN.captures_iter(text).collect();

    let mut chapters = Vec::with_capacity(headings.len() + 1);
    let first_start = headings
        .first()
        .and_then(|caps| caps.get(0))
        .map_or(text.len(), |m| m.start());
    let preamble = &text[..first_start];
    if !preamble.trim().is_empty() {
        chapters.push(RawChapter {
            content: Some(encode_content(preamble)),
            ..RawChapter::default()
        });
    }

    for (index, caps) in headings.iter().enumerate() {
        let (Some(line), Some(title)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let end = headings
            .get(index + 1)
            .and_then(|next| next.get(0))
            .map_or(text.len(), |m| m.start());
        chapters.push(RawChapter::new(
            strip_invisible(title.as_str().trim()),
            encode_content(&text[line.end()..end]),
        ));
    }

    debug!(chapters = chapters.len(), "text split into chapters");
    chapters
}

/// Escapes markup, turns line breaks into `<br/>`, and drops control and
/// zero-width characters.
#[must_use]
pub fn encode_content(text: &str) -> String {
    let escaped = text
        .trim()
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;");
    let joined = LINE_BREAKS.replace_all(&escaped, "<br/>");
    format!("<p>{}</p>", strip_invisible(&joined))
}

fn strip_invisible(text: &str) -> String {
    text.chars()
        .filter(|c| {
            !c.is_control() && !matches!(c, '\u{200b}'..='\u{200f}' | '\u{feff}')
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_chinese_headings() {
        let text = "第一章 开始\n第一段。\n第二段。\n第二章 结束\n最后。\n";
        let chapters = split_chapters(text);
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].title.as_deref(), Some("第一章 开始"));
        assert_eq!(
            chapters[0].content.as_deref(),
            Some("<p>第一段。<br/>第二段。</p>")
        );
        assert_eq!(chapters[1].title.as_deref(), Some("第二章 结束"));
        assert_eq!(chapters[1].content.as_deref(), Some("<p>最后。</p>"));
    }

    #[test]
    fn test_split_english_headings_with_preamble() {
        let text = "A foreword.\r\nChapter 1 Down\r\nText & more\r\nChapter 2\r\n<end>";
        let chapters = split_chapters(text);
        assert_eq!(chapters.len(), 3);
        assert_eq!(chapters[0].title, None);
        assert_eq!(chapters[0].content.as_deref(), Some("<p>A foreword.</p>"));
        assert_eq!(chapters[1].title.as_deref(), Some("Chapter 1 Down"));
        assert_eq!(chapters[1].content.as_deref(), Some("<p>Text &amp; more</p>"));
        assert_eq!(chapters[2].title.as_deref(), Some("Chapter 2"));
        assert_eq!(chapters[2].content.as_deref(), Some("<p>&lt;end&gt;</p>"));
    }

    #[test]
    fn test_text_without_headings_is_one_chapter() {
        let chapters = split_chapters("\u{feff}just\u{200b} text");
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].content.as_deref(), Some("<p>just text</p>"));
    }

    #[test]
    fn test_encode_content_strips_control_characters() {
        assert_eq!(encode_content("a\u{7}b\n\n  c"), "<p>ab<br/>c</p>");
    }
}
