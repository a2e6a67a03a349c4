//! crates/quillify_core/src/word_count.rs
//!
//! Word counting over the editor's HTML content.
//!
//! Live counts shown while typing and counts computed later from the stored
//! HTML must agree, so tokenization follows the editor's own counter: text
//! content is extracted with block boundaries acting as whitespace, and a word
//! is any maximal run of non-whitespace characters.

use crate::domain::Chapter;

/// Elements whose boundaries separate words in the extracted text.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt",
    "figcaption", "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "main", "nav", "ol", "p", "pre", "section", "table", "tbody", "td",
    "tfoot", "th", "thead", "tr", "ul",
];

/// Elements whose body is not text content.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Counts the words in a piece of HTML (or plain text).
///
/// Absent or blank input counts as zero. Malformed markup never fails; only
/// the text that can be salvaged from it is counted.
pub fn count_words(html: Option<&str>) -> usize {
    let Some(html) = html else {
        return 0;
    };
    if html.trim().is_empty() {
        return 0;
    }
    extract_text(html)
        .split(is_word_separator)
        .filter(|word| !word.is_empty())
        .count()
}

/// Sums the word counts of several chapter bodies. Order does not matter.
pub fn aggregate_word_count<'a, I>(contents: I) -> usize
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    contents.into_iter().map(count_words).sum()
}

/// Total word count of a story's chapters.
pub fn story_word_count(chapters: &[Chapter]) -> usize {
    aggregate_word_count(chapters.iter().map(|chapter| chapter.content.as_deref()))
}

/// Human-readable word count, e.g. "1 word" or "12.5k words".
pub fn format_word_count(count: usize) -> String {
    match count {
        0 => "0 words".to_string(),
        1 => "1 word".to_string(),
        n if n < 1_000 => format!("{} words", n),
        n if n < 1_000_000 => format!("{:.1}k words", n as f64 / 1_000.0),
        n => format!("{:.1}M words", n as f64 / 1_000_000.0),
    }
}

/// Extracts the text content of an HTML fragment.
///
/// Tags, attributes and comments are dropped and entities are decoded.
/// Block-level boundaries become a single space.
pub fn extract_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(open) = rest.find('<') {
        push_decoded(&mut text, &rest[..open]);
        let markup = &rest[open + 1..];

        if let Some(comment) = markup.strip_prefix("!--") {
            rest = skip_comment(comment);
            continue;
        }
        if !starts_tag(markup) {
            text.push('<');
            rest = markup;
            continue;
        }
        let Some(end) = tag_end(markup) else {
            // unterminated tag
            rest = "";
            break;
        };

        let tag = &markup[..end];
        rest = &markup[end + 1..];
        let name = tag_name(tag);
        if is_one_of(name, BLOCK_ELEMENTS) {
            text.push(' ');
        }
        let opening = !tag.starts_with('/') && !tag.ends_with('/');
        if opening && is_one_of(name, RAW_TEXT_ELEMENTS) {
            rest = skip_raw_text(rest, name);
        }
    }

    push_decoded(&mut text, rest);
    text
}

fn is_word_separator(c: char) -> bool {
    c.is_whitespace() || c == '\u{feff}'
}

fn push_decoded(text: &mut String, segment: &str) {
    if !segment.is_empty() {
        text.push_str(&html_escape::decode_html_entities(segment));
    }
}

/// Whether the text following a `<` opens a tag rather than being a literal.
fn starts_tag(markup: &str) -> bool {
    let mut chars = markup.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => true,
        Some('/') => chars.next().is_some_and(|c| c.is_ascii_alphabetic()),
        Some('!') | Some('?') => true,
        _ => false,
    }
}

/// Text following a comment opener, past the comment's end.
///
/// `<!-->` and `<!--->` are complete empty comments.
fn skip_comment(comment: &str) -> &str {
    if let Some(after) = comment.strip_prefix('>') {
        return after;
    }
    if let Some(after) = comment.strip_prefix("->") {
        return after;
    }
    comment.find("-->").map_or("", |end| &comment[end + 3..])
}

/// Byte offset of the `>` closing a tag, skipping quoted attribute values.
///
/// A quote only opens a value when it is the first non-space byte after `=`;
/// elsewhere it is an ordinary character, as in `<a title=it's>`.
fn tag_end(markup: &str) -> Option<usize> {
    let mut quote: Option<u8> = None;
    let mut value_start = false;
    for (i, byte) in markup.bytes().enumerate() {
        if let Some(q) = quote {
            if byte == q {
                quote = None;
            }
            continue;
        }
        match byte {
            b'"' | b'\'' if value_start => quote = Some(byte),
            b'>' => return Some(i),
            _ => {}
        }
        value_start = byte == b'=' || (value_start && byte.is_ascii_whitespace());
    }
    None
}

fn tag_name(tag: &str) -> &str {
    let tag = tag.strip_prefix('/').unwrap_or(tag);
    let end = tag
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(tag.len());
    &tag[..end]
}

fn is_one_of(name: &str, names: &[&str]) -> bool {
    !name.is_empty() && names.iter().any(|n| n.eq_ignore_ascii_case(name))
}

/// Skips past the closing tag of a raw-text element.
fn skip_raw_text<'a>(rest: &'a str, name: &str) -> &'a str {
    // ASCII lowercasing keeps byte offsets intact.
    let lowered = rest.to_ascii_lowercase();
    let closing = format!("</{}", name.to_ascii_lowercase());
    match lowered.find(&closing) {
        Some(start) => {
            let after = &rest[start..];
            after.find('>').map_or("", |end| &after[end + 1..])
        }
        None => "",
    }
}
