/// Text utilities for posts and pages: slugs, excerpts and word counts
use super::constants::{DEFAULT_EXCERPT_LENGTH, SLUG_MAX_LENGTH};
use regex::Regex;
use std::sync::OnceLock;

/// Removes markdown syntax while keeping the readable text
#[derive(Debug)]
pub struct MarkdownStripper {
    fence_regex: Regex,
    image_regex: Regex,
    link_regex: Regex,
    heading_regex: Regex,
    bold_regex: Regex,
    italic_regex: Regex,
    inline_code_regex: Regex,
    blockquote_regex: Regex,
    whitespace_regex: Regex,
}

impl MarkdownStripper {
    pub fn new() -> Self {
        MarkdownStripper {
            // ```lang ... ``` blocks are dropped entirely
            fence_regex: Regex::new(r"(?s)```.*?```").unwrap(),
            image_regex: Regex::new(r"!\[[^\]]*\]\([^)]*\)").unwrap(),
            link_regex: Regex::new(r"\[([^\]]+)\]\([^)]*\)").unwrap(),
            heading_regex: Regex::new(r"(?m)^[ \t]{0,3}#{1,6}[ \t]*").unwrap(),
            bold_regex: Regex::new(r"(\*\*|__)([^*_]+)(\*\*|__)").unwrap(),
            italic_regex: Regex::new(r"\*([^*]+)\*").unwrap(),
            inline_code_regex: Regex::new(r"`([^`]+)`").unwrap(),
            blockquote_regex: Regex::new(r"(?m)^[ \t]*>[ \t]?").unwrap(),
            whitespace_regex: Regex::new(r"\s+").unwrap(),
        }
    }

    pub fn instance() -> &'static Self {
        static INSTANCE: OnceLock<MarkdownStripper> = OnceLock::new();
        INSTANCE.get_or_init(MarkdownStripper::new)
    }

    /// Plain text of `markdown` with whitespace collapsed to single spaces.
    pub fn strip(&self, markdown: &str) -> String {
        let text = self.fence_regex.replace_all(markdown, " ");
        // Images before links: an image is a link prefixed with `!`
        let text = self.image_regex.replace_all(&text, "");
        let text = self.link_regex.replace_all(&text, "$1");
        let text = self.heading_regex.replace_all(&text, "");
        let text = self.blockquote_regex.replace_all(&text, "");
        let text = self.bold_regex.replace_all(&text, "$2");
        let text = self.italic_regex.replace_all(&text, "$1");
        let text = self.inline_code_regex.replace_all(&text, "$1");
        let text = self.whitespace_regex.replace_all(&text, " ");
        text.trim().to_string()
    }
}

impl Default for MarkdownStripper {
    fn default() -> Self {
        Self::new()
    }
}

fn slug_regex() -> &'static Regex {
    static SLUG: OnceLock<Regex> = OnceLock::new();
    SLUG.get_or_init(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap())
}

/// Whether `slug` is lowercase alphanumerics joined by single hyphens and
/// at most 255 characters long.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty() && slug.len() <= SLUG_MAX_LENGTH && slug_regex().is_match(slug)
}

/// Derive a URL slug from free text.
///
/// Runs of anything other than `[a-z0-9]` (after lowercasing) collapse to a
/// single hyphen. Text with no ASCII alphanumerics at all yields
/// `post-<8 hex chars>`.
pub fn generate_slug(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    if slug.len() > SLUG_MAX_LENGTH {
        // ASCII only, so byte and code point lengths agree
        slug.truncate(SLUG_MAX_LENGTH);
        while slug.ends_with('-') {
            slug.pop();
        }
    }

    if slug.is_empty() {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        return format!("post-{}", &suffix[..8]);
    }
    slug
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x3040..=0x30FF     // hiragana, katakana
        | 0x3400..=0x4DBF   // CJK extension A
        | 0x4E00..=0x9FFF   // CJK unified ideographs
        | 0xAC00..=0xD7AF   // hangul syllables
        | 0xF900..=0xFAFF   // CJK compatibility ideographs
        | 0x20000..=0x2A6DF // CJK extension B
    )
}

/// Count words in plain text.
///
/// Every CJK character is a word on its own; any other run between
/// whitespace or CJK characters counts once if it holds an alphanumeric.
pub fn count_words(text: &str) -> i64 {
    let mut count = 0i64;
    let mut in_word = false;

    for c in text.chars() {
        if is_cjk(c) {
            count += 1;
            in_word = false;
        } else if c.is_whitespace() {
            in_word = false;
        } else if c.is_alphanumeric() && !in_word {
            count += 1;
            in_word = true;
        }
    }
    count
}

/// Word count of markdown source after syntax is stripped.
pub fn markdown_word_count(markdown: &str) -> i64 {
    if markdown.trim().is_empty() {
        return 0;
    }
    count_words(&MarkdownStripper::instance().strip(markdown))
}

/// First `limit` code points of the stripped markdown, with `...` appended
/// when cut. A zero limit uses the default excerpt length.
pub fn generate_excerpt(markdown: &str, limit: usize) -> String {
    let limit = if limit == 0 { DEFAULT_EXCERPT_LENGTH } else { limit };
    let text = MarkdownStripper::instance().strip(markdown);

    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text,
    }
}
