//! Markup for chat bubbles.
//!
//! Text is escaped exactly once, and every decoration (line breaks, emphasis)
//! is added after escaping so the decoration itself is never escaped.

use regex::Regex;
use std::sync::LazyLock;

const LINE_BREAK: &str = "<br>";

/// Glyphs that start a new visual line in bot replies.
const BREAK_GLYPHS: &[&str] = &[
    "🌱", "🌾", "🌽", "💰", "📈", "📉", "🌧️", "☀️", "✅", "⚠️", "•",
];

// Domain vocabulary emphasised in bot replies (whole words, any case).
static EMPHASIS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\b(?:",
        // crops
        r"maize|beans|tea|coffee|wheat|rice|sorghum|millet|cassava|potatoes|",
        r"bananas|tomatoes|onions|cabbages|kales|avocados|mangoes|sugarcane|",
        // agronomic actions
        r"plant|planting|harvest|harvesting|fertilizer|fertiliser|irrigation|",
        r"mulching|compost|manure|weeding|spraying|intercropping|",
        // market and weather
        r"KES|KSh|price|prices|market|markets|rain|rains|rainfall|drought|weather",
        r")\b"
    ))
    .unwrap()
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

pub fn unescape_html(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Markup for a message typed by the user: escaped, nothing else.
pub fn render_user(text: &str) -> String {
    escape_html(text)
}

/// Markup for a bot reply: escaped, newlines turned into breaks, a break
/// before each list glyph, and domain terms wrapped in `<strong>`.
pub fn render_bot(text: &str) -> String {
    let escaped = escape_html(text.trim());
    let with_breaks = escaped.replace("\r\n", "\n").replace('\n', LINE_BREAK);
    let with_glyphs = break_before_glyphs(&with_breaks);
    EMPHASIS_RE
        .replace_all(&with_glyphs, "<strong>$0</strong>")
        .into_owned()
}

fn break_before_glyphs(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len() + 16);
    let mut rest = markup;
    while let Some(ch) = rest.chars().next() {
        if let Some(glyph) = BREAK_GLYPHS.iter().find(|g| rest.starts_with(**g)) {
            let trimmed_len = out.trim_end().len();
            if trimmed_len > 0 && !out[..trimmed_len].ends_with(LINE_BREAK) {
                out.truncate(trimmed_len);
                out.push_str(LINE_BREAK);
            }
            out.push_str(glyph);
            rest = &rest[glyph.len()..];
        } else {
            out.push(ch);
            rest = &rest[ch.len_utf8()..];
        }
    }
    out
}

/// Read rendered markup back as the plain text a viewer would see.
pub fn visible_text(markup: &str) -> String {
    let with_newlines = markup.replace(LINE_BREAK, "\n");
    unescape_html(&TAG_RE.replace_all(&with_newlines, ""))
}
