use std::borrow::Cow;

use unicode_width::UnicodeWidthStr;

/// Terminal columns a string occupies. Kana and kanji count two each.
///
/// ```
/// use podfeeder::util::display_width;
///
/// assert_eq!(display_width("TBS"), 3);
/// assert_eq!(display_width("文化放送"), 8);
/// ```
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Left-align `s` in a column `width` terminal columns wide.
///
/// Text already wider than the column is returned unchanged.
pub fn pad_to_width(s: &str, width: usize) -> String {
    let pad = width.saturating_sub(display_width(s));
    format!("{}{}", s, " ".repeat(pad))
}

/// Returns true for chars outside the XML 1.0 `Char` production.
///
/// Allowed: `#x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]`.
/// Surrogates cannot occur in a Rust `char`, so only the control range and the
/// two non-characters need checking.
fn is_xml_invalid(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{8}' | '\u{B}' | '\u{C}' | '\u{E}'..='\u{1F}' | '\u{FFFE}' | '\u{FFFF}')
}

/// Strip characters that are not allowed anywhere in an XML 1.0 document.
///
/// Recorder metadata is scraped from broadcaster pages and occasionally
/// carries stray control bytes. quick-xml escapes markup characters but
/// passes control characters through, which produces a document strict
/// podcast clients refuse to parse.
///
/// Returns `Cow::Borrowed` when the input is already clean (common case).
pub fn strip_xml_invalid_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_xml_invalid) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.chars().filter(|&c| !is_xml_invalid(c)).collect())
}
