use crate::font::{FontId, FontMetrics};
use crate::types::Pt;

pub const PAGE_MARK: char = '\u{E000}';
pub const PAGES_MARK: char = '\u{E001}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageStamp {
    pub page: usize,
    pub pages: usize,
}

impl PageStamp {
    pub fn new(page: usize, pages: usize) -> Self {
        Self { page, pages }
    }
}

impl Default for PageStamp {
    fn default() -> Self {
        Self { page: 1, pages: 1 }
    }
}

pub fn is_mark(ch: char) -> bool {
    ch == PAGE_MARK || ch == PAGES_MARK
}

pub fn encode(template: &str) -> String {
    template
        .replace("{pages}", &PAGES_MARK.to_string())
        .replace("{page}", &PAGE_MARK.to_string())
}

pub fn decode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            PAGE_MARK => out.push_str("{page}"),
            PAGES_MARK => out.push_str("{pages}"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn resolve(text: &str, stamp: PageStamp) -> String {
    if !text.chars().any(is_mark) {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match ch {
            PAGE_MARK => out.push_str(&stamp.page.to_string()),
            PAGES_MARK => out.push_str(&stamp.pages.to_string()),
            _ => out.push(ch),
        }
    }
    out
}

/// Width reserved for one marker: `digits` times the advance of `0`.
pub fn reserved_width(metrics: &dyn FontMetrics, font: FontId, size: Pt, digits: usize) -> Pt {
    metrics.width_of(font, '0', size) * (digits.max(1) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::FontRegistry;

    #[test]
    fn encode_and_resolve_page_numbers() {
        let encoded = encode("Page {page} of {pages}");
        assert!(!encoded.contains('{'));
        assert_eq!(resolve(&encoded, PageStamp::new(2, 7)), "Page 2 of 7");
        assert_eq!(decode(&encoded), "Page {page} of {pages}");
    }

    #[test]
    fn plain_text_is_untouched() {
        assert_eq!(resolve("{other}", PageStamp::new(1, 1)), "{other}");
        assert_eq!(encode("{other}"), "{other}");
    }

    #[test]
    fn reserved_width_uses_digit_advance() {
        let registry = FontRegistry::new();
        let width = reserved_width(&registry, FontId::HELVETICA, Pt::from_f32(10.0), 3);
        assert_eq!(width, Pt::from_f32(16.68));
    }
}
