use crate::error::{FolioError, Result};
use crate::types::Pt;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontId(pub(crate) u32);

impl FontId {
    pub const HELVETICA: FontId = FontId(0);
    pub const COURIER: FontId = FontId(1);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Metrics lookups consumed while preparing elements. Widths are returned
/// already scaled to `size` from the 1000-unit em.
pub trait FontMetrics {
    fn contains(&self, font: FontId) -> bool;
    fn width_of(&self, font: FontId, ch: char, size: Pt) -> Pt;
    fn line_height(&self, font: FontId, size: Pt) -> Pt;
    fn descent(&self, font: FontId, size: Pt) -> Pt;
    fn encode(&self, font: FontId, ch: char) -> Option<u8>;

    fn text_width(&self, font: FontId, text: &str, size: Pt) -> Pt {
        text.chars().map(|ch| self.width_of(font, ch, size)).sum()
    }
}

pub(crate) const FIRST_CHAR: u8 = 32;
pub(crate) const LAST_CHAR: u8 = 255;
pub(crate) const FALLBACK_BYTE: u8 = b'?';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
    Helvetica,
    Courier,
}

impl Builtin {
    pub(crate) fn base_font(self) -> &'static str {
        match self {
            Builtin::Helvetica => "Helvetica",
            Builtin::Courier => "Courier",
        }
    }
}

#[derive(Debug)]
pub(crate) enum FontProgram {
    Builtin(Builtin),
    TrueType(Vec<u8>),
}

#[derive(Debug)]
pub(crate) struct FaceMetrics {
    pub(crate) widths: Vec<u16>,
    pub(crate) ascent: i16,
    pub(crate) descent: i16,
    pub(crate) line_gap: i16,
    pub(crate) cap_height: i16,
    pub(crate) italic_angle: i16,
    pub(crate) bbox: (i16, i16, i16, i16),
    pub(crate) is_fixed_pitch: bool,
}

impl FaceMetrics {
    fn advance_for_byte(&self, byte: u8) -> u16 {
        if byte < FIRST_CHAR {
            return 0;
        }
        self.widths
            .get((byte - FIRST_CHAR) as usize)
            .copied()
            .unwrap_or(0)
    }

    fn line_height_units(&self) -> i64 {
        (self.ascent as i64 - self.descent as i64 + self.line_gap as i64).max(0)
    }
}

#[derive(Debug)]
pub(crate) struct RegisteredFont {
    pub(crate) name: String,
    pub(crate) program: FontProgram,
    pub(crate) metrics: FaceMetrics,
}

/// Fonts available to one document session. Helvetica and Courier are
/// always present; TrueType faces may be added.
#[derive(Debug)]
pub struct FontRegistry {
    fonts: Vec<RegisteredFont>,
    lookup: HashMap<String, FontId>,
    width_cache: Mutex<HashMap<(FontId, char), u16>>,
    encode_cache: Mutex<HashMap<char, Option<u8>>>,
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FontRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            fonts: Vec::new(),
            lookup: HashMap::new(),
            width_cache: Mutex::new(HashMap::new()),
            encode_cache: Mutex::new(HashMap::new()),
        };
        registry.push(
            "Helvetica",
            FontProgram::Builtin(Builtin::Helvetica),
            FaceMetrics {
                widths: HELVETICA_WIDTHS.to_vec(),
                ascent: 718,
                descent: -207,
                line_gap: 275,
                cap_height: 718,
                italic_angle: 0,
                bbox: (-166, -225, 1000, 931),
                is_fixed_pitch: false,
            },
            &["Arial", "sans-serif"],
        );
        registry.push(
            "Courier",
            FontProgram::Builtin(Builtin::Courier),
            FaceMetrics {
                widths: courier_widths(),
                ascent: 629,
                descent: -157,
                line_gap: 414,
                cap_height: 562,
                italic_angle: 0,
                bbox: (-23, -250, 715, 805),
                is_fixed_pitch: true,
            },
            &["monospace"],
        );
        registry
    }

    fn push(
        &mut self,
        name: &str,
        program: FontProgram,
        metrics: FaceMetrics,
        aliases: &[&str],
    ) -> FontId {
        let id = FontId(self.fonts.len() as u32);
        self.fonts.push(RegisteredFont {
            name: name.to_string(),
            program,
            metrics,
        });
        for alias in std::iter::once(name).chain(aliases.iter().copied()) {
            let key = normalize_name(alias);
            if key.is_empty() || self.lookup.contains_key(&key) {
                continue;
            }
            self.lookup.insert(key, id);
        }
        id
    }

    pub fn register_file(&mut self, path: impl AsRef<Path>) -> Result<FontId> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|err| {
            FolioError::config(format!("cannot read font {}: {err}", path.display()))
        })?;
        let stem = path.file_stem().and_then(|v| v.to_str());
        self.register_bytes(data, stem)
    }

    pub fn register_bytes(&mut self, data: Vec<u8>, source_name: Option<&str>) -> Result<FontId> {
        let source = source_name.unwrap_or("EmbeddedFont");
        let (name, aliases, metrics) = {
            let face = ttf_parser::Face::parse(&data, 0).map_err(|err| {
                FolioError::config(format!("invalid font data for {source}: {err}"))
            })?;
            let (name, aliases) = font_names(&face, source);
            (name, aliases, FaceMetrics::from_face(&face))
        };
        let alias_refs: Vec<&str> = aliases.iter().map(String::as_str).collect();
        let id = self.push(&name, FontProgram::TrueType(data), metrics, &alias_refs);
        log::debug!("registered font {name} as {id:?}");
        Ok(id)
    }

    /// Case-insensitive lookup by family, full or PostScript name.
    pub fn resolve(&self, name: &str) -> Result<FontId> {
        self.lookup
            .get(&normalize_name(name))
            .copied()
            .ok_or_else(|| FolioError::config(format!("unknown font {name:?}")))
    }

    pub fn name(&self, font: FontId) -> Option<&str> {
        self.fonts.get(font.index()).map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub(crate) fn font(&self, font: FontId) -> Option<&RegisteredFont> {
        self.fonts.get(font.index())
    }

    fn advance_units(&self, font: FontId, ch: char) -> u16 {
        if let Ok(cache) = self.width_cache.lock() {
            if let Some(value) = cache.get(&(font, ch)) {
                return *value;
            }
        }
        let Some(registered) = self.fonts.get(font.index()) else {
            return 0;
        };
        let byte = self.encode(font, ch).unwrap_or(FALLBACK_BYTE);
        let value = registered.metrics.advance_for_byte(byte);
        if let Ok(mut cache) = self.width_cache.lock() {
            cache.insert((font, ch), value);
        }
        value
    }
}

impl FontMetrics for FontRegistry {
    fn contains(&self, font: FontId) -> bool {
        font.index() < self.fonts.len()
    }

    fn width_of(&self, font: FontId, ch: char, size: Pt) -> Pt {
        size.mul_ratio(self.advance_units(font, ch) as i64, 1000)
    }

    fn line_height(&self, font: FontId, size: Pt) -> Pt {
        let Some(registered) = self.fonts.get(font.index()) else {
            return size.mul_ratio(1200, 1000);
        };
        size.mul_ratio(registered.metrics.line_height_units(), 1000)
    }

    fn descent(&self, font: FontId, size: Pt) -> Pt {
        let Some(registered) = self.fonts.get(font.index()) else {
            return Pt::ZERO;
        };
        size.mul_ratio(-(registered.metrics.descent as i64), 1000)
    }

    fn encode(&self, _font: FontId, ch: char) -> Option<u8> {
        if let Ok(cache) = self.encode_cache.lock() {
            if let Some(value) = cache.get(&ch) {
                return *value;
            }
        }
        let value = winansi_encode(ch);
        if let Ok(mut cache) = self.encode_cache.lock() {
            cache.insert(ch, value);
        }
        value
    }
}

impl FaceMetrics {
    fn from_face(face: &ttf_parser::Face<'_>) -> Self {
        let units_per_em = face.units_per_em().max(1);
        let scale = 1000.0 / units_per_em as f32;
        let mut widths = Vec::with_capacity((LAST_CHAR - FIRST_CHAR) as usize + 1);
        for code in FIRST_CHAR..=LAST_CHAR {
            let advance = winansi_decode(code)
                .and_then(|ch| face.glyph_index(ch))
                .and_then(|id| face.glyph_hor_advance(id))
                .unwrap_or(0);
            let scaled = (advance as f32 * scale).round() as i32;
            widths.push(scaled.clamp(0, u16::MAX as i32) as u16);
        }
        let ascent = scale_i16(face.ascender(), scale);
        let bbox = face.global_bounding_box();
        Self {
            widths,
            ascent,
            descent: scale_i16(face.descender(), scale),
            line_gap: scale_i16(face.line_gap(), scale),
            cap_height: face
                .capital_height()
                .map(|value| scale_i16(value, scale))
                .unwrap_or(ascent),
            italic_angle: face
                .italic_angle()
                .map(|value| value.round() as i16)
                .unwrap_or(0),
            bbox: (
                scale_i16(bbox.x_min, scale),
                scale_i16(bbox.y_min, scale),
                scale_i16(bbox.x_max, scale),
                scale_i16(bbox.y_max, scale),
            ),
            is_fixed_pitch: face.is_monospaced(),
        }
    }
}

fn scale_i16(value: i16, scale: f32) -> i16 {
    let scaled = (value as f32 * scale).round() as i32;
    scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

fn font_names(face: &ttf_parser::Face<'_>, source: &str) -> (String, Vec<String>) {
    use ttf_parser::name::name_id;

    let mut family = None;
    let mut full = None;
    let mut post = None;
    for entry in face.names() {
        let Some(name) = entry.to_string() else {
            continue;
        };
        match entry.name_id {
            name_id::TYPOGRAPHIC_FAMILY | name_id::FAMILY => {
                family.get_or_insert(name);
            }
            name_id::FULL_NAME => {
                full.get_or_insert(name);
            }
            name_id::POST_SCRIPT_NAME => {
                post.get_or_insert(name);
            }
            _ => {}
        }
    }
    let stem = Some(source.to_string());
    let primary = post
        .clone()
        .or_else(|| full.clone())
        .or_else(|| family.clone())
        .unwrap_or_else(|| source.to_string());
    let aliases = [family, full, post, stem]
        .into_iter()
        .flatten()
        .filter(|candidate| *candidate != primary)
        .collect();
    (primary, aliases)
}

fn normalize_name(name: &str) -> String {
    name.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .to_ascii_lowercase()
}

// 0x80..=0x9F in WinAnsiEncoding; `None` for undefined slots.
const WINANSI_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'),
    None,
    Some('\u{201A}'),
    Some('\u{0192}'),
    Some('\u{201E}'),
    Some('\u{2026}'),
    Some('\u{2020}'),
    Some('\u{2021}'),
    Some('\u{02C6}'),
    Some('\u{2030}'),
    Some('\u{0160}'),
    Some('\u{2039}'),
    Some('\u{0152}'),
    None,
    Some('\u{017D}'),
    None,
    None,
    Some('\u{2018}'),
    Some('\u{2019}'),
    Some('\u{201C}'),
    Some('\u{201D}'),
    Some('\u{2022}'),
    Some('\u{2013}'),
    Some('\u{2014}'),
    Some('\u{02DC}'),
    Some('\u{2122}'),
    Some('\u{0161}'),
    Some('\u{203A}'),
    Some('\u{0153}'),
    None,
    Some('\u{017E}'),
    Some('\u{0178}'),
];

pub(crate) fn winansi_encode(ch: char) -> Option<u8> {
    let code = ch as u32;
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(code as u8),
        _ => WINANSI_HIGH
            .iter()
            .position(|slot| *slot == Some(ch))
            .map(|idx| 0x80 + idx as u8),
    }
}

pub(crate) fn winansi_decode(byte: u8) -> Option<char> {
    match byte {
        0x20..=0x7E | 0xA0..=0xFF => Some(byte as char),
        0x80..=0x9F => WINANSI_HIGH[(byte - 0x80) as usize],
        _ => None,
    }
}

fn courier_widths() -> Vec<u16> {
    (FIRST_CHAR..=LAST_CHAR)
        .map(|code| if winansi_decode(code).is_some() { 600 } else { 0 })
        .collect()
}

#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 224] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, 0,
    556, 0, 222, 556, 333, 1000, 556, 556, 333, 1000, 667, 333, 1000, 0, 611, 0,
    0, 222, 222, 333, 333, 350, 556, 1000, 333, 1000, 500, 333, 944, 0, 500, 667,
    278, 333, 556, 556, 556, 556, 260, 556, 333, 737, 370, 556, 584, 333, 737, 333,
    400, 584, 333, 333, 333, 556, 537, 278, 333, 333, 365, 556, 834, 834, 834, 611,
    667, 667, 667, 667, 667, 667, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278,
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611,
    556, 556, 556, 556, 556, 556, 889, 500, 556, 556, 556, 556, 278, 278, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 584, 611, 556, 556, 556, 556, 500, 556, 500,
];

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub(crate) struct FixedAdvance;

    impl FontMetrics for FixedAdvance {
        fn contains(&self, font: FontId) -> bool {
            font.index() < 2
        }

        fn width_of(&self, _font: FontId, _ch: char, size: Pt) -> Pt {
            size / 2
        }

        fn line_height(&self, _font: FontId, size: Pt) -> Pt {
            size.mul_ratio(12, 10)
        }

        fn descent(&self, _font: FontId, size: Pt) -> Pt {
            size / 5
        }

        fn encode(&self, _font: FontId, ch: char) -> Option<u8> {
            winansi_encode(ch)
        }
    }
}
