use crate::canvas::{Command, Document, Page};
use crate::diagnostics::{Diagnostics, LayoutOptions};
use crate::error::Result;
use crate::font::{
    FALLBACK_BYTE, FIRST_CHAR, FontId, FontMetrics, FontProgram, FontRegistry, LAST_CHAR,
    RegisteredFont,
};
use crate::image::{ImageEncoding, ImageResource};
use crate::types::{Color, Pt};
use fixed::types::I32F32;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

const CATALOG_ID: usize = 1;
const PAGES_ID: usize = 2;
const RESOURCES_ID: usize = 3;
const INFO_ID: usize = 4;
const FIRST_FREE_ID: usize = 5;

const FLATE_LEVEL: u8 = 6;

/// Writes `document` as a PDF 1.7 file held in memory.
pub fn write_pdf(
    document: &Document,
    registry: &FontRegistry,
    options: &LayoutOptions,
    diagnostics: &Diagnostics,
) -> Result<Vec<u8>> {
    let mut writer = PdfWriter::new(registry, options);
    writer.collect_resources(document);
    writer.write_fonts();
    writer.write_images();
    writer.write_resources();
    let mut kids = Vec::with_capacity(document.page_count());
    for page in &document.pages {
        kids.push(writer.write_page(page));
    }
    writer.write_page_tree(&kids);
    if writer.fallback_glyphs > 0 {
        diagnostics.warn(format!(
            "{} character(s) outside WinAnsi were replaced with '?'",
            writer.fallback_glyphs
        ));
    }
    let bytes = writer.finish();
    log::debug!(
        "pdf written: {} page(s), {} bytes",
        document.page_count(),
        bytes.len()
    );
    Ok(bytes)
}

struct PdfWriter<'a> {
    registry: &'a FontRegistry,
    compress: bool,
    // Index 0 is the free-list head; bodies are filled in as objects are written.
    objects: Vec<Option<Vec<u8>>>,
    fonts: BTreeMap<FontId, FontEntry>,
    images: BTreeMap<u64, ImageEntry>,
    fallback_glyphs: usize,
}

struct FontEntry {
    name: String,
    id: usize,
}

struct ImageEntry {
    name: String,
    id: usize,
    resource: Arc<ImageResource>,
}

impl<'a> PdfWriter<'a> {
    fn new(registry: &'a FontRegistry, options: &LayoutOptions) -> Self {
        Self {
            registry,
            compress: options.compress_streams,
            objects: vec![None; FIRST_FREE_ID],
            fonts: BTreeMap::new(),
            images: BTreeMap::new(),
            fallback_glyphs: 0,
        }
    }

    fn alloc(&mut self) -> usize {
        self.objects.push(None);
        self.objects.len() - 1
    }

    fn set(&mut self, id: usize, body: impl Into<Vec<u8>>) {
        self.objects[id] = Some(body.into());
    }

    fn collect_resources(&mut self, document: &Document) {
        for command in document.pages.iter().flat_map(|page| page.commands.iter()) {
            match command {
                Command::SetFont { font, .. } => {
                    if !self.fonts.contains_key(font) {
                        let id = self.alloc();
                        let name = format!("F{}", font.index());
                        self.fonts.insert(*font, FontEntry { name, id });
                    }
                }
                Command::DrawImage { image, .. } => {
                    if !self.images.contains_key(&image.key()) {
                        let id = self.alloc();
                        let name = format!("Im{}", self.images.len() + 1);
                        self.images.insert(
                            image.key(),
                            ImageEntry {
                                name,
                                id,
                                resource: Arc::clone(image),
                            },
                        );
                    }
                }
                _ => {}
            }
        }
    }

    fn write_fonts(&mut self) {
        let used: Vec<(FontId, usize)> = self
            .fonts
            .iter()
            .map(|(font, entry)| (*font, entry.id))
            .collect();
        let registry = self.registry;
        for (font, id) in used {
            let Some(registered) = registry.font(font) else {
                // Unknown ids fall back to Helvetica so the page stays valid.
                self.set(id, type1_font_object("Helvetica"));
                continue;
            };
            match &registered.program {
                FontProgram::Builtin(builtin) => {
                    self.set(id, type1_font_object(builtin.base_font()));
                }
                FontProgram::TrueType(data) => {
                    let file_id = self.alloc();
                    let descriptor_id = self.alloc();
                    let base_font = sanitize_font_name(&registered.name);
                    let file = self.stream_object(&format!("/Length1 {}", data.len()), data);
                    self.set(file_id, file);
                    self.set(
                        descriptor_id,
                        font_descriptor_object(&base_font, registered, file_id),
                    );
                    self.set(id, truetype_font_object(&base_font, registered, descriptor_id));
                }
            }
        }
    }

    fn write_images(&mut self) {
        let pending: Vec<(usize, Arc<ImageResource>)> = self
            .images
            .values()
            .map(|entry| (entry.id, Arc::clone(&entry.resource)))
            .collect();
        for (id, resource) in pending {
            let body = match resource.encoding() {
                ImageEncoding::Jpeg { data, gray } => {
                    let space = if *gray { "DeviceGray" } else { "DeviceRGB" };
                    let dict = format!(
                        "/Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /{} /BitsPerComponent 8 /Filter /DCTDecode",
                        resource.width_px(),
                        resource.height_px(),
                        space
                    );
                    raw_stream_object(&dict, data)
                }
                ImageEncoding::Raw { rgb, alpha } => {
                    let mut dict = format!(
                        "/Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceRGB /BitsPerComponent 8",
                        resource.width_px(),
                        resource.height_px()
                    );
                    if let Some(alpha) = alpha {
                        let mask_id = self.alloc();
                        let mask_dict = format!(
                            "/Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceGray /BitsPerComponent 8",
                            resource.width_px(),
                            resource.height_px()
                        );
                        let mask = self.stream_object(&mask_dict, alpha);
                        self.set(mask_id, mask);
                        let _ = write!(dict, " /SMask {} 0 R", mask_id);
                    }
                    self.stream_object(&dict, rgb)
                }
            };
            self.set(id, body);
        }
    }

    fn write_resources(&mut self) {
        let mut body = String::from("<< /ProcSet [/PDF /Text /ImageC /ImageB]");
        if !self.fonts.is_empty() {
            body.push_str(" /Font <<");
            for entry in self.fonts.values() {
                let _ = write!(body, " /{} {} 0 R", entry.name, entry.id);
            }
            body.push_str(" >>");
        }
        if !self.images.is_empty() {
            body.push_str(" /XObject <<");
            for entry in self.images.values() {
                let _ = write!(body, " /{} {} 0 R", entry.name, entry.id);
            }
            body.push_str(" >>");
        }
        body.push_str(" >>");
        self.set(RESOURCES_ID, body);
    }

    fn write_page(&mut self, page: &Page) -> usize {
        let content = self.content_stream(page);
        let content_id = self.alloc();
        let stream = self.stream_object("", content.as_bytes());
        self.set(content_id, stream);
        let page_id = self.alloc();
        self.set(
            page_id,
            format!(
                "<< /Type /Page /Parent {} 0 R /MediaBox [0 0 {} {}] /Resources {} 0 R /Contents {} 0 R >>",
                PAGES_ID,
                fmt_pt(page.size.width),
                fmt_pt(page.size.height),
                RESOURCES_ID,
                content_id
            ),
        );
        page_id
    }

    fn write_page_tree(&mut self, kids: &[usize]) {
        let refs = kids
            .iter()
            .map(|id| format!("{} 0 R", id))
            .collect::<Vec<_>>()
            .join(" ");
        self.set(
            PAGES_ID,
            format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                refs,
                kids.len()
            ),
        );
        self.set(
            CATALOG_ID,
            format!("<< /Type /Catalog /Pages {} 0 R >>", PAGES_ID),
        );
        self.set(
            INFO_ID,
            format!(
                "<< /Producer (folio {}) >>",
                escape_pdf_string(env!("CARGO_PKG_VERSION"))
            ),
        );
    }

    fn content_stream(&mut self, page: &Page) -> String {
        let height = page.size.height;
        let mut out = String::new();
        let mut first_move = false;
        let mut font = FontId::HELVETICA;
        for command in &page.commands {
            match command {
                Command::SetFont { font: id, size } => {
                    font = *id;
                    let name = self
                        .fonts
                        .get(id)
                        .map(|entry| entry.name.as_str())
                        .unwrap_or("F0");
                    let _ = writeln!(out, "/{} {} Tf", name, fmt_pt(*size));
                }
                Command::SetFillColor(color) => {
                    let _ = writeln!(out, "{} rg", color_components(*color));
                }
                Command::SetStrokeColor(color) => {
                    let _ = writeln!(out, "{} RG", color_components(*color));
                }
                Command::SetLineWidth(width) => {
                    let _ = writeln!(out, "{} w", fmt_pt(*width));
                }
                Command::SetDash { phase, segments } => {
                    let dash = segments
                        .iter()
                        .map(|value| fmt_pt(*value))
                        .collect::<Vec<_>>()
                        .join(" ");
                    let _ = writeln!(out, "[{}] {} d", dash, fmt_pt(*phase));
                }
                Command::DrawLine { x1, y1, x2, y2 } => {
                    let _ = writeln!(
                        out,
                        "{} {} m {} {} l S",
                        fmt_pt(*x1),
                        fmt_pt(height - *y1),
                        fmt_pt(*x2),
                        fmt_pt(height - *y2)
                    );
                }
                Command::FillRect {
                    x,
                    y,
                    width,
                    height: h,
                } => {
                    let _ = writeln!(
                        out,
                        "{} {} {} {} re f",
                        fmt_pt(*x),
                        fmt_pt(height - *y - *h),
                        fmt_pt(*width),
                        fmt_pt(*h)
                    );
                }
                Command::StrokeRect {
                    x,
                    y,
                    width,
                    height: h,
                } => {
                    let _ = writeln!(
                        out,
                        "{} {} {} {} re S",
                        fmt_pt(*x),
                        fmt_pt(height - *y - *h),
                        fmt_pt(*width),
                        fmt_pt(*h)
                    );
                }
                Command::BeginText => {
                    first_move = true;
                    out.push_str("BT\n");
                }
                Command::MoveText { dx, dy } => {
                    let ty = if first_move { height - *dy } else { -*dy };
                    first_move = false;
                    let _ = writeln!(out, "{} {} Td", fmt_pt(*dx), fmt_pt(ty));
                }
                Command::ShowText(text) => {
                    let encoded = self.encode_text(font, text);
                    let _ = writeln!(out, "({}) Tj", encoded);
                }
                Command::EndText => out.push_str("ET\n"),
                Command::DrawImage {
                    image,
                    x,
                    y,
                    width,
                    height: h,
                } => {
                    let Some(entry) = self.images.get(&image.key()) else {
                        continue;
                    };
                    let _ = writeln!(
                        out,
                        "q {} 0 0 {} {} {} cm /{} Do Q",
                        fmt_pt(*width),
                        fmt_pt(*h),
                        fmt_pt(*x),
                        fmt_pt(height - *y - *h),
                        entry.name
                    );
                }
            }
        }
        out
    }

    fn encode_text(&mut self, font: FontId, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for ch in text.chars() {
            let byte = match self.registry.encode(font, ch) {
                Some(byte) => byte,
                None => {
                    self.fallback_glyphs += 1;
                    FALLBACK_BYTE
                }
            };
            match byte {
                b'\\' => out.push_str("\\\\"),
                b'(' => out.push_str("\\("),
                b')' => out.push_str("\\)"),
                0x20..=0x7E => out.push(byte as char),
                _ => {
                    let _ = write!(out, "\\{:03o}", byte);
                }
            }
        }
        out
    }

    fn stream_object(&self, extra: &str, data: &[u8]) -> Vec<u8> {
        if self.compress {
            let packed = miniz_oxide::deflate::compress_to_vec_zlib(data, FLATE_LEVEL);
            let dict = if extra.is_empty() {
                "/Filter /FlateDecode".to_string()
            } else {
                format!("{} /Filter /FlateDecode", extra)
            };
            raw_stream_object(&dict, &packed)
        } else {
            raw_stream_object(extra, data)
        }
    }

    fn finish(self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n");
        let mut offsets = vec![0usize; self.objects.len()];
        for (id, body) in self.objects.iter().enumerate().skip(1) {
            let Some(body) = body else {
                continue;
            };
            offsets[id] = out.len();
            out.extend_from_slice(format!("{} 0 obj\n", id).as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }
        let xref_offset = out.len();
        let mut xref = format!("xref\n0 {}\n", self.objects.len());
        xref.push_str("0000000000 65535 f \n");
        for (id, offset) in offsets.iter().enumerate().skip(1) {
            if self.objects[id].is_some() {
                let _ = write!(xref, "{:010} 00000 n \n", offset);
            } else {
                xref.push_str("0000000000 65535 f \n");
            }
        }
        out.extend_from_slice(xref.as_bytes());
        let trailer = format!(
            "trailer\n<< /Size {} /Root {} 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF\n",
            self.objects.len(),
            CATALOG_ID,
            INFO_ID,
            xref_offset
        );
        out.extend_from_slice(trailer.as_bytes());
        out
    }
}

fn raw_stream_object(dict: &str, data: &[u8]) -> Vec<u8> {
    let head = if dict.is_empty() {
        format!("<< /Length {} >>\nstream\n", data.len())
    } else {
        format!("<< {} /Length {} >>\nstream\n", dict, data.len())
    };
    let mut out = head.into_bytes();
    out.extend_from_slice(data);
    out.extend_from_slice(b"\nendstream");
    out
}

fn type1_font_object(base_font: &str) -> String {
    format!(
        "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
        base_font
    )
}

fn truetype_font_object(base_font: &str, font: &RegisteredFont, descriptor_id: usize) -> String {
    let widths = font
        .metrics
        .widths
        .iter()
        .map(|w| w.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "<< /Type /Font /Subtype /TrueType /BaseFont /{} /FirstChar {} /LastChar {} /Widths [{}] /FontDescriptor {} 0 R /Encoding /WinAnsiEncoding >>",
        base_font, FIRST_CHAR, LAST_CHAR, widths, descriptor_id
    )
}

fn font_descriptor_object(base_font: &str, font: &RegisteredFont, file_id: usize) -> String {
    let metrics = &font.metrics;
    let mut flags = 32;
    if metrics.is_fixed_pitch {
        flags |= 1;
    }
    let (x_min, y_min, x_max, y_max) = metrics.bbox;
    format!(
        "<< /Type /FontDescriptor /FontName /{} /Flags {} /FontBBox [{} {} {} {}] /ItalicAngle {} /Ascent {} /Descent {} /CapHeight {} /StemV 80 /FontFile2 {} 0 R >>",
        base_font,
        flags,
        x_min,
        y_min,
        x_max,
        y_max,
        metrics.italic_angle,
        metrics.ascent,
        metrics.descent,
        metrics.cap_height,
        file_id
    )
}

fn sanitize_font_name(name: &str) -> String {
    let mut out = String::new();
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' {
            out.push(ch);
        } else if ch == ' ' {
            out.push('-');
        }
    }
    if out.is_empty() {
        "Helvetica".to_string()
    } else {
        out
    }
}

fn escape_pdf_string(input: &str) -> String {
    let mut out = String::new();
    for ch in input.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out
}

fn color_components(color: Color) -> String {
    format!(
        "{} {} {}",
        fmt(color.r.clamp(0.0, 1.0)),
        fmt(color.g.clamp(0.0, 1.0)),
        fmt(color.b.clamp(0.0, 1.0))
    )
}

fn fmt(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let fixed = I32F32::from_num(value);
    let scaled = (fixed * I32F32::from_num(1000)).round();
    let milli: i64 = scaled.to_num();
    format_milli(milli)
}

pub(crate) fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        format!("{}{}", sign, int_part)
    } else {
        let mut s = format!("{}{}.{:03}", sign, int_part, frac_part);
        while s.ends_with('0') {
            s.pop();
        }
        s
    }
}

pub(crate) fn fmt_pt(value: Pt) -> String {
    format_milli(value.to_milli_i64())
}
