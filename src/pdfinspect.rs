use crate::error::{FolioError, Result};
use lopdf::{Dictionary, Document as LoDocument, Object as LoObject};
use std::collections::BTreeSet;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct PdfInspectReport {
    pub pdf_version: String,
    pub page_count: usize,
    pub file_size_bytes: usize,
    pub page_sizes: Vec<(f32, f32)>,
    pub fonts: BTreeSet<String>,
}

pub fn inspect_pdf_bytes(bytes: &[u8]) -> Result<PdfInspectReport> {
    let pdf = LoDocument::load_mem(bytes).map_err(|err| FolioError::Inspect(err.to_string()))?;
    let pages = pdf.get_pages();
    let mut page_sizes = Vec::with_capacity(pages.len());
    for id in pages.values() {
        let page = pdf
            .get_dictionary(*id)
            .map_err(|err| FolioError::Inspect(err.to_string()))?;
        page_sizes.push(media_box(page).unwrap_or((0.0, 0.0)));
    }

    let fonts = pdf
        .objects
        .values()
        .filter_map(|object| object.as_dict().ok())
        .filter(|dict| name_of(dict, b"Type").as_deref() == Some("Font"))
        .filter_map(|dict| name_of(dict, b"BaseFont"))
        .collect();

    Ok(PdfInspectReport {
        pdf_version: pdf.version.clone(),
        page_count: pages.len(),
        file_size_bytes: bytes.len(),
        page_sizes,
        fonts,
    })
}

pub fn inspect_pdf_path(path: impl AsRef<Path>) -> Result<PdfInspectReport> {
    let data = std::fs::read(path)?;
    inspect_pdf_bytes(&data)
}

fn media_box(page: &Dictionary) -> Option<(f32, f32)> {
    let values = page.get(b"MediaBox").ok()?.as_array().ok()?;
    let coords: Vec<f32> = values
        .iter()
        .map(LoObject::as_float)
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    match coords.as_slice() {
        [x0, y0, x1, y1] => Some((x1 - x0, y1 - y0)),
        _ => None,
    }
}

fn name_of(dict: &Dictionary, key: &[u8]) -> Option<String> {
    let name = dict.get(key).ok()?.as_name().ok()?;
    Some(String::from_utf8_lossy(name).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use crate::diagnostics::{Diagnostics, LayoutOptions};
    use crate::font::{FontId, FontRegistry};
    use crate::pdf::write_pdf;
    use crate::types::{Pt, Size};

    fn two_page_pdf() -> Vec<u8> {
        let mut canvas = Canvas::new(Size::a4());
        canvas.set_font(FontId::HELVETICA, Pt::from_f32(12.0));
        canvas.begin_text();
        canvas.move_text(Pt::from_f32(72.0), Pt::from_f32(72.0));
        canvas.draw_string("hello");
        canvas.end_text();
        canvas.show_page_with_size(Size::from_f32(200.0, 100.0));
        canvas.set_font(FontId::COURIER, Pt::from_f32(12.0));
        canvas.fill_rect(Pt::ZERO, Pt::ZERO, Pt::from_f32(5.0), Pt::from_f32(5.0));
        let document = canvas.finish();
        write_pdf(
            &document,
            &FontRegistry::new(),
            &LayoutOptions::default(),
            &Diagnostics::new(),
        )
        .unwrap()
    }

    #[test]
    fn reports_pages_sizes_and_fonts() {
        let bytes = two_page_pdf();
        let report = inspect_pdf_bytes(&bytes).unwrap();
        assert_eq!(report.pdf_version, "1.7");
        assert_eq!(report.page_count, 2);
        assert_eq!(report.file_size_bytes, bytes.len());
        assert_eq!(report.page_sizes[1], (200.0, 100.0));
        assert!((report.page_sizes[0].0 - 595.28).abs() < 0.01);
        assert!(report.fonts.contains("Helvetica"));
        assert!(report.fonts.contains("Courier"));
    }

    #[test]
    fn garbage_is_an_inspection_error() {
        let err = inspect_pdf_bytes(b"not a pdf").unwrap_err();
        assert!(matches!(err, FolioError::Inspect(_)));
    }

    #[test]
    fn inspects_files_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        std::fs::write(&path, two_page_pdf()).unwrap();
        assert_eq!(inspect_pdf_path(&path).unwrap().page_count, 2);
        assert!(matches!(
            inspect_pdf_path(dir.path().join("missing.pdf")),
            Err(FolioError::Render(_))
        ));
    }
}
