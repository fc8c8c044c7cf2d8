mod canvas;
mod diagnostics;
mod distribute;
mod element;
mod error;
mod font;
mod image;
mod list;
mod metrics;
mod outline;
mod page_set;
mod paginate;
mod pdf;
mod pdfinspect;
mod persist;
mod placeholder;
mod spec;
mod split;
mod table;
mod text;
mod types;

pub use canvas::{Canvas, Command, Document, Page};
pub use diagnostics::{Diagnostics, LayoutOptions};
pub use distribute::distribute_widths;
pub use element::{
    BoxBlock, ColumnBlock, Element, ElementKind, HAlign, LayoutContext, PageBreak, Prepared,
    RenderContext, RowBlock, RowCell, Spacer,
};
pub use error::{FolioError, Result};
pub use font::{FontId, FontMetrics, FontRegistry};
pub use crate::image::{ImageBlock, ImageEncoding, ImageResource};
pub use list::{BulletList, Marker};
pub use metrics::{DocumentMetrics, PageMetrics};
pub use page_set::PageSet;
pub use paginate::{PageContent, PaginatedSet, Placement, paginate, render_pages};
pub use pdf::write_pdf;
pub use pdfinspect::{PdfInspectReport, inspect_pdf_bytes, inspect_pdf_path};
pub use persist::{XmlAttributes, font_from_xml, font_to_xml, read_font};
pub use placeholder::PageStamp;
pub use spec::{
    Border, BorderStyle, CellRange, DashPattern, Extent, FontSpec, HeightSpec, Side, WidthSpec,
};
pub use split::SplitOutcome;
pub use table::{GridEdges, Table, TableCell, TableRow};
pub use text::{Line, LineFit, TextBlock, fit_lines, normalize_newlines};
pub use types::{Color, Edges, Pt, Rect, Size};

use std::path::{Path, PathBuf};

/// One document session: fonts, page sets and output switches.
#[derive(Debug)]
pub struct Folio {
    registry: FontRegistry,
    page_sets: Vec<PageSet>,
    options: LayoutOptions,
}

/// Everything a render produced besides the bytes.
#[derive(Debug, Clone)]
pub struct RenderReport {
    pub bytes: Vec<u8>,
    pub metrics: DocumentMetrics,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FolioBuilder {
    font_files: Vec<PathBuf>,
    font_data: Vec<(Vec<u8>, Option<String>)>,
    page_sets: Vec<PageSet>,
    options: Option<LayoutOptions>,
}

impl FolioBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn font_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_files.push(path.into());
        self
    }

    pub fn font_bytes(mut self, data: Vec<u8>, name: Option<&str>) -> Self {
        self.font_data.push((data, name.map(str::to_string)));
        self
    }

    pub fn page_set(mut self, set: PageSet) -> Self {
        self.page_sets.push(set);
        self
    }

    pub fn options(mut self, options: LayoutOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn debug_outlines(mut self, enabled: bool) -> Self {
        self.options = Some(self.current_options().with_debug_outlines(enabled));
        self
    }

    pub fn compress_streams(mut self, enabled: bool) -> Self {
        self.options = Some(self.current_options().with_compression(enabled));
        self
    }

    pub fn placeholder_digits(mut self, digits: usize) -> Self {
        self.options = Some(self.current_options().with_placeholder_digits(digits));
        self
    }

    fn current_options(&self) -> LayoutOptions {
        self.options.clone().unwrap_or_else(LayoutOptions::from_env)
    }

    pub fn build(self) -> Result<Folio> {
        let options = self.current_options();
        let mut registry = FontRegistry::new();
        for file in &self.font_files {
            registry.register_file(file)?;
        }
        for (data, name) in self.font_data {
            registry.register_bytes(data, name.as_deref())?;
        }
        log::debug!(
            "folio session: {} font(s), {} page set(s)",
            registry.len(),
            self.page_sets.len()
        );
        Ok(Folio {
            registry,
            page_sets: self.page_sets,
            options,
        })
    }
}

impl Default for Folio {
    fn default() -> Self {
        Self::new()
    }
}

impl Folio {
    pub fn builder() -> FolioBuilder {
        FolioBuilder::new()
    }

    pub fn new() -> Self {
        Self {
            registry: FontRegistry::new(),
            page_sets: Vec::new(),
            options: LayoutOptions::from_env(),
        }
    }

    pub fn registry(&self) -> &FontRegistry {
        &self.registry
    }

    pub fn options(&self) -> &LayoutOptions {
        &self.options
    }

    pub fn font(&self, name: &str) -> Result<FontId> {
        self.registry.resolve(name)
    }

    pub fn register_font_file(&mut self, path: impl AsRef<Path>) -> Result<FontId> {
        self.registry.register_file(path)
    }

    pub fn register_font_bytes(&mut self, data: Vec<u8>, name: Option<&str>) -> Result<FontId> {
        self.registry.register_bytes(data, name)
    }

    pub fn push_page_set(&mut self, set: PageSet) {
        self.page_sets.push(set);
    }

    pub fn page_sets(&self) -> &[PageSet] {
        &self.page_sets
    }

    /// Rejects documents that cannot be laid out before any work is done.
    pub fn validate(&self) -> Result<()> {
        let content = self
            .page_sets
            .iter()
            .flat_map(|set| set.elements())
            .filter(|element| !element.is_page_break())
            .count();
        if content == 0 {
            return Err(FolioError::EmptyDocument);
        }
        for set in &self.page_sets {
            set.validate()?;
            let roots = set
                .elements()
                .iter()
                .chain(set.header())
                .chain(set.footer());
            for root in roots {
                self.validate_tree(root)?;
            }
        }
        Ok(())
    }

    fn validate_tree(&self, root: &Element) -> Result<()> {
        let mut failure = None;
        root.walk(|node, _| {
            if failure.is_some() {
                return;
            }
            if !node.margin().is_non_negative() || !node.padding().is_non_negative() {
                failure = Some(FolioError::config(format!(
                    "{} element has a negative margin or padding",
                    node.kind().name()
                )));
                return;
            }
            let font = match node.kind() {
                ElementKind::Text(text) => Some(text.font().font),
                ElementKind::BulletList(list) => Some(list.font().font),
                _ => None,
            };
            if let Some(font) = font {
                if !self.registry.contains(font) {
                    failure = Some(FolioError::config(format!(
                        "font id {} is not registered",
                        font.index()
                    )));
                }
            }
        });
        failure.map_or(Ok(()), Err)
    }

    fn lay_out(&self, diagnostics: &Diagnostics) -> Result<(Document, DocumentMetrics)> {
        self.validate()?;
        let ctx = LayoutContext::new(&self.registry, &self.options, diagnostics);
        let mut paginated = Vec::with_capacity(self.page_sets.len());
        for set in &self.page_sets {
            paginated.push(paginate(set, &ctx)?);
        }
        let (document, mut metrics) = render_pages(&paginated, &self.options)?;
        metrics.splits = diagnostics.counter("split.done");
        Ok((document, metrics))
    }

    pub fn layout(&self) -> Result<Document> {
        let diagnostics = Diagnostics::new();
        self.lay_out(&diagnostics).map(|(document, _)| document)
    }

    pub fn render(&self) -> Result<Vec<u8>> {
        self.render_with_report().map(|report| report.bytes)
    }

    pub fn render_with_report(&self) -> Result<RenderReport> {
        let diagnostics = Diagnostics::new();
        let (document, mut metrics) = self.lay_out(&diagnostics)?;
        let bytes = write_pdf(&document, &self.registry, &self.options, &diagnostics)?;
        metrics.total_bytes = bytes.len();
        log::info!(
            "rendered {} page(s), {} bytes, {} warning(s)",
            metrics.page_count(),
            bytes.len(),
            diagnostics.warning_count()
        );
        Ok(RenderReport {
            bytes,
            metrics,
            warnings: diagnostics.warnings(),
        })
    }

    /// Nothing is written unless the whole render succeeded.
    pub fn render_to_path(&self, path: impl AsRef<Path>) -> Result<DocumentMetrics> {
        let report = self.render_with_report()?;
        std::fs::write(path, &report.bytes)?;
        Ok(report.metrics)
    }

    pub fn render_to_writer<W: std::io::Write>(&self, writer: &mut W) -> Result<DocumentMetrics> {
        let report = self.render_with_report()?;
        writer.write_all(&report.bytes)?;
        Ok(report.metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(size: f32) -> FontSpec {
        FontSpec::helvetica(size).unwrap()
    }

    fn folio_with(set: PageSet) -> Folio {
        Folio::builder()
            .options(LayoutOptions::default())
            .page_set(set)
            .build()
            .unwrap()
    }

    fn page_contains_text(page: &Page, needle: &str) -> bool {
        page.contains_text(needle)
    }

    #[test]
    fn empty_documents_are_rejected() {
        let folio = folio_with(PageSet::a4().with_element(Element::page_break()));
        assert!(matches!(folio.render(), Err(FolioError::EmptyDocument)));
        let folio = Folio::builder().build().unwrap();
        assert!(matches!(folio.layout(), Err(FolioError::EmptyDocument)));
    }

    #[test]
    fn unknown_fonts_fail_before_layout() {
        let font = FontSpec::new(FontId(9), 10.0, Color::BLACK).unwrap();
        let folio = folio_with(PageSet::a4().with_element(Element::text("x", font)));
        assert!(matches!(folio.render(), Err(FolioError::Configuration(_))));
    }

    #[test]
    fn negative_margins_are_configuration_errors() {
        let element = Element::text("x", body(10.0)).with_margin(Edges::new(-1.0, 0.0, 0.0, 0.0));
        let folio = folio_with(PageSet::a4().with_element(element));
        assert!(matches!(folio.validate(), Err(FolioError::Configuration(_))));
    }

    #[test]
    fn long_documents_render_to_valid_pdf() {
        let paragraph = "The quick brown fox jumps over the lazy dog. ".repeat(40);
        let mut set = PageSet::letter()
            .with_margin(Edges::all(72.0))
            .with_footer(Element::text("Page {page} of {pages}", body(9.0)));
        for _ in 0..12 {
            set.push(Element::text(&paragraph, body(12.0)));
            set.push(Element::spacer(12.0));
        }
        let folio = folio_with(set);
        let report = folio.render_with_report().unwrap();
        let inspected = inspect_pdf_bytes(&report.bytes).unwrap();
        assert!(inspected.page_count > 1);
        assert_eq!(inspected.page_count, report.metrics.page_count());
        assert_eq!(report.metrics.total_bytes, report.bytes.len());
        assert!(report.metrics.splits > 0);

        let document = folio.layout().unwrap();
        let last = document.page_count();
        assert!(page_contains_text(&document.pages[0], &format!("Page 1 of {last}")));
        assert!(page_contains_text(
            &document.pages[last - 1],
            &format!("Page {last} of {last}")
        ));
    }

    #[test]
    fn page_sets_keep_their_page_sizes() {
        let folio = Folio::builder()
            .options(LayoutOptions::default())
            .page_set(PageSet::a4().with_element(Element::text("portrait", body(12.0))))
            .page_set(
                PageSet::new(Size::from_f32(400.0, 200.0))
                    .with_element(Element::text("landscape", body(12.0))),
            )
            .build()
            .unwrap();
        let report = inspect_pdf_bytes(&folio.render().unwrap()).unwrap();
        assert_eq!(report.page_count, 2);
        assert_eq!(report.page_sizes[1], (400.0, 200.0));
    }

    #[test]
    fn lossy_characters_are_reported() {
        let folio = folio_with(PageSet::a4().with_element(Element::text("\u{4E2D}\u{6587}", body(12.0))));
        let report = folio.render_with_report().unwrap();
        assert!(report.warnings.iter().any(|w| w.contains("WinAnsi")));
    }

    #[test]
    fn render_to_path_writes_only_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let ok = dir.path().join("ok.pdf");
        let metrics = folio_with(PageSet::a4().with_element(Element::text("hi", body(12.0))))
            .render_to_path(&ok)
            .unwrap();
        assert_eq!(metrics.page_count(), 1);
        assert_eq!(inspect_pdf_path(&ok).unwrap().page_count, 1);

        let failed = dir.path().join("failed.pdf");
        let empty = Folio::builder().build().unwrap();
        assert!(empty.render_to_path(&failed).is_err());
        assert!(!failed.exists());
    }

    #[test]
    fn builder_options_are_applied() {
        let folio = Folio::builder()
            .options(LayoutOptions::default())
            .debug_outlines(true)
            .compress_streams(false)
            .placeholder_digits(0)
            .build()
            .unwrap();
        assert!(folio.options().debug_outlines);
        assert!(!folio.options().compress_streams);
        assert_eq!(folio.options().placeholder_digits, 1);
        assert_eq!(folio.font("courier").unwrap(), FontId::COURIER);
    }
}
