use crate::canvas::Canvas;
use crate::diagnostics::{Diagnostics, LayoutOptions};
use crate::distribute::distribute_widths;
use crate::error::{FolioError, Result};
use crate::font::FontMetrics;
use crate::image::{ImageBlock, ImageResource};
use crate::list::BulletList;
use crate::outline;
use crate::placeholder::PageStamp;
use crate::spec::{Border, FontSpec, WidthSpec};
use crate::table::Table;
use crate::text::TextBlock;
use crate::types::{Color, Edges, Pt, Rect, Size};
use std::sync::Arc;

#[derive(Clone, Copy)]
pub struct LayoutContext<'a> {
    pub metrics: &'a dyn FontMetrics,
    pub options: &'a LayoutOptions,
    pub diagnostics: &'a Diagnostics,
}

impl<'a> LayoutContext<'a> {
    pub fn new(
        metrics: &'a dyn FontMetrics,
        options: &'a LayoutOptions,
        diagnostics: &'a Diagnostics,
    ) -> Self {
        Self {
            metrics,
            options,
            diagnostics,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub options: &'a LayoutOptions,
    pub stamp: PageStamp,
}

impl<'a> RenderContext<'a> {
    pub fn new(options: &'a LayoutOptions, stamp: PageStamp) -> Self {
        Self { options, stamp }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Prepared {
    #[default]
    Unprepared,
    Prepared(Size),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HAlign {
    #[default]
    Left,
    Center,
    Right,
}

impl HAlign {
    pub(crate) fn offset(self, available: Pt, used: Pt) -> Pt {
        let slack = (available - used).max(Pt::ZERO);
        match self {
            HAlign::Left => Pt::ZERO,
            HAlign::Center => slack / 2,
            HAlign::Right => slack,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spacer {
    pub height: Pt,
    pub width: Option<Pt>,
}

#[derive(Debug, Clone, Default)]
pub struct BoxBlock {
    pub child: Option<Box<Element>>,
    pub align: HAlign,
}

#[derive(Debug, Clone)]
pub struct RowCell {
    pub child: Element,
    pub width: WidthSpec,
}

#[derive(Debug, Clone, Default)]
pub struct RowBlock {
    pub cells: Vec<RowCell>,
    pub(crate) widths: Vec<Pt>,
}

#[derive(Debug, Clone, Default)]
pub struct ColumnBlock {
    pub children: Vec<Element>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageBreak {
    pub forced: bool,
}

#[derive(Debug, Clone)]
pub enum ElementKind {
    Text(TextBlock),
    Image(ImageBlock),
    Spacer(Spacer),
    Box(BoxBlock),
    Row(RowBlock),
    Column(ColumnBlock),
    Table(Table),
    BulletList(BulletList),
    PageBreak(PageBreak),
}

impl ElementKind {
    pub fn name(&self) -> &'static str {
        match self {
            ElementKind::Text(_) => "text",
            ElementKind::Image(_) => "image",
            ElementKind::Spacer(_) => "spacer",
            ElementKind::Box(_) => "box",
            ElementKind::Row(_) => "row",
            ElementKind::Column(_) => "column",
            ElementKind::Table(_) => "table",
            ElementKind::BulletList(_) => "bullet list",
            ElementKind::PageBreak(_) => "page break",
        }
    }

    pub fn children(&self) -> Vec<&Element> {
        match self {
            ElementKind::Text(_)
            | ElementKind::Image(_)
            | ElementKind::Spacer(_)
            | ElementKind::PageBreak(_) => Vec::new(),
            ElementKind::Box(block) => block.child.iter().map(|c| c.as_ref()).collect(),
            ElementKind::Row(row) => row.cells.iter().map(|c| &c.child).collect(),
            ElementKind::Column(column) => column.children.iter().collect(),
            ElementKind::Table(table) => table.children(),
            ElementKind::BulletList(list) => list.items.iter().collect(),
        }
    }

    pub(crate) fn children_mut(&mut self) -> Vec<&mut Element> {
        match self {
            ElementKind::Text(_)
            | ElementKind::Image(_)
            | ElementKind::Spacer(_)
            | ElementKind::PageBreak(_) => Vec::new(),
            ElementKind::Box(block) => block.child.iter_mut().map(|c| c.as_mut()).collect(),
            ElementKind::Row(row) => row.cells.iter_mut().map(|c| &mut c.child).collect(),
            ElementKind::Column(column) => column.children.iter_mut().collect(),
            ElementKind::Table(table) => table.children_mut(),
            ElementKind::BulletList(list) => list.items.iter_mut().collect(),
        }
    }

    fn reset_caches(&mut self) {
        match self {
            ElementKind::Text(text) => text.reset(),
            ElementKind::Image(image) => image.reset(),
            ElementKind::Row(row) => row.widths.clear(),
            ElementKind::Table(table) => table.reset(),
            ElementKind::BulletList(list) => list.reset(),
            ElementKind::Spacer(_)
            | ElementKind::Box(_)
            | ElementKind::Column(_)
            | ElementKind::PageBreak(_) => {}
        }
    }

    fn content_size(&self, layout_width: Pt) -> Result<Size> {
        match self {
            ElementKind::Text(text) => Ok(text.content_size(layout_width)),
            ElementKind::Image(image) => Ok(image.size()),
            ElementKind::Spacer(spacer) => Ok(Size::new(
                spacer.width.unwrap_or(Pt::ZERO),
                spacer.height,
            )),
            ElementKind::Box(block) => match &block.child {
                Some(child) => child.prepared_size(),
                None => Ok(Size::ZERO),
            },
            ElementKind::Row(row) => {
                let mut height = Pt::ZERO;
                for cell in &row.cells {
                    height = height.max(cell.child.prepared_size()?.height);
                }
                Ok(Size::new(row.widths.iter().sum(), height))
            }
            ElementKind::Column(column) => {
                let mut size = Size::ZERO;
                for child in &column.children {
                    let child_size = child.prepared_size()?;
                    size.width = size.width.max(child_size.width);
                    size.height += child_size.height;
                }
                Ok(size)
            }
            ElementKind::Table(table) => table.content_size(),
            ElementKind::BulletList(list) => list.content_size(),
            ElementKind::PageBreak(_) => Ok(Size::ZERO),
        }
    }
}

/// A node of the layout tree: shared outline attributes plus a kind payload.
#[derive(Debug, Clone)]
pub struct Element {
    id: Option<String>,
    pub(crate) margin: Edges,
    pub(crate) border: Border,
    pub(crate) padding: Edges,
    pub(crate) fill: Option<Color>,
    min_size: Size,
    max_size: Size,
    pub(crate) kind: ElementKind,
    prepared: Prepared,
    // Content width offered by the last prepare; split parts inherit it.
    pub(crate) layout_width: Pt,
}

impl Element {
    pub fn new(kind: ElementKind) -> Self {
        Self {
            id: None,
            margin: Edges::ZERO,
            border: Border::none(),
            padding: Edges::ZERO,
            fill: None,
            min_size: Size::ZERO,
            max_size: Size::UNBOUNDED,
            kind,
            prepared: Prepared::Unprepared,
            layout_width: Pt::ZERO,
        }
    }

    pub fn text(text: impl AsRef<str>, font: FontSpec) -> Self {
        Self::new(ElementKind::Text(TextBlock::new(text.as_ref(), font)))
    }

    pub fn image(resource: Arc<ImageResource>) -> Self {
        Self::new(ElementKind::Image(ImageBlock::new(resource)))
    }

    pub fn spacer(height: f32) -> Self {
        Self::new(ElementKind::Spacer(Spacer {
            height: Pt::from_f32(height).max(Pt::ZERO),
            width: None,
        }))
    }

    pub fn boxed(child: Element) -> Self {
        Self::new(ElementKind::Box(BoxBlock {
            child: Some(Box::new(child)),
            align: HAlign::Left,
        }))
    }

    pub fn empty_box() -> Self {
        Self::new(ElementKind::Box(BoxBlock::default()))
    }

    pub fn row(cells: Vec<(Element, WidthSpec)>) -> Self {
        Self::new(ElementKind::Row(RowBlock {
            cells: cells
                .into_iter()
                .map(|(child, width)| RowCell { child, width })
                .collect(),
            widths: Vec::new(),
        }))
    }

    pub fn column(children: Vec<Element>) -> Self {
        Self::new(ElementKind::Column(ColumnBlock { children }))
    }

    pub fn table(table: Table) -> Self {
        Self::new(ElementKind::Table(table))
    }

    pub fn bullet_list(list: BulletList) -> Self {
        Self::new(ElementKind::BulletList(list))
    }

    pub fn page_break() -> Self {
        Self::new(ElementKind::PageBreak(PageBreak { forced: true }))
    }

    pub fn soft_page_break() -> Self {
        Self::new(ElementKind::PageBreak(PageBreak { forced: false }))
    }

    pub(crate) fn vacant(width: Pt) -> Self {
        let mut element = Self::new(ElementKind::Spacer(Spacer {
            height: Pt::ZERO,
            width: Some(width),
        }));
        element.prepared = Prepared::Prepared(Size::new(width, Pt::ZERO));
        element
    }

    pub(crate) fn vacant_box() -> Self {
        let mut element = Self::empty_box();
        element.prepared = Prepared::Prepared(Size::ZERO);
        element
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_margin(mut self, margin: Edges) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_border(mut self, border: Border) -> Self {
        self.border = border;
        self
    }

    pub fn with_padding(mut self, padding: Edges) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_fill(mut self, color: Color) -> Self {
        self.fill = Some(color);
        self
    }

    pub fn with_min_size(mut self, size: Size) -> Self {
        self.min_size = size;
        self
    }

    pub fn with_max_size(mut self, size: Size) -> Self {
        self.max_size = size;
        self
    }

    pub fn with_align(mut self, align: HAlign) -> Self {
        match &mut self.kind {
            ElementKind::Text(text) => text.align = align,
            ElementKind::Box(block) => block.align = align,
            _ => {}
        }
        self
    }

    pub fn with_line_spacing(mut self, factor: f32) -> Self {
        if let ElementKind::Text(text) = &mut self.kind {
            text.line_spacing = if factor.is_finite() && factor > 0.0 {
                factor
            } else {
                1.0
            };
        }
        self
    }

    pub fn with_size(mut self, width: Option<f32>, height: Option<f32>) -> Self {
        let to_pt = |v: f32| Pt::from_f32(v).max(Pt::ZERO);
        match &mut self.kind {
            ElementKind::Spacer(spacer) => {
                spacer.width = width.map(to_pt);
                if let Some(height) = height {
                    spacer.height = to_pt(height);
                }
            }
            ElementKind::Image(image) => {
                image.width = width.map(to_pt);
                image.height = height.map(to_pt);
            }
            _ => {}
        }
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn margin(&self) -> Edges {
        self.margin
    }

    pub fn border(&self) -> &Border {
        &self.border
    }

    pub fn padding(&self) -> Edges {
        self.padding
    }

    pub fn fill(&self) -> Option<Color> {
        self.fill
    }

    pub fn min_size(&self) -> Size {
        self.min_size
    }

    pub fn max_size(&self) -> Size {
        self.max_size
    }

    pub fn prepared(&self) -> Prepared {
        self.prepared
    }

    pub fn is_prepared(&self) -> bool {
        matches!(self.prepared, Prepared::Prepared(_))
    }

    pub fn is_page_break(&self) -> bool {
        matches!(self.kind, ElementKind::PageBreak(_))
    }

    pub fn prepared_size(&self) -> Result<Size> {
        match self.prepared {
            Prepared::Prepared(size) => Ok(size),
            Prepared::Unprepared => Err(FolioError::NotPrepared {
                kind: self.kind.name(),
            }),
        }
    }

    pub fn outline(&self) -> Edges {
        self.margin + self.border.widths() + self.padding
    }

    /// Measures this node against `available` (outline included) and
    /// returns its outer size.
    pub fn prepare(&mut self, ctx: &LayoutContext<'_>, available: Size) -> Result<Size> {
        if self.is_prepared() {
            return Err(FolioError::AlreadyPrepared {
                kind: self.kind.name(),
            });
        }
        let outline = self.outline();
        if !outline.is_non_negative() {
            return Err(FolioError::layout(format!(
                "{} element has a negative outline",
                self.kind.name()
            )));
        }
        let content = available - outline.size();
        self.layout_width = content.width;
        match &mut self.kind {
            ElementKind::Text(text) => text.layout(ctx, content.width)?,
            ElementKind::Image(image) => image.layout(content.width),
            ElementKind::Spacer(_) | ElementKind::PageBreak(_) => {}
            ElementKind::Box(block) => {
                if let Some(child) = block.child.as_mut() {
                    child.prepare(ctx, content)?;
                }
            }
            ElementKind::Row(row) => layout_row(row, ctx, content)?,
            ElementKind::Column(column) => {
                for child in &mut column.children {
                    child.prepare(ctx, content)?;
                }
            }
            ElementKind::Table(table) => table.layout(ctx, content)?,
            ElementKind::BulletList(list) => list.layout(ctx, content)?,
        }
        self.seal()
    }

    pub(crate) fn seal(&mut self) -> Result<Size> {
        let content = self.kind.content_size(self.layout_width)?;
        let outer = (content + self.outline().size()).clamp(self.min_size, self.max_size);
        if outer.width.is_unbounded() || outer.height.is_unbounded() || !outer.is_finite() {
            return Err(FolioError::layout(format!(
                "{} element has no finite size",
                self.kind.name()
            )));
        }
        self.prepared = Prepared::Prepared(outer);
        Ok(outer)
    }

    /// Drops prepared geometry for this node and everything below it.
    pub fn mark_not_prepared(&mut self) {
        let mut stack: Vec<&mut Element> = vec![self];
        while let Some(node) = stack.pop() {
            node.prepared = Prepared::Unprepared;
            node.kind.reset_caches();
            stack.extend(node.kind.children_mut());
        }
    }

    /// Pre-order traversal with depth, driven by an explicit stack.
    pub fn walk<'a>(&'a self, mut visit: impl FnMut(&'a Element, usize)) {
        let mut stack: Vec<(&'a Element, usize)> = vec![(self, 0)];
        while let Some((node, depth)) = stack.pop() {
            visit(node, depth);
            for child in node.kind.children().into_iter().rev() {
                stack.push((child, depth + 1));
            }
        }
    }

    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.walk(|_, _| count += 1);
        count
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.walk(|node, _| {
            if let ElementKind::Text(text) = &node.kind {
                out.push_str(&text.content());
            }
        });
        out
    }

    pub fn has_content(&self) -> bool {
        match &self.kind {
            ElementKind::Text(_) | ElementKind::Image(_) => true,
            ElementKind::Spacer(_) => self
                .prepared_size()
                .map(|size| size.height > Pt::ZERO)
                .unwrap_or(false),
            ElementKind::Box(block) => block.child.as_ref().is_some_and(|c| c.has_content()),
            ElementKind::Row(row) => row.cells.iter().any(|c| c.child.has_content()),
            ElementKind::Column(column) => column.children.iter().any(|c| c.has_content()),
            ElementKind::Table(table) => table.has_body_content(),
            ElementKind::BulletList(list) => list.items.iter().any(|c| c.has_content()),
            ElementKind::PageBreak(_) => false,
        }
    }

    pub(crate) fn stretched(&self, target: Size) -> Result<Size> {
        let size = self.prepared_size()?;
        Ok(Size::new(
            size.width.max(target.width.min(self.max_size.width)),
            size.height.max(target.height.min(self.max_size.height)),
        ))
    }

    pub fn render(
        &self,
        ctx: &RenderContext<'_>,
        canvas: &mut Canvas,
        x: Pt,
        y: Pt,
    ) -> Result<()> {
        let size = self.prepared_size()?;
        self.render_sized(ctx, canvas, x, y, size)
    }

    pub(crate) fn render_sized(
        &self,
        ctx: &RenderContext<'_>,
        canvas: &mut Canvas,
        x: Pt,
        y: Pt,
        outer: Size,
    ) -> Result<()> {
        self.prepared_size()?;
        let margin_box = Rect::new(x, y, outer);
        outline::paint(
            canvas,
            ctx.options,
            margin_box,
            self.margin,
            &self.border,
            self.fill,
        );
        let content = margin_box.inset(self.outline());
        match &self.kind {
            ElementKind::Text(text) => text.render(ctx, canvas, content),
            ElementKind::Image(image) => image.render(canvas, content),
            ElementKind::Spacer(_) | ElementKind::PageBreak(_) => {}
            ElementKind::Box(block) => {
                if let Some(child) = &block.child {
                    let size = child.prepared_size()?;
                    let offset = block.align.offset(content.width, size.width);
                    child.render(ctx, canvas, content.x + offset, content.y)?;
                }
            }
            ElementKind::Row(row) => {
                let mut cursor = content.x;
                for (cell, width) in row.cells.iter().zip(&row.widths) {
                    let outer = cell.child.stretched(Size::new(*width, content.height))?;
                    cell.child
                        .render_sized(ctx, canvas, cursor, content.y, outer)?;
                    cursor += *width;
                }
            }
            ElementKind::Column(column) => {
                let mut cursor = content.y;
                for child in &column.children {
                    let size = child.prepared_size()?;
                    let outer = child.stretched(Size::new(content.width, size.height))?;
                    child.render_sized(ctx, canvas, content.x, cursor, outer)?;
                    cursor += size.height;
                }
            }
            ElementKind::Table(table) => table.render(ctx, canvas, content)?,
            ElementKind::BulletList(list) => list.render(ctx, canvas, content)?,
        }
        Ok(())
    }

    pub(crate) fn into_parts(mut self) -> (Shell, ElementKind) {
        let kind = std::mem::replace(
            &mut self.kind,
            ElementKind::PageBreak(PageBreak { forced: false }),
        );
        (Shell(self), kind)
    }
}

pub(crate) struct Shell(Element);

impl Shell {
    pub(crate) fn restore(self, kind: ElementKind) -> Element {
        let mut element = self.0;
        element.kind = kind;
        element
    }

    // Parts drop the minimum size: a part must never grow past the height
    // it was split to fit.
    pub(crate) fn part(&self, kind: ElementKind) -> Result<Element> {
        let mut element = Element {
            id: self.0.id.clone(),
            margin: self.0.margin,
            border: self.0.border.clone(),
            padding: self.0.padding,
            fill: self.0.fill,
            min_size: Size::ZERO,
            max_size: self.0.max_size,
            kind,
            prepared: Prepared::Unprepared,
            layout_width: self.0.layout_width,
        };
        element.seal()?;
        Ok(element)
    }

    pub(crate) fn outline(&self) -> Edges {
        self.0.outline()
    }

    pub(crate) fn layout_width(&self) -> Pt {
        self.0.layout_width
    }
}

fn layout_row(row: &mut RowBlock, ctx: &LayoutContext<'_>, content: Size) -> Result<()> {
    let specs: Vec<WidthSpec> = row.cells.iter().map(|cell| cell.width).collect();
    let widths = {
        let cells = &mut row.cells;
        distribute_widths(content.width, &specs, |index, remaining| {
            let child = &mut cells[index].child;
            let size = child.prepare(ctx, Size::new(remaining, content.height))?;
            child.mark_not_prepared();
            Ok(size.width)
        })?
    };
    for (cell, width) in row.cells.iter_mut().zip(&widths) {
        cell.child.prepare(ctx, Size::new(*width, content.height))?;
    }
    row.widths = widths;
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::font::testing::FixedAdvance;

    pub(crate) struct Harness {
        pub(crate) metrics: FixedAdvance,
        pub(crate) options: LayoutOptions,
        pub(crate) diagnostics: Diagnostics,
    }

    impl Harness {
        pub(crate) fn new() -> Self {
            Self {
                metrics: FixedAdvance,
                options: LayoutOptions::default(),
                diagnostics: Diagnostics::new(),
            }
        }

        pub(crate) fn ctx(&self) -> LayoutContext<'_> {
            LayoutContext::new(&self.metrics, &self.options, &self.diagnostics)
        }

        pub(crate) fn render_ctx(&self) -> RenderContext<'_> {
            RenderContext::new(&self.options, PageStamp::default())
        }
    }

    // 5pt per char, 12pt lines.
    pub(crate) fn text(value: &str) -> Element {
        Element::text(value, FontSpec::helvetica(10.0).expect("font spec"))
    }

    pub(crate) fn pt(value: f32) -> Pt {
        Pt::from_f32(value)
    }

    pub(crate) fn size(width: f32, height: f32) -> Size {
        Size::from_f32(width, height)
    }
}
