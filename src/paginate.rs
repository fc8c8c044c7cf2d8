use crate::canvas::{Canvas, Document};
use crate::diagnostics::LayoutOptions;
use crate::element::{Element, ElementKind, LayoutContext, RenderContext};
use crate::error::{FolioError, Result};
use crate::metrics::{DocumentMetrics, PageMetrics};
use crate::outline;
use crate::page_set::PageSet;
use crate::placeholder::PageStamp;
use crate::spec::Border;
use crate::split::SplitOutcome;
use crate::types::{Color, Edges, Pt, Rect, Size};
use std::collections::VecDeque;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct Placement {
    pub element: Element,
    pub y: Pt,
    pub source: usize,
}

#[derive(Debug, Clone, Default)]
pub struct PageContent {
    pub placements: Vec<Placement>,
    pub used: Pt,
    pub overflowed: bool,
}

impl PageContent {
    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct PaginatedSet {
    pub page_size: Size,
    margin: Edges,
    fill: Option<Color>,
    content: Rect,
    body: Rect,
    header: Option<Element>,
    footer: Option<Element>,
    pub pages: Vec<PageContent>,
}

impl PaginatedSet {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn body(&self) -> Rect {
        self.body
    }
}

struct Paginator<'a> {
    ctx: &'a LayoutContext<'a>,
    width: Pt,
    height: Pt,
    pages: Vec<PageContent>,
    current: PageContent,
    // Opened by a forced break: kept even when nothing lands on it.
    forced_open: bool,
}

impl<'a> Paginator<'a> {
    fn remaining(&self) -> Pt {
        self.height - self.current.used
    }

    fn place(&mut self, element: Element, source: usize) -> Result<()> {
        let height = element.prepared_size()?.height;
        log::trace!(
            "place {} at {} on page {}",
            element.kind().name(),
            self.current.used,
            self.pages.len() + 1
        );
        self.current.placements.push(Placement {
            element,
            y: self.current.used,
            source,
        });
        self.current.used += height;
        Ok(())
    }

    fn new_page(&mut self, reason: &str) {
        log::debug!("page break after page {} ({reason})", self.pages.len() + 1);
        self.ctx.diagnostics.increment("paginate.page_breaks", 1);
        let page = std::mem::take(&mut self.current);
        self.pages.push(page);
        self.forced_open = false;
    }

    fn finish(mut self) -> Vec<PageContent> {
        if !self.current.is_empty() || self.pages.is_empty() || self.forced_open {
            let page = std::mem::take(&mut self.current);
            self.pages.push(page);
        }
        self.pages
    }
}

/// Distributes a page set's elements over as many pages as they need.
pub fn paginate(set: &PageSet, ctx: &LayoutContext<'_>) -> Result<PaginatedSet> {
    set.validate()?;
    let content = set.content_box();
    let full = Size::new(content.width, content.height);

    let header = prepare_fixed(set.header(), ctx, full)?;
    let footer = prepare_fixed(set.footer(), ctx, full)?;
    let header_height = fixed_height(&header)?;
    let footer_height = fixed_height(&footer)?;
    let body_height = content.height - header_height - footer_height;
    if body_height <= Pt::ZERO {
        return Err(FolioError::layout(
            "header and footer leave no room for page content",
        ));
    }
    let body = Rect::new(
        content.x,
        content.y + header_height,
        Size::new(content.width, body_height),
    );

    let mut paginator = Paginator {
        ctx,
        width: content.width,
        height: body_height,
        pages: Vec::new(),
        current: PageContent::default(),
        forced_open: false,
    };
    let mut queue: VecDeque<(Element, usize)> = set
        .elements()
        .iter()
        .cloned()
        .enumerate()
        .map(|(source, element)| (element, source))
        .collect();

    while let Some((mut element, source)) = queue.pop_front() {
        if let ElementKind::PageBreak(page_break) = element.kind() {
            if page_break.forced {
                paginator.new_page("forced break");
                paginator.forced_open = true;
            } else if !paginator.current.is_empty() {
                paginator.new_page("soft break");
            }
            continue;
        }
        if !element.is_prepared() {
            element.prepare(ctx, Size::new(paginator.width, paginator.height))?;
        }
        let height = element.prepared_size()?.height;
        let remaining = paginator.remaining();
        if height <= remaining {
            paginator.place(element, source)?;
            continue;
        }
        if remaining <= Pt::ZERO && !paginator.current.is_empty() {
            paginator.new_page("page full");
            queue.push_front((element, source));
            continue;
        }

        let whole = match element.split(ctx, Size::new(paginator.width, remaining))? {
            SplitOutcome::Split { first, second } if first.has_content() => {
                let first_height = first.prepared_size()?.height;
                if first_height > remaining {
                    ctx.diagnostics.warn(format!(
                        "{} part of height {} overflows the {} left on the page",
                        first.kind().name(),
                        first_height,
                        remaining
                    ));
                    paginator.current.overflowed = true;
                }
                paginator.place(first, source)?;
                paginator.new_page("split");
                if second.has_content() || second.prepared_size()?.height > Pt::ZERO {
                    queue.push_front((second, source));
                }
                continue;
            }
            SplitOutcome::Split { second, .. } => second,
            SplitOutcome::Refused(element) => element,
        };
        if paginator.current.is_empty() {
            ctx.diagnostics.warn(format!(
                "{} element of height {} overflows a page of height {}",
                whole.kind().name(),
                whole.prepared_size()?.height,
                paginator.height
            ));
            paginator.current.overflowed = true;
            paginator.place(whole, source)?;
        } else {
            paginator.new_page("refused split");
            queue.push_front((whole, source));
        }
    }

    let pages = paginator.finish();
    ctx.diagnostics.increment("paginate.pages", pages.len() as u64);
    Ok(PaginatedSet {
        page_size: set.page_size(),
        margin: set.margin(),
        fill: set.fill(),
        content,
        body,
        header,
        footer,
        pages,
    })
}

fn prepare_fixed(
    element: Option<&Element>,
    ctx: &LayoutContext<'_>,
    available: Size,
) -> Result<Option<Element>> {
    let Some(element) = element else {
        return Ok(None);
    };
    let mut element = element.clone();
    if !element.is_prepared() {
        element.prepare(ctx, available)?;
    }
    Ok(Some(element))
}

fn fixed_height(element: &Option<Element>) -> Result<Pt> {
    match element {
        Some(element) => Ok(element.prepared_size()?.height),
        None => Ok(Pt::ZERO),
    }
}

/// Renders every page of `sets` in order with document-wide page numbers.
pub fn render_pages(
    sets: &[PaginatedSet],
    options: &LayoutOptions,
) -> Result<(Document, DocumentMetrics)> {
    let total: usize = sets.iter().map(PaginatedSet::page_count).sum();
    let mut metrics = DocumentMetrics::default();
    let Some(first) = sets.iter().find(|set| set.page_count() > 0) else {
        return Ok((Document::default(), metrics));
    };
    let mut canvas = Canvas::new(first.page_size);
    let sizes: Vec<Size> = sets
        .iter()
        .flat_map(|set| std::iter::repeat_n(set.page_size, set.page_count()))
        .collect();

    let mut page_number = 0usize;
    for (set_index, set) in sets.iter().enumerate() {
        for page in &set.pages {
            page_number += 1;
            let started = Instant::now();
            let ctx = RenderContext::new(options, PageStamp::new(page_number, total));
            render_page(set, page, &ctx, &mut canvas)?;
            let elapsed = started.elapsed().as_secs_f64() * 1000.0;
            metrics.total_render_ms += elapsed;
            metrics.pages.push(PageMetrics {
                page_number,
                page_set: set_index,
                render_ms: elapsed,
                command_count: canvas.current_command_count(),
                placed_elements: page.placements.len(),
                used_height: page.used,
                overflowed: page.overflowed,
            });
            let next = sizes.get(page_number).copied().unwrap_or(set.page_size);
            canvas.show_page_with_size(next);
        }
    }
    Ok((canvas.finish_without_show(), metrics))
}

fn render_page(
    set: &PaginatedSet,
    page: &PageContent,
    ctx: &RenderContext<'_>,
    canvas: &mut Canvas,
) -> Result<()> {
    let page_rect = Rect::new(Pt::ZERO, Pt::ZERO, set.page_size);
    if set.fill.is_some() || ctx.options.debug_outlines {
        outline::paint(canvas, ctx.options, page_rect, set.margin, &Border::none(), set.fill);
    }
    let width = set.content.width;
    if let Some(header) = &set.header {
        let size = header.stretched(Size::new(width, Pt::ZERO))?;
        header.render_sized(ctx, canvas, set.content.x, set.content.y, size)?;
    }
    for placement in &page.placements {
        let height = placement.element.prepared_size()?.height;
        let size = placement.element.stretched(Size::new(width, height))?;
        placement
            .element
            .render_sized(ctx, canvas, set.body.x, set.body.y + placement.y, size)?;
    }
    if let Some(footer) = &set.footer {
        let size = footer.stretched(Size::new(width, Pt::ZERO))?;
        footer.render_sized(ctx, canvas, set.content.x, set.content.bottom() - size.height, size)?;
    }
    Ok(())
}
