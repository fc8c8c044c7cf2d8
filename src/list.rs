use crate::canvas::Canvas;
use crate::element::{Element, ElementKind, LayoutContext, RenderContext, Shell};
use crate::error::Result;
use crate::spec::FontSpec;
use crate::split::SplitOutcome;
use crate::text::line_height;
use crate::types::{Pt, Rect, Size};

const DEFAULT_GAP: f32 = 6.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Marker {
    Bullet(String),
    Numbered { start: usize },
}

impl Marker {
    fn label(&self, index: usize) -> String {
        match self {
            Marker::Bullet(glyph) => glyph.clone(),
            Marker::Numbered { start } => format!("{}.", start + index),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BulletList {
    pub items: Vec<Element>,
    marker: Marker,
    font: FontSpec,
    gap: Pt,
    // First item continues an item split off the previous page: no marker.
    continued: bool,
    indent: Pt,
    marker_height: Pt,
}

impl BulletList {
    pub fn bullets(items: Vec<Element>, font: FontSpec) -> Self {
        Self::new(items, Marker::Bullet("\u{2022}".to_string()), font)
    }

    pub fn numbered(items: Vec<Element>, font: FontSpec, start: usize) -> Self {
        Self::new(items, Marker::Numbered { start }, font)
    }

    pub fn new(items: Vec<Element>, marker: Marker, font: FontSpec) -> Self {
        Self {
            items,
            marker,
            font,
            gap: Pt::from_f32(DEFAULT_GAP),
            continued: false,
            indent: Pt::ZERO,
            marker_height: Pt::ZERO,
        }
    }

    pub fn with_gap(mut self, gap: f32) -> Self {
        self.gap = Pt::from_f32(gap).max(Pt::ZERO);
        self
    }

    pub fn font(&self) -> FontSpec {
        self.font
    }

    pub fn marker(&self) -> &Marker {
        &self.marker
    }

    pub fn is_continued(&self) -> bool {
        self.continued
    }

    fn shows_marker(&self, index: usize) -> bool {
        !(index == 0 && self.continued)
    }

    fn slot_height(&self, index: usize, item: &Element) -> Result<Pt> {
        let height = item.prepared_size()?.height;
        Ok(if self.shows_marker(index) {
            height.max(self.marker_height)
        } else {
            height
        })
    }

    pub(crate) fn reset(&mut self) {
        self.indent = Pt::ZERO;
        self.marker_height = Pt::ZERO;
    }

    pub(crate) fn layout(&mut self, ctx: &LayoutContext<'_>, content: Size) -> Result<()> {
        let font = self.font;
        let mut widest = Pt::ZERO;
        // The marker column fits the widest label, including later numbers.
        for index in 0..self.items.len() {
            let label = self.marker.label(index);
            widest = widest.max(ctx.metrics.text_width(font.font, &label, font.size));
        }
        self.indent = widest + self.gap;
        self.marker_height = line_height(ctx.metrics, font, 1.0);
        let body = Size::new((content.width - self.indent).max(Pt::ZERO), content.height);
        for item in &mut self.items {
            item.prepare(ctx, body)?;
        }
        Ok(())
    }

    pub(crate) fn content_size(&self) -> Result<Size> {
        let mut size = Size::ZERO;
        for (index, item) in self.items.iter().enumerate() {
            size.width = size.width.max(item.prepared_size()?.width);
            size.height += self.slot_height(index, item)?;
        }
        if !self.items.is_empty() {
            size.width += self.indent;
        }
        Ok(size)
    }

    pub(crate) fn render(
        &self,
        ctx: &RenderContext<'_>,
        canvas: &mut Canvas,
        content: Rect,
    ) -> Result<()> {
        let body_width = (content.width - self.indent).max(Pt::ZERO);
        let mut y = content.y;
        for (index, item) in self.items.iter().enumerate() {
            if self.shows_marker(index) {
                canvas.set_fill_color(self.font.color);
                canvas.set_font(self.font.font, self.font.size);
                canvas.begin_text();
                canvas.move_text(content.x, y + self.marker_height.mul_ratio(3, 4));
                canvas.draw_string(self.marker.label(index));
                canvas.end_text();
            }
            let size = item.prepared_size()?;
            let outer = item.stretched(Size::new(body_width, size.height))?;
            item.render_sized(ctx, canvas, content.x + self.indent, y, outer)?;
            y += self.slot_height(index, item)?;
        }
        Ok(())
    }

    fn part(&self, items: Vec<Element>, offset: usize, continued: bool) -> Self {
        let marker = match &self.marker {
            Marker::Numbered { start } => Marker::Numbered {
                start: start + offset,
            },
            bullet => bullet.clone(),
        };
        Self {
            items,
            marker,
            font: self.font,
            gap: self.gap,
            continued,
            indent: self.indent,
            marker_height: self.marker_height,
        }
    }
}

pub(crate) fn split_list(
    shell: Shell,
    mut list: BulletList,
    ctx: &LayoutContext<'_>,
    height: Pt,
) -> Result<SplitOutcome> {
    let mut used = Pt::ZERO;
    let mut overflow_at = None;
    for (index, item) in list.items.iter().enumerate() {
        let slot = list.slot_height(index, item)?;
        if used + slot > height {
            overflow_at = Some(index);
            break;
        }
        used += slot;
    }
    let Some(index) = overflow_at else {
        return Ok(SplitOutcome::Refused(shell.restore(ElementKind::BulletList(list))));
    };

    let body_width = (shell.layout_width() - list.indent).max(Pt::ZERO);
    let mut head = std::mem::take(&mut list.items);
    let mut tail = head.split_off(index).into_iter();
    let mut rest = Vec::new();
    let mut continued = false;
    if let Some(straddling) = tail.next() {
        match straddling.split(ctx, Size::new(body_width, height - used))? {
            SplitOutcome::Split { first, second } if first.has_content() => {
                head.push(first);
                rest.push(second);
                continued = true;
            }
            SplitOutcome::Split { second, .. } => rest.push(second),
            SplitOutcome::Refused(item) => rest.push(item),
        }
    }
    rest.extend(tail);

    if head.is_empty() {
        list.items = rest;
        return Ok(SplitOutcome::Refused(shell.restore(ElementKind::BulletList(list))));
    }
    let first = list.part(head, 0, list.continued);
    let second = list.part(rest, index, continued);
    Ok(SplitOutcome::Split {
        first: shell.part(ElementKind::BulletList(first))?,
        second: shell.part(ElementKind::BulletList(second))?,
    })
}
