use crate::canvas::Canvas;
use crate::element::{Element, ElementKind, HAlign, LayoutContext, RenderContext, Shell};
use crate::error::Result;
use crate::font::FontMetrics;
use crate::placeholder;
use crate::spec::FontSpec;
use crate::split::SplitOutcome;
use crate::types::{Pt, Rect, Size};

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub start: usize,
    pub end: usize,
    pub width: Pt,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineFit {
    pub lines: Vec<Line>,
    pub overflowing: usize,
}

pub fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Greedy line fitting over `text`, which must already be normalised.
///
/// Lines break at the last whitespace before the overflow point, the
/// whitespace itself is dropped. A run with no whitespace is kept whole on an
/// overflowing line until the next whitespace. The final segment of every
/// explicit line is emitted even when empty.
pub fn fit_lines(text: &str, max_width: Pt, mut width_of: impl FnMut(char) -> Pt) -> LineFit {
    let mut fit = LineFit::default();
    let mut seg_start = 0;
    for segment in text.split('\n') {
        fit_segment(segment, seg_start, max_width, &mut width_of, &mut fit);
        seg_start += segment.len() + 1;
    }
    fit
}

fn fit_segment(
    segment: &str,
    base: usize,
    max_width: Pt,
    width_of: &mut impl FnMut(char) -> Pt,
    fit: &mut LineFit,
) {
    let mut start = base;
    let mut width = Pt::ZERO;
    // (whitespace offset, offset after it, width before it, width through it)
    let mut brk: Option<(usize, usize, Pt, Pt)> = None;
    let mut overflowing = false;
    // Set by a wrap at whitespace until the next visible character.
    let mut wrapped = false;
    for (offset, ch) in segment.char_indices() {
        let at = base + offset;
        let after = at + ch.len_utf8();
        let advance = width_of(ch);
        if ch.is_whitespace() {
            if wrapped && at == start {
                start = after;
                continue;
            }
            if overflowing || width + advance > max_width {
                fit.lines.push(Line {
                    start,
                    end: at,
                    width,
                });
                start = after;
                width = Pt::ZERO;
                brk = None;
                overflowing = false;
                wrapped = true;
                continue;
            }
            brk = Some((at, after, width, width + advance));
            width += advance;
            continue;
        }
        if !overflowing && width + advance > max_width {
            if let Some((ws, resume, before, through)) = brk.take() {
                fit.lines.push(Line {
                    start,
                    end: ws,
                    width: before,
                });
                start = resume;
                width -= through;
            }
            if width + advance > max_width && (at > start || advance > max_width) {
                overflowing = true;
                fit.overflowing += 1;
            }
        }
        wrapped = false;
        width += advance;
    }
    let end = base + segment.len();
    if wrapped && start == end {
        return;
    }
    fit.lines.push(Line { start, end, width });
}

#[derive(Debug, Clone)]
pub struct TextBlock {
    // Normalised, with placeholders folded into marker characters.
    text: String,
    pub(crate) font: FontSpec,
    pub(crate) align: HAlign,
    pub(crate) line_spacing: f32,
    // Separator consumed by a split: part of the content, never laid out.
    break_suffix: String,
    lines: Vec<Line>,
    line_height: Pt,
    warned: bool,
}

impl TextBlock {
    pub fn new(text: &str, font: FontSpec) -> Self {
        Self {
            text: placeholder::encode(&normalize_newlines(text)),
            font,
            align: HAlign::Left,
            line_spacing: 1.0,
            break_suffix: String::new(),
            lines: Vec::new(),
            line_height: Pt::ZERO,
            warned: false,
        }
    }

    pub fn font(&self) -> FontSpec {
        self.font
    }

    pub fn lines(&self) -> impl Iterator<Item = (&str, Pt)> {
        self.lines
            .iter()
            .map(|line| (&self.text[line.start..line.end], line.width))
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line_height(&self) -> Pt {
        self.line_height
    }

    pub fn content(&self) -> String {
        placeholder::decode(&format!("{}{}", self.text, self.break_suffix))
    }

    pub(crate) fn reset(&mut self) {
        self.lines.clear();
        self.line_height = Pt::ZERO;
    }

    pub(crate) fn layout(&mut self, ctx: &LayoutContext<'_>, max_width: Pt) -> Result<()> {
        let metrics = ctx.metrics;
        let font = self.font.font;
        let size = self.font.size;
        let reserved = placeholder::reserved_width(metrics, font, size, ctx.options.placeholder_digits);
        let fit = fit_lines(&self.text, max_width, |ch| {
            if placeholder::is_mark(ch) {
                reserved
            } else {
                metrics.width_of(font, ch, size)
            }
        });
        if fit.overflowing > 0 && !self.warned {
            self.warned = true;
            ctx.diagnostics.warn(format!(
                "line too narrow to fit a single token: {:?} in {}",
                preview(&self.text),
                max_width
            ));
        }
        ctx.diagnostics.increment("text.lines", fit.lines.len() as u64);
        self.lines = fit.lines;
        self.line_height = line_height(metrics, self.font, self.line_spacing);
        Ok(())
    }

    pub(crate) fn content_size(&self, layout_width: Pt) -> Size {
        let widest = self
            .lines
            .iter()
            .fold(Pt::ZERO, |acc, line| acc.max(line.width));
        let width = if self.align == HAlign::Left || layout_width.is_unbounded() {
            widest
        } else {
            widest.max(layout_width)
        };
        Size::new(width, self.line_height * (self.lines.len() as i32))
    }

    pub(crate) fn render(&self, ctx: &RenderContext<'_>, canvas: &mut Canvas, content: Rect) {
        if self.lines.is_empty() {
            return;
        }
        canvas.set_fill_color(self.font.color);
        canvas.set_font(self.font.font, self.font.size);
        canvas.begin_text();
        let ascent = self.line_height.mul_ratio(3, 4);
        let mut previous: Option<(Pt, Pt)> = None;
        for (index, line) in self.lines.iter().enumerate() {
            let x = content.x + self.align.offset(content.width, line.width);
            let y = content.y + ascent + self.line_height * (index as i32);
            match previous {
                None => canvas.move_text(x, y),
                Some((px, py)) => canvas.move_text(x - px, y - py),
            }
            previous = Some((x, y));
            let raw = &self.text[line.start..line.end];
            if !raw.is_empty() {
                canvas.draw_string(placeholder::resolve(raw, ctx.stamp));
            }
        }
        canvas.end_text();
    }

    fn slice(&self, lines: &[Line], end: usize, break_suffix: String) -> Self {
        let start = lines.first().map(|line| line.start).unwrap_or(0);
        Self {
            text: self.text[start..end].to_string(),
            font: self.font,
            align: self.align,
            line_spacing: self.line_spacing,
            break_suffix,
            lines: lines
                .iter()
                .map(|line| Line {
                    start: line.start - start,
                    end: line.end - start,
                    width: line.width,
                })
                .collect(),
            line_height: self.line_height,
            warned: self.warned,
        }
    }
}

pub(crate) fn line_height(metrics: &dyn FontMetrics, font: FontSpec, spacing: f32) -> Pt {
    let base = metrics.line_height(font.font, font.size);
    if (spacing - 1.0).abs() < f32::EPSILON {
        base
    } else {
        base * spacing
    }
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(24).collect();
    if text.chars().count() > 24 {
        out.push_str("...");
    }
    placeholder::decode(&out)
}

pub(crate) fn split_text(shell: Shell, block: TextBlock, height: Pt) -> Result<SplitOutcome> {
    let total = block.lines.len();
    let line_height = block.line_height;
    let mut count = height.fits(line_height);
    if count == 0 || count >= total {
        return Ok(SplitOutcome::Refused(shell.restore(ElementKind::Text(block))));
    }
    if line_height.mul_ratio(4 * count as i64 + 1, 4) > height {
        count -= 1;
        if count == 0 {
            return Ok(SplitOutcome::Refused(shell.restore(ElementKind::Text(block))));
        }
    }
    let cut = block.lines[count - 1].end;
    let resume = block.lines[count].start;
    let first = block.slice(
        &block.lines[..count],
        cut,
        block.text[cut..resume].to_string(),
    );
    let second = block.slice(
        &block.lines[count..],
        block.text.len(),
        block.break_suffix.clone(),
    );
    log::debug!("text split after {count} of {total} lines");
    Ok(SplitOutcome::Split {
        first: shell.part(ElementKind::Text(first))?,
        second: shell.part(ElementKind::Text(second))?,
    })
}

impl Element {
    pub fn text_lines(&self) -> Option<Vec<(String, Pt)>> {
        match &self.kind {
            ElementKind::Text(block) if self.is_prepared() => Some(
                block
                    .lines()
                    .map(|(text, width)| (placeholder::decode(text), width))
                    .collect(),
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;
    use crate::element::testing::*;
    use crate::font::{FontId, FontRegistry};
    use crate::diagnostics::{Diagnostics, LayoutOptions};
    use crate::placeholder::PageStamp;
    use crate::types::Color;

    fn fixed(_: char) -> Pt {
        pt(5.0)
    }

    fn texts(text: &str, fit: &LineFit) -> Vec<String> {
        fit.lines
            .iter()
            .map(|line| text[line.start..line.end].to_string())
            .collect()
    }

    #[test]
    fn hello_world_fits_on_one_line() {
        let registry = FontRegistry::new();
        let options = LayoutOptions::default();
        let diagnostics = Diagnostics::new();
        let ctx = LayoutContext::new(&registry, &options, &diagnostics);
        let mut element = Element::text(
            "Hello World",
            FontSpec::new(FontId::HELVETICA, 10.0, Color::BLACK).unwrap(),
        );
        element.prepare(&ctx, size(500.0, 500.0)).unwrap();
        let lines = element.text_lines().unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].0, "Hello World");
        assert_eq!(diagnostics.warning_count(), 0);
    }

    #[test]
    fn unbreakable_token_overflows_with_one_warning() {
        let harness = Harness::new();
        let mut element = text("AAAAAAAAAA");
        element.prepare(&harness.ctx(), size(20.0, 500.0)).unwrap();
        let lines = element.text_lines().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].1 > pt(20.0));
        assert_eq!(lines[0].0, "AAAAAAAAAA");
        assert_eq!(harness.diagnostics.warning_count(), 1);
    }

    #[test]
    fn repeated_prepare_warns_once() {
        let harness = Harness::new();
        let mut element = text("AAAAAAAAAA BBBBBBBBBB");
        element.prepare(&harness.ctx(), size(20.0, 500.0)).unwrap();
        element.mark_not_prepared();
        element.prepare(&harness.ctx(), size(20.0, 500.0)).unwrap();
        assert_eq!(element.text_lines().unwrap().len(), 2);
        assert_eq!(harness.diagnostics.warning_count(), 1);
    }

    #[test]
    fn breaks_at_last_whitespace_and_drops_it() {
        let text = "aaa bbb ccc";
        let fit = fit_lines(text, pt(35.0), fixed);
        assert_eq!(texts(text, &fit), vec!["aaa bbb", "ccc"]);
        assert_eq!(fit.lines[0].width, pt(35.0));
        assert_eq!(fit.overflowing, 0);
    }

    #[test]
    fn whitespace_at_overflow_point_breaks_cleanly() {
        let text = "abcd efgh";
        let fit = fit_lines(text, pt(20.0), fixed);
        assert_eq!(texts(text, &fit), vec!["abcd", "efgh"]);
        assert_eq!(fit.overflowing, 0);
    }

    #[test]
    fn whitespace_runs_at_a_wrap_are_dropped() {
        let text = "abcd  efgh";
        let fit = fit_lines(text, pt(20.0), fixed);
        assert_eq!(texts(text, &fit), vec!["abcd", "efgh"]);
        assert_eq!(fit.lines[1].width, pt(20.0));

        let text = "ab cdefghij   kl";
        let fit = fit_lines(text, pt(20.0), fixed);
        assert_eq!(texts(text, &fit), vec!["ab", "cdefghij", "kl"]);

        let text = "abcd   ";
        let fit = fit_lines(text, pt(20.0), fixed);
        assert_eq!(texts(text, &fit), vec!["abcd"]);
    }

    #[test]
    fn leading_indent_is_kept() {
        let text = "  ab";
        let fit = fit_lines(text, pt(100.0), fixed);
        assert_eq!(texts(text, &fit), vec!["  ab"]);
    }

    #[test]
    fn explicit_newlines_and_blank_lines_survive() {
        let text = normalize_newlines("one\r\n\rtwo\n");
        assert_eq!(text, "one\n\ntwo\n");
        let fit = fit_lines(&text, pt(100.0), fixed);
        assert_eq!(texts(&text, &fit), vec!["one", "", "two", ""]);
    }

    #[test]
    fn overflowing_token_ends_at_next_whitespace() {
        let text = "ab cdefghij kl";
        let fit = fit_lines(text, pt(20.0), fixed);
        assert_eq!(texts(text, &fit), vec!["ab", "cdefghij", "kl"]);
        assert_eq!(fit.overflowing, 1);
        assert!(fit.lines[1].width > pt(20.0));
    }

    #[test]
    fn lines_stay_within_width_unless_single_token() {
        let text = "the quick brown fox jumps over the lazy dog and keeps running far away";
        for width in [10.0, 23.0, 40.0, 61.5, 100.0, 1000.0] {
            let fit = fit_lines(text, pt(width), fixed);
            for line in &fit.lines {
                let content = &text[line.start..line.end];
                assert_eq!(line.width, pt(5.0) * content.chars().count() as i32);
                if line.width > pt(width) {
                    assert!(!content.contains(' '), "{content:?} at {width}");
                }
            }
            let rebuilt: Vec<&str> = fit
                .lines
                .iter()
                .map(|line| &text[line.start..line.end])
                .collect();
            assert_eq!(rebuilt.join(" "), text);
        }
    }

    #[test]
    fn block_height_is_line_count_times_line_height() {
        let harness = Harness::new();
        let mut element = text("one\ntwo\nthree");
        let prepared = element.prepare(&harness.ctx(), size(100.0, 100.0)).unwrap();
        assert_eq!(prepared.height, pt(36.0));
    }

    #[test]
    fn first_baseline_sits_three_quarters_down() {
        let harness = Harness::new();
        let mut element = text("a\nb");
        element.prepare(&harness.ctx(), size(100.0, 100.0)).unwrap();
        let mut canvas = Canvas::new(Size::a4());
        element
            .render(&harness.render_ctx(), &mut canvas, pt(10.0), pt(20.0))
            .unwrap();
        let doc = canvas.finish();
        let moves: Vec<(Pt, Pt)> = doc.pages[0]
            .commands
            .iter()
            .filter_map(|cmd| match cmd {
                Command::MoveText { dx, dy } => Some((*dx, *dy)),
                _ => None,
            })
            .collect();
        assert_eq!(moves, vec![(pt(10.0), pt(29.0)), (Pt::ZERO, pt(12.0))]);
    }

    #[test]
    fn placeholders_are_measured_with_fixed_digits_and_resolved_at_render() {
        let harness = Harness::new();
        let mut element = text("{page}/{pages}");
        let prepared = element.prepare(&harness.ctx(), size(200.0, 100.0)).unwrap();
        // two markers of three digits plus the slash
        assert_eq!(prepared.width, pt(35.0));
        let options = LayoutOptions::default();
        let ctx = RenderContext::new(&options, PageStamp::new(4, 12));
        let mut canvas = Canvas::new(Size::a4());
        element.render(&ctx, &mut canvas, Pt::ZERO, Pt::ZERO).unwrap();
        let doc = canvas.finish();
        assert!(doc.pages[0].contains_text("4/12"));
        assert_eq!(element.text_content(), "{page}/{pages}");
    }

    #[test]
    fn split_keeps_whole_lines_and_reconstructs_content() {
        let harness = Harness::new();
        let original = "alpha beta gamma delta epsilon zeta eta theta";
        let mut element = text(original);
        element.prepare(&harness.ctx(), size(60.0, 500.0)).unwrap();
        let total = element.text_lines().unwrap().len();
        assert!(total > 3);
        match element.split(&harness.ctx(), size(60.0, 30.0)).unwrap() {
            SplitOutcome::Split { first, second } => {
                assert!(first.prepared_size().unwrap().height <= pt(30.0));
                assert_eq!(first.text_lines().unwrap().len(), 2);
                assert_eq!(second.text_lines().unwrap().len(), total - 2);
                assert_eq!(
                    format!("{}{}", first.text_content(), second.text_content()),
                    original
                );
            }
            SplitOutcome::Refused(_) => panic!("expected split"),
        }
    }

    #[test]
    fn quarter_line_rule_drops_a_line() {
        let harness = Harness::new();
        let mut element = text("a\nb\nc\nd");
        element.prepare(&harness.ctx(), size(60.0, 500.0)).unwrap();
        // 26pt holds two 12pt lines but leaves only 2pt, under a quarter line.
        match element.split(&harness.ctx(), size(60.0, 26.0)).unwrap() {
            SplitOutcome::Split { first, second } => {
                assert_eq!(first.text_lines().unwrap().len(), 1);
                assert_eq!(second.text_lines().unwrap().len(), 3);
                assert_eq!(
                    format!("{}{}", first.text_content(), second.text_content()),
                    "a\nb\nc\nd"
                );
            }
            SplitOutcome::Refused(_) => panic!("expected split"),
        }
    }

    #[test]
    fn split_refuses_without_gain() {
        let harness = Harness::new();
        let mut element = text("a\nb");
        element.prepare(&harness.ctx(), size(60.0, 500.0)).unwrap();
        let element = match element.split(&harness.ctx(), size(60.0, 10.0)).unwrap() {
            SplitOutcome::Refused(element) => element,
            SplitOutcome::Split { .. } => panic!("less than a line must refuse"),
        };
        assert!(element.is_prepared());
        assert!(matches!(
            element.split(&harness.ctx(), size(60.0, 100.0)).unwrap(),
            SplitOutcome::Refused(_)
        ));
    }

    #[test]
    fn centered_lines_use_render_width() {
        let harness = Harness::new();
        let mut element = text("ab").with_align(HAlign::Center);
        let prepared = element.prepare(&harness.ctx(), size(100.0, 100.0)).unwrap();
        assert_eq!(prepared.width, pt(100.0));
        let mut canvas = Canvas::new(Size::a4());
        element
            .render(&harness.render_ctx(), &mut canvas, Pt::ZERO, Pt::ZERO)
            .unwrap();
        let doc = canvas.finish();
        assert!(doc.pages[0].commands.iter().any(
            |cmd| matches!(cmd, Command::MoveText { dx, .. } if *dx == pt(45.0))
        ));
    }
}
