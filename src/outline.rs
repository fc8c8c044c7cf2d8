use crate::canvas::Canvas;
use crate::diagnostics::LayoutOptions;
use crate::spec::{Border, BorderStyle, Side};
use crate::types::{Color, Edges, Pt, Rect};

const DEBUG_STROKE: f32 = 0.5;

fn debug_style() -> BorderStyle {
    BorderStyle {
        color: Color::rgb(0.85, 0.1, 0.55),
        width: Pt::from_f32(DEBUG_STROKE),
        dash: Default::default(),
    }
}

pub(crate) fn paint(
    canvas: &mut Canvas,
    options: &LayoutOptions,
    margin_box: Rect,
    margin: Edges,
    border: &Border,
    fill: Option<Color>,
) {
    let border_box = margin_box.inset(margin);
    if let Some(color) = fill {
        if border_box.width > Pt::ZERO && border_box.height > Pt::ZERO {
            canvas.set_fill_color(color);
            canvas.fill_rect(border_box.x, border_box.y, border_box.width, border_box.height);
        }
    }

    if border.is_empty() {
        if options.debug_outlines {
            // Drawn on the edge; measured size stays untouched.
            let style = debug_style();
            apply_style(canvas, &style);
            canvas.stroke_rect(border_box.x, border_box.y, border_box.width, border_box.height);
        }
        return;
    }

    if border.is_uniform() {
        if let Some(style) = border.top.as_ref().filter(|style| style.width > Pt::ZERO) {
            let half = style.width / 2;
            apply_style(canvas, style);
            canvas.stroke_rect(
                border_box.x + half,
                border_box.y + half,
                (border_box.width - style.width).max(Pt::ZERO),
                (border_box.height - style.width).max(Pt::ZERO),
            );
        }
        return;
    }

    let mut groups: Vec<(&BorderStyle, Vec<Side>)> = Vec::new();
    for (side, style) in border.sides() {
        let Some(style) = style.filter(|style| style.width > Pt::ZERO) else {
            continue;
        };
        match groups.iter_mut().find(|(existing, _)| *existing == style) {
            Some((_, sides)) => sides.push(side),
            None => groups.push((style, vec![side])),
        }
    }
    for (style, sides) in groups {
        apply_style(canvas, style);
        for side in sides {
            stroke_side(canvas, border_box, side, style.width);
        }
    }
}

fn apply_style(canvas: &mut Canvas, style: &BorderStyle) {
    canvas.set_stroke_color(style.color);
    canvas.set_line_width(style.width);
    canvas.set_dash_pattern(style.dash.phase, &style.dash.segments);
}

// Line centred on the side's band.
fn stroke_side(canvas: &mut Canvas, rect: Rect, side: Side, width: Pt) {
    let half = width / 2;
    let (left, top, right, bottom) = (rect.x, rect.y, rect.right(), rect.bottom());
    match side {
        Side::Top => canvas.draw_line(left, top + half, right, top + half),
        Side::Bottom => canvas.draw_line(left, bottom - half, right, bottom - half),
        Side::Left => canvas.draw_line(left + half, top, left + half, bottom),
        Side::Right => canvas.draw_line(right - half, top, right - half, bottom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;
    use crate::spec::DashPattern;
    use crate::types::Size;

    fn rect() -> Rect {
        Rect::new(Pt::ZERO, Pt::ZERO, Size::from_f32(100.0, 50.0))
    }

    fn painted(options: &LayoutOptions, border: &Border, fill: Option<Color>) -> Vec<Command> {
        let mut canvas = Canvas::new(Size::a4());
        paint(&mut canvas, options, rect(), Edges::all(5.0), border, fill);
        canvas.finish().pages.remove(0).commands
    }

    fn strokes(commands: &[Command]) -> usize {
        commands
            .iter()
            .filter(|cmd| matches!(cmd, Command::DrawLine { .. } | Command::StrokeRect { .. }))
            .count()
    }

    #[test]
    fn fill_comes_before_border_and_skips_margin() {
        let border = Border::uniform(BorderStyle::solid(2.0).unwrap());
        let commands = painted(&LayoutOptions::default(), &border, Some(Color::WHITE));
        let fill = commands
            .iter()
            .position(|cmd| matches!(cmd, Command::FillRect { .. }))
            .unwrap();
        let stroke = commands
            .iter()
            .position(|cmd| matches!(cmd, Command::StrokeRect { .. }))
            .unwrap();
        assert!(fill < stroke);
        assert!(matches!(
            commands[fill],
            Command::FillRect { x, width, .. } if x == Pt::from_f32(5.0) && width == Pt::from_f32(90.0)
        ));
        assert!(matches!(
            commands[stroke],
            Command::StrokeRect { x, width, .. } if x == Pt::from_f32(6.0) && width == Pt::from_f32(88.0)
        ));
    }

    #[test]
    fn uniform_border_is_one_rectangle() {
        let border = Border::uniform(BorderStyle::solid(1.0).unwrap());
        assert_eq!(strokes(&painted(&LayoutOptions::default(), &border, None)), 1);
    }

    #[test]
    fn mixed_sides_stroke_per_style() {
        let thin = BorderStyle::solid(1.0).unwrap();
        let dashed = BorderStyle::solid(1.0)
            .unwrap()
            .with_dash(DashPattern::new(0.0, &[3.0, 2.0]).unwrap());
        let border = Border {
            top: Some(thin.clone()),
            right: Some(dashed.clone()),
            bottom: Some(thin),
            left: None,
        };
        let commands = painted(&LayoutOptions::default(), &border, None);
        assert_eq!(strokes(&commands), 3);
        let dash_changes = commands
            .iter()
            .filter(|cmd| matches!(cmd, Command::SetDash { .. }))
            .count();
        // the solid group leaves the default dash alone
        assert_eq!(dash_changes, 1);
    }

    #[test]
    fn debug_border_only_when_enabled_and_unset() {
        let none = Border::none();
        assert_eq!(strokes(&painted(&LayoutOptions::default(), &none, None)), 0);
        let debug = LayoutOptions::default().with_debug_outlines(true);
        assert_eq!(strokes(&painted(&debug, &none, None)), 1);
        assert_eq!(Border::none().widths(), Edges::ZERO);
    }
}
