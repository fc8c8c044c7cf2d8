use crate::font::FontId;
use crate::image::ImageResource;
use crate::types::{Color, Pt, Size};
use std::sync::Arc;

/// Drawing operations recorded during render. Coordinates are top-left
/// based, y growing downwards; the PDF writer flips them.
#[derive(Debug, Clone)]
pub enum Command {
    SetFont {
        font: FontId,
        size: Pt,
    },
    SetFillColor(Color),
    SetStrokeColor(Color),
    SetLineWidth(Pt),
    SetDash {
        phase: Pt,
        segments: Vec<Pt>,
    },
    DrawLine {
        x1: Pt,
        y1: Pt,
        x2: Pt,
        y2: Pt,
    },
    FillRect {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
    },
    StrokeRect {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
    },
    BeginText,
    // First move after BeginText is absolute, later ones relative to the
    // start of the previous line.
    MoveText {
        dx: Pt,
        dy: Pt,
    },
    ShowText(String),
    EndText,
    DrawImage {
        image: Arc<ImageResource>,
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
    },
}

#[derive(Debug, Clone)]
pub struct Page {
    pub size: Size,
    pub commands: Vec<Command>,
}

impl Page {
    fn new(size: Size) -> Self {
        Self {
            size,
            commands: Vec::new(),
        }
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|cmd| match cmd {
            Command::ShowText(text) => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn contains_text(&self, needle: &str) -> bool {
        self.texts().any(|text| text.contains(needle))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Document {
    pub pages: Vec<Page>,
}

impl Document {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub(crate) fn append(&mut self, other: Document) {
        self.pages.extend(other.pages);
    }
}

#[derive(Debug, Clone, PartialEq)]
struct GraphicsState {
    font: Option<(FontId, Pt)>,
    fill_color: Color,
    stroke_color: Color,
    line_width: Pt,
    dash: (Pt, Vec<Pt>),
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            font: None,
            fill_color: Color::BLACK,
            stroke_color: Color::BLACK,
            line_width: Pt::from_f32(1.0),
            dash: (Pt::ZERO, Vec::new()),
        }
    }
}

pub struct Canvas {
    pages: Vec<Page>,
    current: Page,
    state: GraphicsState,
    in_text: bool,
}

impl Canvas {
    pub fn new(page_size: Size) -> Self {
        Self {
            pages: Vec::new(),
            current: Page::new(page_size),
            state: GraphicsState::default(),
            in_text: false,
        }
    }

    pub fn page_size(&self) -> Size {
        self.current.size
    }

    pub fn set_font(&mut self, font: FontId, size: Pt) {
        if self.state.font == Some((font, size)) {
            return;
        }
        self.state.font = Some((font, size));
        self.current.commands.push(Command::SetFont { font, size });
    }

    pub fn set_fill_color(&mut self, color: Color) {
        if self.state.fill_color == color {
            return;
        }
        self.state.fill_color = color;
        self.current.commands.push(Command::SetFillColor(color));
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        if self.state.stroke_color == color {
            return;
        }
        self.state.stroke_color = color;
        self.current.commands.push(Command::SetStrokeColor(color));
    }

    pub fn set_line_width(&mut self, width: Pt) {
        let width = width.max(Pt::ZERO);
        if self.state.line_width == width {
            return;
        }
        self.state.line_width = width;
        self.current.commands.push(Command::SetLineWidth(width));
    }

    pub fn set_dash_pattern(&mut self, phase: Pt, segments: &[Pt]) {
        if self.state.dash.0 == phase && self.state.dash.1 == segments {
            return;
        }
        self.state.dash = (phase, segments.to_vec());
        self.current.commands.push(Command::SetDash {
            phase,
            segments: segments.to_vec(),
        });
    }

    pub fn draw_line(&mut self, x1: Pt, y1: Pt, x2: Pt, y2: Pt) {
        self.current
            .commands
            .push(Command::DrawLine { x1, y1, x2, y2 });
    }

    pub fn fill_rect(&mut self, x: Pt, y: Pt, width: Pt, height: Pt) {
        self.current.commands.push(Command::FillRect {
            x,
            y,
            width,
            height,
        });
    }

    pub fn stroke_rect(&mut self, x: Pt, y: Pt, width: Pt, height: Pt) {
        self.current.commands.push(Command::StrokeRect {
            x,
            y,
            width,
            height,
        });
    }

    pub fn begin_text(&mut self) {
        if self.in_text {
            return;
        }
        self.in_text = true;
        self.current.commands.push(Command::BeginText);
    }

    pub fn move_text(&mut self, dx: Pt, dy: Pt) {
        self.current.commands.push(Command::MoveText { dx, dy });
    }

    pub fn draw_string(&mut self, text: impl Into<String>) {
        self.current.commands.push(Command::ShowText(text.into()));
    }

    pub fn end_text(&mut self) {
        if !self.in_text {
            return;
        }
        self.in_text = false;
        self.current.commands.push(Command::EndText);
    }

    pub fn draw_image(&mut self, image: Arc<ImageResource>, x: Pt, y: Pt, width: Pt, height: Pt) {
        self.current.commands.push(Command::DrawImage {
            image,
            x,
            y,
            width,
            height,
        });
    }

    pub fn current_command_count(&self) -> usize {
        self.current.commands.len()
    }

    pub fn show_page_with_size(&mut self, next_size: Size) {
        self.end_text();
        let current = std::mem::replace(&mut self.current, Page::new(next_size));
        self.pages.push(current);
        self.state = GraphicsState::default();
    }

    pub fn show_page(&mut self) {
        let size = self.current.size;
        self.show_page_with_size(size);
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn finish(mut self) -> Document {
        if !self.current.commands.is_empty() || self.pages.is_empty() {
            self.show_page();
        }
        Document { pages: self.pages }
    }

    pub fn finish_without_show(self) -> Document {
        Document { pages: self.pages }
    }
}
