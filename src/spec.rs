use crate::error::{FolioError, Result};
use crate::font::FontId;
use crate::types::{Color, Edges, Pt};

/// How much room a column, cell, or row asks for. Resolved against the
/// available space at layout time, never stored as a resolved length.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Extent {
    #[default]
    Auto,
    Star,
    Percentage(f32),
    Absolute(Pt),
}

pub type WidthSpec = Extent;
pub type HeightSpec = Extent;

impl Extent {
    pub fn percentage(value: f32) -> Result<Self> {
        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
            return Err(FolioError::config(format!(
                "percentage must be within 0..=100, got {value}"
            )));
        }
        Ok(Extent::Percentage(value))
    }

    pub fn absolute(value: f32) -> Result<Self> {
        if !value.is_finite() || value < 0.0 {
            return Err(FolioError::config(format!(
                "absolute extent must be non-negative, got {value}"
            )));
        }
        Ok(Extent::Absolute(Pt::from_f32(value)))
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, Extent::Absolute(_) | Extent::Percentage(_))
    }

    pub fn is_flexible(&self) -> bool {
        matches!(self, Extent::Auto | Extent::Star)
    }

    pub fn fixed_length(&self, available: Pt) -> Option<Pt> {
        match self {
            Extent::Absolute(value) => Some(value.max(Pt::ZERO)),
            Extent::Percentage(pct) => {
                let basis = (pct.clamp(0.0, 100.0) * 1000.0).round() as i64;
                Some(available.max(Pt::ZERO).mul_ratio(basis, 100_000))
            }
            Extent::Auto | Extent::Star => None,
        }
    }

    pub(crate) fn unit_name(&self) -> &'static str {
        match self {
            Extent::Auto => "auto",
            Extent::Star => "star",
            Extent::Percentage(_) => "percentage",
            Extent::Absolute(_) => "absolute",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DashPattern {
    pub phase: Pt,
    pub segments: Vec<Pt>,
}

impl DashPattern {
    pub fn new(phase: f32, segments: &[f32]) -> Result<Self> {
        if segments.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(FolioError::config("dash segments must be non-negative"));
        }
        if !segments.is_empty() && segments.iter().all(|v| *v == 0.0) {
            return Err(FolioError::config("dash pattern cannot be all zeros"));
        }
        Ok(Self {
            phase: Pt::from_f32(phase),
            segments: segments.iter().map(|v| Pt::from_f32(*v)).collect(),
        })
    }

    pub fn is_solid(&self) -> bool {
        self.segments.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BorderStyle {
    pub color: Color,
    pub width: Pt,
    pub dash: DashPattern,
}

impl BorderStyle {
    pub fn new(color: Color, width: f32) -> Result<Self> {
        if !width.is_finite() || width < 0.0 {
            return Err(FolioError::config(format!(
                "border width must be non-negative, got {width}"
            )));
        }
        Ok(Self {
            color,
            width: Pt::from_f32(width),
            dash: DashPattern::default(),
        })
    }

    pub fn solid(width: f32) -> Result<Self> {
        Self::new(Color::BLACK, width)
    }

    pub fn with_dash(mut self, dash: DashPattern) -> Self {
        self.dash = dash;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Border {
    pub top: Option<BorderStyle>,
    pub right: Option<BorderStyle>,
    pub bottom: Option<BorderStyle>,
    pub left: Option<BorderStyle>,
}

impl Border {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn uniform(style: BorderStyle) -> Self {
        Self {
            top: Some(style.clone()),
            right: Some(style.clone()),
            bottom: Some(style.clone()),
            left: Some(style),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.top.is_none() && self.right.is_none() && self.bottom.is_none() && self.left.is_none()
    }

    pub fn is_uniform(&self) -> bool {
        match &self.top {
            Some(top) => [&self.right, &self.bottom, &self.left]
                .iter()
                .all(|side| side.as_ref() == Some(top)),
            None => false,
        }
    }

    pub fn widths(&self) -> Edges {
        let w = |side: &Option<BorderStyle>| side.as_ref().map(|s| s.width).unwrap_or(Pt::ZERO);
        Edges {
            top: w(&self.top),
            right: w(&self.right),
            bottom: w(&self.bottom),
            left: w(&self.left),
        }
    }

    pub fn sides(&self) -> [(Side, Option<&BorderStyle>); 4] {
        [
            (Side::Top, self.top.as_ref()),
            (Side::Right, self.right.as_ref()),
            (Side::Bottom, self.bottom.as_ref()),
            (Side::Left, self.left.as_ref()),
        ]
    }

    pub fn side_mut(&mut self, side: Side) -> &mut Option<BorderStyle> {
        match side {
            Side::Top => &mut self.top,
            Side::Right => &mut self.right,
            Side::Bottom => &mut self.bottom,
            Side::Left => &mut self.left,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Top,
    Right,
    Bottom,
    Left,
}

impl Side {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Side::Top => "top",
            Side::Right => "right",
            Side::Bottom => "bottom",
            Side::Left => "left",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FontSpec {
    pub font: FontId,
    pub size: Pt,
    pub color: Color,
}

impl FontSpec {
    pub fn new(font: FontId, size: f32, color: Color) -> Result<Self> {
        if !size.is_finite() || size <= 0.0 {
            return Err(FolioError::config(format!(
                "font size must be positive, got {size}"
            )));
        }
        Ok(Self {
            font,
            size: Pt::from_f32(size),
            color,
        })
    }

    pub fn helvetica(size: f32) -> Result<Self> {
        Self::new(FontId::HELVETICA, size, Color::BLACK)
    }

    fn key(&self) -> (FontId, i64, (u8, u8, u8)) {
        (self.font, self.size.to_milli_i64(), self.color.to_rgb8())
    }
}

impl PartialEq for FontSpec {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for FontSpec {}

impl std::hash::Hash for FontSpec {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub first_row: usize,
    pub last_row: usize,
    pub first_col: usize,
    pub last_col: usize,
}

impl CellRange {
    pub fn new(first_row: usize, last_row: usize, first_col: usize, last_col: usize) -> Result<Self> {
        if first_row > last_row || first_col > last_col {
            return Err(FolioError::config("cell range bounds are inverted"));
        }
        Ok(Self {
            first_row,
            last_row,
            first_col,
            last_col,
        })
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        (self.first_row..=self.last_row).contains(&row)
            && (self.first_col..=self.last_col).contains(&col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn extent_constructors_validate() {
        assert!(Extent::percentage(50.0).is_ok());
        assert!(Extent::percentage(100.5).is_err());
        assert!(Extent::percentage(-1.0).is_err());
        assert!(Extent::absolute(-0.5).is_err());
        assert_eq!(Extent::absolute(12.0).unwrap(), Extent::Absolute(Pt::from_f32(12.0)));
    }

    #[test]
    fn percentage_resolves_against_available() {
        let ext = Extent::percentage(25.0).unwrap();
        assert_eq!(ext.fixed_length(Pt::from_f32(300.0)), Some(Pt::from_f32(75.0)));
        assert_eq!(Extent::Star.fixed_length(Pt::from_f32(300.0)), None);
    }

    #[test]
    fn uniform_border_is_detected() {
        let style = BorderStyle::solid(1.0).unwrap();
        let mut border = Border::uniform(style.clone());
        assert!(border.is_uniform());
        border.left = Some(BorderStyle::solid(2.0).unwrap());
        assert!(!border.is_uniform());
        assert_eq!(border.widths().horizontal(), Pt::from_f32(3.0));
        assert!(!Border::none().is_uniform());
    }

    #[test]
    fn font_spec_equality_uses_font_size_and_color() {
        let a = FontSpec::helvetica(10.0).unwrap();
        let b = FontSpec::helvetica(10.0).unwrap();
        let c = FontSpec::new(FontId::COURIER, 10.0, Color::BLACK).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        let set: HashSet<FontSpec> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert!(FontSpec::helvetica(0.0).is_err());
    }

    #[test]
    fn dash_rejects_negative_segments() {
        assert!(DashPattern::new(0.0, &[3.0, -1.0]).is_err());
        assert!(DashPattern::new(0.0, &[0.0, 0.0]).is_err());
        assert!(DashPattern::new(1.0, &[3.0, 2.0]).is_ok());
    }

    #[test]
    fn cell_range_contains() {
        let range = CellRange::new(1, 2, 0, 1).unwrap();
        assert!(range.contains(1, 0));
        assert!(range.contains(2, 1));
        assert!(!range.contains(0, 0));
        assert!(CellRange::new(3, 1, 0, 0).is_err());
    }
}
