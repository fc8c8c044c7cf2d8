use crate::element::Element;
use crate::error::{FolioError, Result};
use crate::types::{Color, Edges, Pt, Rect, Size};

#[derive(Debug, Clone)]
pub struct PageSet {
    page_size: Size,
    margin: Edges,
    padding: Edges,
    fill: Option<Color>,
    header: Option<Element>,
    footer: Option<Element>,
    elements: Vec<Element>,
}

impl PageSet {
    pub fn new(page_size: Size) -> Self {
        Self {
            page_size,
            margin: Edges::ZERO,
            padding: Edges::ZERO,
            fill: None,
            header: None,
            footer: None,
            elements: Vec::new(),
        }
    }

    pub fn a4() -> Self {
        Self::new(Size::a4())
    }

    pub fn letter() -> Self {
        Self::new(Size::letter())
    }

    pub fn with_margin(mut self, margin: Edges) -> Self {
        self.margin = margin;
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

    pub fn with_header(mut self, header: Element) -> Self {
        self.header = Some(header);
        self
    }

    pub fn with_footer(mut self, footer: Element) -> Self {
        self.footer = Some(footer);
        self
    }

    pub fn with_element(mut self, element: Element) -> Self {
        self.elements.push(element);
        self
    }

    pub fn push(&mut self, element: Element) {
        self.elements.push(element);
    }

    pub fn extend(&mut self, elements: impl IntoIterator<Item = Element>) {
        self.elements.extend(elements);
    }

    pub fn page_size(&self) -> Size {
        self.page_size
    }

    pub fn margin(&self) -> Edges {
        self.margin
    }

    pub fn padding(&self) -> Edges {
        self.padding
    }

    pub fn fill(&self) -> Option<Color> {
        self.fill
    }

    pub fn header(&self) -> Option<&Element> {
        self.header.as_ref()
    }

    pub fn footer(&self) -> Option<&Element> {
        self.footer.as_ref()
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn page_rect(&self) -> Rect {
        Rect::new(Pt::ZERO, Pt::ZERO, self.page_size)
    }

    pub fn content_box(&self) -> Rect {
        self.page_rect().inset(self.margin + self.padding)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !self.margin.is_non_negative() || !self.padding.is_non_negative() {
            return Err(FolioError::config("page margin and padding must be non-negative"));
        }
        let content = self.content_box();
        if content.width <= Pt::ZERO || content.height <= Pt::ZERO {
            return Err(FolioError::config(format!(
                "page {}x{} leaves no content area",
                self.page_size.width, self.page_size.height
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_box_excludes_margin_and_padding() {
        let set = PageSet::new(Size::from_f32(200.0, 300.0))
            .with_margin(Edges::all(10.0))
            .with_padding(Edges::symmetric(5.0, 0.0));
        let content = set.content_box();
        assert_eq!(content.x, Pt::from_f32(10.0));
        assert_eq!(content.y, Pt::from_f32(15.0));
        assert_eq!(content.width, Pt::from_f32(180.0));
        assert_eq!(content.height, Pt::from_f32(270.0));
        assert!(set.validate().is_ok());
    }

    #[test]
    fn oversized_margins_are_rejected() {
        let set = PageSet::new(Size::from_f32(100.0, 100.0)).with_margin(Edges::all(50.0));
        assert!(matches!(set.validate(), Err(FolioError::Configuration(_))));
        let negative = PageSet::a4().with_padding(Edges::new(-1.0, 0.0, 0.0, 0.0));
        assert!(negative.validate().is_err());
    }
}
