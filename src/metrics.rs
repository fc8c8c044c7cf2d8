use crate::types::Pt;

#[derive(Debug, Clone, Default)]
pub struct PageMetrics {
    pub page_number: usize,
    pub page_set: usize,
    pub render_ms: f64,
    pub command_count: usize,
    pub placed_elements: usize,
    pub used_height: Pt,
    pub overflowed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentMetrics {
    pub pages: Vec<PageMetrics>,
    pub total_render_ms: f64,
    pub total_bytes: usize,
    pub splits: u64,
}

impl DocumentMetrics {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn total_commands(&self) -> usize {
        self.pages.iter().map(|page| page.command_count).sum()
    }

    pub fn overflowed_pages(&self) -> impl Iterator<Item = usize> + '_ {
        self.pages
            .iter()
            .filter(|page| page.overflowed)
            .map(|page| page.page_number)
    }
}
