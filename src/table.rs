use crate::canvas::Canvas;
use crate::distribute::distribute_widths;
use crate::element::{Element, ElementKind, LayoutContext, RenderContext, Shell};
use crate::error::{FolioError, Result};
use crate::spec::{BorderStyle, CellRange, Side, WidthSpec};
use crate::split::{CellSplit, SplitOutcome, split_cells};
use crate::types::{Pt, Rect, Size};

#[derive(Debug, Clone)]
pub struct TableCell {
    pub child: Element,
    span: usize,
}

impl TableCell {
    pub fn new(child: Element) -> Self {
        Self { child, span: 1 }
    }

    pub fn with_span(mut self, span: usize) -> Self {
        self.span = span;
        self
    }

    pub fn span(&self) -> usize {
        self.span
    }
}

#[derive(Debug, Clone, Default)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

impl TableRow {
    pub fn new(cells: Vec<TableCell>) -> Self {
        Self { cells }
    }

    pub fn of(children: Vec<Element>) -> Self {
        Self::new(children.into_iter().map(TableCell::new).collect())
    }

    fn height(&self) -> Result<Pt> {
        let mut height = Pt::ZERO;
        for cell in &self.cells {
            height = height.max(cell.child.prepared_size()?.height);
        }
        Ok(height)
    }

    fn into_children(self) -> (Vec<Element>, Vec<usize>) {
        self.cells
            .into_iter()
            .map(|cell| (cell.child, cell.span))
            .unzip()
    }

    fn from_children(children: Vec<Element>, spans: &[usize]) -> Self {
        Self::new(
            children
                .into_iter()
                .zip(spans)
                .map(|(child, span)| TableCell { child, span: *span })
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridEdges {
    All,
    Outer,
    Inner,
}

#[derive(Debug, Clone)]
pub struct Table {
    columns: Vec<WidthSpec>,
    header_rows: usize,
    rows: Vec<TableRow>,
    widths: Vec<Pt>,
}

impl Table {
    pub fn new(columns: Vec<WidthSpec>) -> Self {
        Self {
            columns,
            header_rows: 0,
            rows: Vec::new(),
            widths: Vec::new(),
        }
    }

    pub fn with_header_rows(mut self, count: usize) -> Self {
        self.header_rows = count;
        self
    }

    pub fn push_row(&mut self, row: TableRow) -> Result<()> {
        if row.cells.iter().any(|cell| cell.span == 0) {
            return Err(FolioError::config("table cell span must be at least 1"));
        }
        let spanned: usize = row.cells.iter().map(|cell| cell.span).sum();
        if spanned != self.columns.len() {
            return Err(FolioError::config(format!(
                "table row spans {spanned} columns, table has {}",
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn with_row(mut self, row: TableRow) -> Result<Self> {
        self.push_row(row)?;
        Ok(self)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[WidthSpec] {
        &self.columns
    }

    pub fn header_row_count(&self) -> usize {
        self.header_rows.min(self.rows.len())
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn body_rows(&self) -> &[TableRow] {
        &self.rows[self.header_row_count()..]
    }

    pub fn widths(&self) -> &[Pt] {
        &self.widths
    }

    pub fn stamp_grid(&mut self, style: &BorderStyle, edges: GridEdges, range: Option<CellRange>) {
        if self.rows.is_empty() || self.columns.is_empty() {
            return;
        }
        let range = range.unwrap_or(CellRange {
            first_row: 0,
            last_row: self.rows.len() - 1,
            first_col: 0,
            last_col: self.columns.len() - 1,
        });
        for (row_index, row) in self.rows.iter_mut().enumerate() {
            if row_index < range.first_row || row_index > range.last_row {
                continue;
            }
            let mut column = 0;
            for cell in &mut row.cells {
                let first_col = column;
                let last_col = column + cell.span.max(1) - 1;
                column = last_col + 1;
                if last_col < range.first_col || first_col > range.last_col {
                    continue;
                }
                let sides = [
                    (Side::Top, row_index == range.first_row),
                    (Side::Right, last_col >= range.last_col),
                    (Side::Bottom, row_index == range.last_row),
                    (Side::Left, first_col <= range.first_col),
                ];
                for (side, outer) in sides {
                    let wanted = match edges {
                        GridEdges::All => true,
                        GridEdges::Outer => outer,
                        GridEdges::Inner => !outer,
                    };
                    if wanted {
                        *cell.child.border.side_mut(side) = Some(style.clone());
                    }
                }
            }
        }
    }

    pub(crate) fn children(&self) -> Vec<&Element> {
        self.rows
            .iter()
            .flat_map(|row| row.cells.iter().map(|cell| &cell.child))
            .collect()
    }

    pub(crate) fn children_mut(&mut self) -> Vec<&mut Element> {
        self.rows
            .iter_mut()
            .flat_map(|row| row.cells.iter_mut().map(|cell| &mut cell.child))
            .collect()
    }

    pub(crate) fn reset(&mut self) {
        self.widths.clear();
    }

    pub(crate) fn layout(&mut self, ctx: &LayoutContext<'_>, content: Size) -> Result<()> {
        let columns = &self.columns;
        let rows = &mut self.rows;
        // Auto columns measure only single-column cells.
        let widths = distribute_widths(content.width, columns, |index, remaining| {
            let mut natural = Pt::ZERO;
            for row in rows.iter_mut() {
                let mut column = 0;
                for cell in &mut row.cells {
                    if column == index && cell.span == 1 {
                        let size = cell.child.prepare(ctx, Size::new(remaining, content.height))?;
                        cell.child.mark_not_prepared();
                        natural = natural.max(size.width);
                    }
                    column += cell.span;
                }
            }
            Ok(natural)
        })?;
        for row in rows.iter_mut() {
            let mut column = 0;
            for cell in &mut row.cells {
                let width = span_width(&widths, column, cell.span);
                cell.child.prepare(ctx, Size::new(width, content.height))?;
                column += cell.span;
            }
        }
        ctx.diagnostics.increment("table.rows", rows.len() as u64);
        self.widths = widths;
        Ok(())
    }

    pub(crate) fn content_size(&self) -> Result<Size> {
        let mut height = Pt::ZERO;
        for row in &self.rows {
            height += row.height()?;
        }
        Ok(Size::new(self.widths.iter().sum(), height))
    }

    pub(crate) fn has_body_content(&self) -> bool {
        self.body_rows()
            .iter()
            .any(|row| row.cells.iter().any(|cell| cell.child.has_content()))
    }

    fn cell_widths(&self, row: &TableRow) -> Vec<Pt> {
        let mut column = 0;
        row.cells
            .iter()
            .map(|cell| {
                let width = span_width(&self.widths, column, cell.span);
                column += cell.span;
                width
            })
            .collect()
    }

    pub(crate) fn render(
        &self,
        ctx: &RenderContext<'_>,
        canvas: &mut Canvas,
        content: Rect,
    ) -> Result<()> {
        let mut y = content.y;
        for row in &self.rows {
            let height = row.height()?;
            let mut x = content.x;
            for (cell, width) in row.cells.iter().zip(self.cell_widths(row)) {
                let outer = cell.child.stretched(Size::new(width, height))?;
                cell.child.render_sized(ctx, canvas, x, y, outer)?;
                x += width;
            }
            y += height;
        }
        Ok(())
    }
}

fn span_width(widths: &[Pt], start: usize, span: usize) -> Pt {
    widths.iter().skip(start).take(span).sum()
}

pub(crate) fn split_table(
    shell: Shell,
    mut table: Table,
    ctx: &LayoutContext<'_>,
    height: Pt,
) -> Result<SplitOutcome> {
    let header_count = table.header_row_count();
    let mut header_height = Pt::ZERO;
    for row in &table.rows[..header_count] {
        header_height += row.height()?;
    }
    let available = height - header_height;
    if available <= Pt::ZERO || header_count == table.rows.len() {
        return Ok(SplitOutcome::Refused(shell.restore(ElementKind::Table(table))));
    }

    let mut used = Pt::ZERO;
    let mut overflow_at = None;
    for (index, row) in table.rows.iter().enumerate().skip(header_count) {
        let row_height = row.height()?;
        if used + row_height > available {
            overflow_at = Some(index);
            break;
        }
        used += row_height;
    }
    let Some(index) = overflow_at else {
        return Ok(SplitOutcome::Refused(shell.restore(ElementKind::Table(table))));
    };

    let widths = table.cell_widths(&table.rows[index]);
    let mut placed = std::mem::take(&mut table.rows);
    let tail = placed.split_off(index);
    let mut tail = tail.into_iter();
    let mut continuation = Vec::new();
    if let Some(straddling) = tail.next() {
        let (children, spans) = straddling.into_children();
        match split_cells(ctx, children, &widths, available - used)? {
            CellSplit::Split { first, second } => {
                placed.push(TableRow::from_children(first, &spans));
                continuation.push(TableRow::from_children(second, &spans));
            }
            CellSplit::Refused(children) => {
                continuation.push(TableRow::from_children(children, &spans));
            }
        }
    }
    continuation.extend(tail);

    if placed.len() == header_count {
        placed.extend(continuation);
        table.rows = placed;
        return Ok(SplitOutcome::Refused(shell.restore(ElementKind::Table(table))));
    }

    let mut second_rows = placed[..header_count].to_vec();
    second_rows.extend(continuation);
    log::debug!(
        "table split after {} body rows, {} continue",
        placed.len() - header_count,
        second_rows.len() - header_count
    );
    let first = Table {
        columns: table.columns.clone(),
        header_rows: header_count,
        rows: placed,
        widths: table.widths.clone(),
    };
    let second = Table {
        columns: table.columns,
        header_rows: header_count,
        rows: second_rows,
        widths: table.widths,
    };
    Ok(SplitOutcome::Split {
        first: shell.part(ElementKind::Table(first))?,
        second: shell.part(ElementKind::Table(second))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;
    use crate::element::testing::*;
    use crate::spec::Extent;
    use crate::types::Color;

    fn table_of(columns: Vec<WidthSpec>, header_rows: usize, rows: Vec<Vec<&str>>) -> Table {
        let mut table = Table::new(columns).with_header_rows(header_rows);
        for cells in rows {
            table
                .push_row(TableRow::of(cells.into_iter().map(text).collect()))
                .unwrap();
        }
        table
    }

    fn row_texts(element: &Element) -> Vec<String> {
        let ElementKind::Table(table) = element.kind() else {
            panic!("table expected");
        };
        table
            .rows()
            .iter()
            .map(|row| {
                row.cells
                    .iter()
                    .map(|cell| cell.child.text_content())
                    .collect::<Vec<_>>()
                    .join("|")
            })
            .collect()
    }

    #[test]
    fn rows_must_cover_every_column() {
        let mut table = Table::new(vec![Extent::Star, Extent::Star]);
        assert!(table.push_row(TableRow::of(vec![text("a")])).is_err());
        assert!(
            table
                .push_row(TableRow::new(vec![TableCell::new(text("a")).with_span(0), TableCell::new(text("b")).with_span(2)]))
                .is_err()
        );
        assert!(table.push_row(TableRow::new(vec![TableCell::new(text("a")).with_span(2)])).is_ok());
        assert_eq!(table.column_count(), 2);
    }

    #[test]
    fn auto_column_uses_widest_single_cell() {
        let harness = Harness::new();
        let table = table_of(
            vec![Extent::absolute(50.0).unwrap(), Extent::Star, Extent::Auto],
            0,
            vec![vec!["x", "y", "abcd"], vec!["x", "y", "ab"]],
        );
        let mut element = Element::table(table);
        let prepared = element.prepare(&harness.ctx(), size(300.0, 500.0)).unwrap();
        assert_eq!(prepared, size(300.0, 24.0));
        let ElementKind::Table(table) = element.kind() else {
            panic!("table expected");
        };
        assert_eq!(table.widths(), &[pt(50.0), pt(230.0), pt(20.0)]);
    }

    #[test]
    fn spanning_cell_gets_combined_width() {
        let harness = Harness::new();
        let mut table = Table::new(vec![Extent::Star, Extent::Star]);
        // 30 chars = 150pt: wraps in one column, fits in two
        table
            .push_row(TableRow::new(vec![
                TableCell::new(text("aaaaaaaaaaaaaaa aaaaaaaaaaaaaa")).with_span(2),
            ]))
            .unwrap();
        let mut element = Element::table(table);
        let prepared = element.prepare(&harness.ctx(), size(200.0, 500.0)).unwrap();
        assert_eq!(prepared.height, pt(12.0));
    }

    #[test]
    fn cells_stretch_to_row_height() {
        let harness = Harness::new();
        let mut table = Table::new(vec![Extent::Star, Extent::Star]);
        table
            .push_row(TableRow::of(vec![
                text("a").with_fill(Color::rgb(0.9, 0.9, 0.9)),
                text("a\nb"),
            ]))
            .unwrap();
        let mut element = Element::table(table);
        element.prepare(&harness.ctx(), size(100.0, 500.0)).unwrap();
        let mut canvas = Canvas::new(Size::a4());
        element
            .render(&harness.render_ctx(), &mut canvas, Pt::ZERO, Pt::ZERO)
            .unwrap();
        let doc = canvas.finish();
        let fill = doc.pages[0].commands.iter().find_map(|cmd| match cmd {
            Command::FillRect { width, height, .. } => Some((*width, *height)),
            _ => None,
        });
        assert_eq!(fill, Some((pt(50.0), pt(24.0))));
    }

    #[test]
    fn split_repeats_header_rows() {
        let harness = Harness::new();
        let table = table_of(
            vec![Extent::Star, Extent::Star],
            1,
            vec![
                vec!["h1", "h2"],
                vec!["a", "1"],
                vec!["b", "2"],
                vec!["c", "3"],
                vec!["d", "4"],
                vec!["e", "5"],
            ],
        );
        let mut element = Element::table(table);
        element.prepare(&harness.ctx(), size(100.0, 500.0)).unwrap();
        let outcome = element.split(&harness.ctx(), size(100.0, 40.0)).unwrap();
        let SplitOutcome::Split { first, second } = outcome else {
            panic!("expected split");
        };
        assert_eq!(row_texts(&first), vec!["h1|h2", "a|1", "b|2"]);
        assert_eq!(row_texts(&second), vec!["h1|h2", "c|3", "d|4", "e|5"]);
        assert_eq!(first.prepared_size().unwrap().height, pt(36.0));
        assert_eq!(second.prepared_size().unwrap().height, pt(48.0));
    }

    #[test]
    fn split_refuses_when_header_fills_the_space() {
        let harness = Harness::new();
        let table = table_of(vec![Extent::Star], 1, vec![vec!["h"], vec!["a"], vec!["b"]]);
        let mut element = Element::table(table);
        element.prepare(&harness.ctx(), size(100.0, 500.0)).unwrap();
        let outcome = element.split(&harness.ctx(), size(100.0, 12.0)).unwrap();
        let SplitOutcome::Refused(element) = outcome else {
            panic!("expected refusal");
        };
        assert_eq!(row_texts(&element), vec!["h", "a", "b"]);
    }

    #[test]
    fn tall_row_splits_inside_its_cells() {
        let harness = Harness::new();
        let table = table_of(
            vec![Extent::Star, Extent::Star],
            0,
            vec![vec!["x", "y"], vec!["left", "1\n2\n3\n4"]],
        );
        let mut element = Element::table(table);
        element.prepare(&harness.ctx(), size(100.0, 500.0)).unwrap();
        let outcome = element.split(&harness.ctx(), size(100.0, 40.0)).unwrap();
        let SplitOutcome::Split { first, second } = outcome else {
            panic!("expected split");
        };
        assert_eq!(row_texts(&first), vec!["x|y", "left|1\n2\n"]);
        assert_eq!(row_texts(&second), vec!["|3\n4"]);
        assert_eq!(first.prepared_size().unwrap().height, pt(36.0));
    }

    #[test]
    fn stamp_outer_grid_marks_boundary_only() {
        let mut table = table_of(
            vec![Extent::Star, Extent::Star],
            0,
            vec![vec!["a", "b"], vec!["c", "d"]],
        );
        let style = BorderStyle::solid(1.0).unwrap();
        table.stamp_grid(&style, GridEdges::Outer, None);
        let corner = &table.rows()[0].cells[0].child;
        assert!(corner.border().top.is_some());
        assert!(corner.border().left.is_some());
        assert!(corner.border().right.is_none());
        assert!(corner.border().bottom.is_none());

        let mut inner = table_of(vec![Extent::Star, Extent::Star], 0, vec![vec!["a", "b"], vec!["c", "d"]]);
        inner.stamp_grid(&style, GridEdges::Inner, Some(CellRange::new(0, 1, 0, 1).unwrap()));
        let last = inner.rows()[1].cells[1].child.border();
        assert!(last.top.is_some() && last.left.is_some());
        assert!(last.bottom.is_none() && last.right.is_none());
    }
}
