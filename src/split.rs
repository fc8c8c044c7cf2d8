use crate::element::{
    BoxBlock, ColumnBlock, Element, ElementKind, LayoutContext, RowBlock, RowCell, Shell, Spacer,
};
use crate::error::Result;
use crate::list;
use crate::table;
use crate::text;
use crate::types::{Pt, Size};

#[derive(Debug)]
pub enum SplitOutcome {
    Split { first: Element, second: Element },
    /// Not an error: the element could not be divided usefully.
    Refused(Element),
}

impl SplitOutcome {
    pub fn is_split(&self) -> bool {
        matches!(self, SplitOutcome::Split { .. })
    }
}

impl Element {
    /// Divides this prepared element so that the first part fits in
    /// `available.height`.
    pub fn split(self, ctx: &LayoutContext<'_>, available: Size) -> Result<SplitOutcome> {
        let prepared = self.prepared_size()?;
        let (shell, kind) = self.into_parts();
        if let ElementKind::Spacer(spacer) = kind {
            return split_spacer(shell, spacer, prepared, available.height);
        }
        let inner = available.height - shell.outline().vertical();
        if available.height <= Pt::ZERO || inner <= Pt::ZERO {
            return Ok(SplitOutcome::Refused(shell.restore(kind)));
        }
        let width = shell.layout_width();
        ctx.diagnostics.increment("split.attempts", 1);
        let outcome = match kind {
            ElementKind::Text(block) => text::split_text(shell, block, inner)?,
            ElementKind::Box(block) => split_box(shell, block, ctx, width, inner, available.height)?,
            ElementKind::Row(row) => split_row(shell, row, ctx, inner)?,
            ElementKind::Column(column) => split_column(shell, column, ctx, width, inner)?,
            ElementKind::Table(table) => table::split_table(shell, table, ctx, inner)?,
            ElementKind::BulletList(list) => list::split_list(shell, list, ctx, inner)?,
            other => SplitOutcome::Refused(shell.restore(other)),
        };
        if outcome.is_split() {
            ctx.diagnostics.increment("split.done", 1);
        }
        log::debug!(
            "split at {}: {}",
            available.height,
            if outcome.is_split() { "split" } else { "refused" }
        );
        Ok(outcome)
    }
}

// Pure blank space: the only kind that diverts everything to the second part
// when no height is left.
fn split_spacer(
    shell: Shell,
    spacer: Spacer,
    prepared: Size,
    height: Pt,
) -> Result<SplitOutcome> {
    if height >= prepared.height {
        return Ok(SplitOutcome::Refused(shell.restore(ElementKind::Spacer(spacer))));
    }
    if height <= Pt::ZERO {
        let whole = shell.restore(ElementKind::Spacer(spacer));
        return Ok(SplitOutcome::Split {
            first: Element::vacant(Pt::ZERO),
            second: whole,
        });
    }
    let inner = (height - shell.outline().vertical()).max(Pt::ZERO);
    let first = shell.part(ElementKind::Spacer(Spacer {
        height: inner,
        width: spacer.width,
    }))?;
    if first.prepared_size()?.height > height {
        return Ok(SplitOutcome::Refused(shell.restore(ElementKind::Spacer(spacer))));
    }
    Ok(SplitOutcome::Split {
        first,
        second: Element::vacant(spacer.width.unwrap_or(Pt::ZERO)),
    })
}

fn split_box(
    shell: Shell,
    block: BoxBlock,
    ctx: &LayoutContext<'_>,
    width: Pt,
    inner: Pt,
    height: Pt,
) -> Result<SplitOutcome> {
    let BoxBlock { child, align } = block;
    let Some(child) = child else {
        return Ok(SplitOutcome::Refused(
            shell.restore(ElementKind::Box(BoxBlock { child: None, align })),
        ));
    };
    if child.prepared_size()?.height <= inner {
        let whole = shell.restore(ElementKind::Box(BoxBlock {
            child: Some(child),
            align,
        }));
        if whole.prepared_size()?.height > height {
            return Ok(SplitOutcome::Refused(whole));
        }
        return Ok(SplitOutcome::Split {
            first: whole,
            second: Element::vacant_box(),
        });
    }
    match (*child).split(ctx, Size::new(width, inner))? {
        SplitOutcome::Split { first, second } => Ok(SplitOutcome::Split {
            first: shell.part(ElementKind::Box(BoxBlock {
                child: Some(Box::new(first)),
                align,
            }))?,
            second: shell.part(ElementKind::Box(BoxBlock {
                child: Some(Box::new(second)),
                align,
            }))?,
        }),
        SplitOutcome::Refused(child) => Ok(SplitOutcome::Split {
            first: Element::vacant_box(),
            second: shell.restore(ElementKind::Box(BoxBlock {
                child: Some(Box::new(child)),
                align,
            })),
        }),
    }
}

fn split_column(
    shell: Shell,
    column: ColumnBlock,
    ctx: &LayoutContext<'_>,
    width: Pt,
    inner: Pt,
) -> Result<SplitOutcome> {
    let mut used = Pt::ZERO;
    let mut overflow_at = None;
    for (index, child) in column.children.iter().enumerate() {
        let child_height = child.prepared_size()?.height;
        if used + child_height > inner {
            overflow_at = Some(index);
            break;
        }
        used += child_height;
    }
    let Some(index) = overflow_at else {
        return Ok(SplitOutcome::Refused(shell.restore(ElementKind::Column(column))));
    };

    let mut children = column.children;
    let tail = children.split_off(index + 1);
    let Some(straddling) = children.pop() else {
        return Ok(SplitOutcome::Refused(shell.restore(ElementKind::Column(
            ColumnBlock { children: tail },
        ))));
    };
    let mut head = children;
    let mut rest = Vec::with_capacity(tail.len() + 1);
    match straddling.split(ctx, Size::new(width, inner - used))? {
        SplitOutcome::Split { first, second } => {
            if first.has_content() || !head.is_empty() {
                head.push(first);
                rest.push(second);
            } else {
                rest.push(second);
            }
        }
        SplitOutcome::Refused(child) => rest.push(child),
    }
    rest.extend(tail);
    if !head.iter().any(Element::has_content) {
        head.extend(rest);
        return Ok(SplitOutcome::Refused(shell.restore(ElementKind::Column(
            ColumnBlock { children: head },
        ))));
    }
    Ok(SplitOutcome::Split {
        first: shell.part(ElementKind::Column(ColumnBlock { children: head }))?,
        second: shell.part(ElementKind::Column(ColumnBlock { children: rest }))?,
    })
}

fn split_row(
    shell: Shell,
    row: RowBlock,
    ctx: &LayoutContext<'_>,
    inner: Pt,
) -> Result<SplitOutcome> {
    let RowBlock { cells, widths } = row;
    let specs: Vec<_> = cells.iter().map(|cell| cell.width).collect();
    let children: Vec<Element> = cells.into_iter().map(|cell| cell.child).collect();
    match split_cells(ctx, children, &widths, inner)? {
        CellSplit::Split { first, second } => {
            let rebuild = |parts: Vec<Element>| RowBlock {
                cells: parts
                    .into_iter()
                    .zip(&specs)
                    .map(|(child, width)| RowCell {
                        child,
                        width: *width,
                    })
                    .collect(),
                widths: widths.clone(),
            };
            Ok(SplitOutcome::Split {
                first: shell.part(ElementKind::Row(rebuild(first)))?,
                second: shell.part(ElementKind::Row(rebuild(second)))?,
            })
        }
        CellSplit::Refused(children) => {
            let cells = children
                .into_iter()
                .zip(&specs)
                .map(|(child, width)| RowCell {
                    child,
                    width: *width,
                })
                .collect();
            Ok(SplitOutcome::Refused(
                shell.restore(ElementKind::Row(RowBlock { cells, widths })),
            ))
        }
    }
}

pub(crate) enum CellSplit {
    Split {
        first: Vec<Element>,
        second: Vec<Element>,
    },
    Refused(Vec<Element>),
}

pub(crate) fn split_cells(
    ctx: &LayoutContext<'_>,
    cells: Vec<Element>,
    widths: &[Pt],
    height: Pt,
) -> Result<CellSplit> {
    let mut overflowing = false;
    for cell in &cells {
        if cell.prepared_size()?.height > height {
            overflowing = true;
        }
    }
    if !overflowing {
        return Ok(CellSplit::Refused(cells));
    }
    let backup = cells.clone();
    let mut first = Vec::with_capacity(cells.len());
    let mut second = Vec::with_capacity(cells.len());
    for (cell, width) in cells.into_iter().zip(widths.iter().copied()) {
        if cell.prepared_size()?.height <= height {
            first.push(cell);
            second.push(Element::vacant(width));
            continue;
        }
        match cell.split(ctx, Size::new(width, height))? {
            SplitOutcome::Split { first: a, second: b } => {
                first.push(a);
                second.push(b);
            }
            SplitOutcome::Refused(_) => return Ok(CellSplit::Refused(backup)),
        }
    }
    if !first.iter().any(Element::has_content) {
        return Ok(CellSplit::Refused(backup));
    }
    Ok(CellSplit::Split { first, second })
}
