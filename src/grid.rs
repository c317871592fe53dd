//! Logical row reconstruction for tables with merged cells.
//!
//! A row is read left to right while a running column index is kept. A cell
//! with `colspan = c` contributes `c` copies of its text. A cell with
//! `rowspan = r` also leaves a carry-over entry at its starting column: the
//! same group of values is owed to each of the next `r - 1` rows and is
//! inserted there before the cell that would otherwise occupy that column.
//!
//! ```text
//! <tr><td>a</td><td rowspan=2 colspan=2>B</td><td>c</td></tr>   a B B c
//! <tr><td>d</td><td>e</td></tr>                                  d B B e
//! ```
//!
//! Every owed group is consumed exactly once per row. A row that ends short
//! of a carried column is padded with empty values up to it, and a cell
//! that spans over a carried column uses up that row's copy.
//!
//! Carry-over state is threaded explicitly through [`extract_row`]; callers
//! decide how long it lives (one contiguous block of rows, see
//! [`crate::parser`]).

use std::collections::BTreeMap;
use std::ops::Range;

use scraper::ElementRef;
use tracing::trace;

use crate::document::text_content;

/// Spans outside `2..=MAX_SPAN` are treated as 1
pub const MAX_SPAN: usize = 1000;

const CELL_TAGS: [&str; 2] = ["th", "td"];

/// Values owed to later rows by a cell spanning several rows
#[derive(Debug, Clone, PartialEq, Eq)]
struct CarryOver {
    values: Vec<String>,
    remaining: usize,
}

/// Pending row-span values keyed by logical column index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSpanState {
    pending: BTreeMap<usize, CarryOver>,
}

impl RowSpanState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of columns with values still owed to later rows
    pub fn pending_columns(&self) -> usize {
        self.pending.len()
    }

    fn register(&mut self, column: usize, values: Vec<String>, remaining: usize) {
        if remaining > 0 {
            self.pending.insert(column, CarryOver { values, remaining });
        }
    }

    /// Pop one group owed at `column`, dropping the entry once drained
    fn take(&mut self, column: usize) -> Option<Vec<String>> {
        let entry = self.pending.get_mut(&column)?;
        entry.remaining -= 1;
        let values = if entry.remaining == 0 {
            self.pending.remove(&column)?.values
        } else {
            entry.values.clone()
        };
        Some(values)
    }

    /// Append every group owed at `column` and the columns it reaches
    fn drain_into(&mut self, column: &mut usize, row: &mut Vec<String>) {
        while let Some(values) = self.take(*column) {
            let start = *column;
            *column += values.len();
            row.extend(values);
            self.skip_covered(start + 1..*column);
        }
    }

    /// Append every group still owed at or past `column`, padding skipped
    /// columns with empty values
    fn drain_trailing(&mut self, column: &mut usize, row: &mut Vec<String>) {
        while let Some(next) = self.pending.range(*column..).next().map(|(key, _)| *key) {
            row.resize(row.len() + (next - *column), String::new());
            *column = next;
            self.drain_into(column, row);
        }
    }

    /// Count this row against every group owed inside `columns`, which
    /// another cell already occupies
    fn skip_covered(&mut self, columns: Range<usize>) {
        let covered: Vec<usize> = self.pending.range(columns).map(|(key, _)| *key).collect();
        for column in covered {
            self.take(column);
        }
    }
}

/// Span attribute value, read the way lenient HTML consumers do: leading
/// digits only, anything unreadable or out of range counts as 1
pub fn span_size(value: Option<&str>) -> usize {
    let digits: String = value
        .unwrap_or("")
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();

    match digits.parse::<usize>() {
        Ok(span) if (2..=MAX_SPAN).contains(&span) => span,
        _ => 1,
    }
}

pub fn is_cell(element: &ElementRef<'_>) -> bool {
    let name = element.value().name();
    CELL_TAGS.iter().any(|tag| name.eq_ignore_ascii_case(tag))
}

/// Flat logical values of `row`, updating `state` for the rows that follow
pub fn extract_row(row: ElementRef<'_>, state: &mut RowSpanState) -> Vec<String> {
    let mut values = Vec::new();
    let mut column = 0;

    for cell in row.children().filter_map(ElementRef::wrap).filter(is_cell) {
        state.drain_into(&mut column, &mut values);

        let colspan = span_size(cell.value().attr("colspan"));
        let rowspan = span_size(cell.value().attr("rowspan"));
        let group = vec![text_content(cell); colspan];

        values.extend(group.iter().cloned());
        state.skip_covered(column..column + colspan);
        state.register(column, group, rowspan - 1);
        column += colspan;
    }

    // groups owed past the last cell, including across gaps
    state.drain_trailing(&mut column, &mut values);

    trace!(columns = values.len(), pending = state.pending_columns(), "Extracted row");
    values
}
