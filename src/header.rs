use ego_tree::NodeId;
use scraper::ElementRef;
use tracing::debug;

use crate::error::{TableError, TableResult};
use crate::grid::{extract_row, RowSpanState};
use crate::section::Section;

/// How the header of a table is decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderSpec {
    /// Caller supplied names, used verbatim
    Explicit(Vec<String>),
    /// No header: records stay positional
    Suppressed,
    /// Read from the row at `offset` within `section`
    Derived { section: Section, offset: i64 },
}

/// The header in effect for one parse call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedHeader {
    pub names: Vec<String>,
    /// Row the names were read from; the body scan skips it
    pub row: Option<NodeId>,
}

/// Explicit header names must be unique
pub fn validate_header(names: &[String]) -> TableResult<()> {
    let mut sorted: Vec<&String> = names.iter().collect();
    sorted.sort();
    if sorted.windows(2).any(|pair| pair[0] == pair[1]) {
        return Err(TableError::duplicate_header_names(names));
    }
    Ok(())
}

/// Decide the active header of `table`
///
/// A derived header that cannot be found is empty, not an error.
pub fn resolve_header(table: ElementRef<'_>, spec: &HeaderSpec) -> TableResult<ResolvedHeader> {
    match spec {
        HeaderSpec::Explicit(names) => {
            validate_header(names)?;
            debug!(columns = names.len(), "Using explicit header");
            Ok(ResolvedHeader {
                names: names.clone(),
                row: None,
            })
        }
        HeaderSpec::Suppressed => {
            debug!("Table header ignored");
            Ok(ResolvedHeader::default())
        }
        HeaderSpec::Derived { section, offset } => {
            let (query, index) = section.row_query(*offset)?;
            let Some(row) = query.nth(*table, index) else {
                debug!(%section, offset, "No header row found");
                return Ok(ResolvedHeader::default());
            };

            // header rows never share carry-over state with the body
            let names = extract_row(row, &mut RowSpanState::new());
            debug!(%section, offset, columns = names.len(), "Derived header row");

            let row = (!names.is_empty()).then(|| row.id());
            Ok(ResolvedHeader { names, row })
        }
    }
}
