//! Extract tabular data from HTML tables.
//!
//! A [`Parser`] locates one `<table>` in a document, decides its header,
//! rebuilds the logical grid (`colspan`/`rowspan` duplication) and returns
//! the rows as a [`Table`] of [`Record`]s.

pub mod config;
pub mod document;
pub mod error;
pub mod grid;
pub mod header;
pub mod logging;
pub mod markup;
pub mod parser;
pub mod query;
pub mod record;
pub mod section;
pub mod selector;
pub mod table;

pub use document::HtmlSource;
pub use error::{Diagnostic, TableError, TableResult};
pub use header::HeaderSpec;
pub use parser::{Formatter, Parser, ParserOptions};
pub use query::Query;
pub use record::Record;
pub use section::{InclusionSet, Section};
pub use selector::TableSelector;
pub use table::Table;
