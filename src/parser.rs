//! Table location, section scanning and the immutable parser configuration.
//!
//! Rows are read section by section in document order. Row-span carry-over
//! is scoped to one contiguous block of rows: every `tbody`/`tfoot` starts
//! with a fresh state, and so does every run of bare `tr` children.

use std::fmt;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use scraper::ElementRef;
use tracing::{debug, trace};

use crate::document::{self, text_content, HtmlSource};
use crate::error::{TableError, TableResult};
use crate::grid::{extract_row, RowSpanState};
use crate::header::{resolve_header, validate_header, HeaderSpec, ResolvedHeader};
use crate::logging::PerformanceTimer;
use crate::query::Query;
use crate::record::{format_record, Record};
use crate::section::{is_included, InclusionSet, Section};
use crate::selector::TableSelector;
use crate::table::Table;

/// Reshapes each record before it is collected
pub type Formatter<R> = Arc<dyn Fn(Record) -> R + Send + Sync>;

/// Every setting of a [`Parser`] except the formatter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    query: Query,
    header: Vec<String>,
    ignore_header: bool,
    header_section: Section,
    header_offset: usize,
    inclusion: InclusionSet,
    caption: Option<String>,
    strict: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            query: Query::nth_table(0),
            header: Vec::new(),
            ignore_header: false,
            header_section: Section::Header,
            header_offset: 0,
            inclusion: InclusionSet::all(),
            caption: None,
            strict: false,
        }
    }
}

/// Immutable HTML table parser
///
/// Every setter consumes the parser and hands back the updated one, or the
/// same one when the setting is already in effect. A parser holds no
/// document state, so one instance can serve any number of threads.
///
/// ```no_run
/// use html_tables::{Parser, Section};
///
/// let table = Parser::new()
///     .table_id("prices")?
///     .table_header_position(Section::Body, 0)?
///     .parse_file("report.html")?;
/// println!("{} records", table.len());
/// # Ok::<(), html_tables::TableError>(())
/// ```
pub struct Parser<R = Record> {
    options: ParserOptions,
    formatter: Formatter<R>,
    custom_formatter: bool,
}

impl Parser<Record> {
    pub fn new() -> Self {
        Self {
            options: ParserOptions::default(),
            formatter: Arc::new(|record| record),
            custom_formatter: false,
        }
    }
}

impl Default for Parser<Record> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Clone for Parser<R> {
    fn clone(&self) -> Self {
        Self {
            options: self.options.clone(),
            formatter: Arc::clone(&self.formatter),
            custom_formatter: self.custom_formatter,
        }
    }
}

impl<R> fmt::Debug for Parser<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("options", &self.options)
            .field("custom_formatter", &self.custom_formatter)
            .finish()
    }
}

/// Parsers are equal when their options match and they share a formatter
impl<R> PartialEq for Parser<R> {
    fn eq(&self, other: &Self) -> bool {
        let same_formatter = match (self.custom_formatter, other.custom_formatter) {
            (false, false) => true,
            (true, true) => std::ptr::eq(
                Arc::as_ptr(&self.formatter) as *const (),
                Arc::as_ptr(&other.formatter) as *const (),
            ),
            _ => false,
        };
        same_formatter && self.options == other.options
    }
}

impl<R> Parser<R> {
    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Query locating the target table
    pub fn query(&self) -> &Query {
        &self.options.query
    }

    /// Header decision in priority order: explicit, suppressed, derived
    pub fn header_spec(&self) -> HeaderSpec {
        if !self.options.header.is_empty() {
            HeaderSpec::Explicit(self.options.header.clone())
        } else if self.options.ignore_header {
            HeaderSpec::Suppressed
        } else {
            HeaderSpec::Derived {
                section: self.options.header_section,
                offset: self.options.header_offset as i64,
            }
        }
    }

    pub fn inclusion(&self) -> InclusionSet {
        self.options.inclusion
    }

    pub fn is_strict(&self) -> bool {
        self.options.strict
    }

    pub fn has_formatter(&self) -> bool {
        self.custom_formatter
    }

    fn with_options(self, options: ParserOptions) -> Self {
        if options == self.options {
            return self;
        }
        Self { options, ..self }
    }

    /// Select the table by zero-based position in document order
    pub fn table_position(self, position: i64) -> TableResult<Self> {
        self.table_selector(TableSelector::Position(position))
    }

    /// Select the first table whose `id` attribute equals `id`
    pub fn table_id(self, id: &str) -> TableResult<Self> {
        self.table_selector(TableSelector::Id(id.to_string()))
    }

    /// Select the first element matched by a raw path expression
    pub fn table_expression(self, expression: &str) -> TableResult<Self> {
        self.table_selector(TableSelector::Expression(expression.to_string()))
    }

    pub fn table_selector(self, selector: TableSelector) -> TableResult<Self> {
        let query = selector.to_query()?;
        let options = ParserOptions {
            query,
            ..self.options.clone()
        };
        Ok(self.with_options(options))
    }

    /// Use these column names instead of reading a header from the table;
    /// an empty list goes back to the configured header resolution
    pub fn table_header<I, S>(self, names: I) -> TableResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let header: Vec<String> = names.into_iter().map(Into::into).collect();
        if header == self.options.header {
            return Ok(self);
        }
        validate_header(&header)?;

        let options = ParserOptions {
            header,
            ..self.options.clone()
        };
        Ok(self.with_options(options))
    }

    /// Read every row as data and keep records positional
    pub fn ignore_table_header(self) -> Self {
        let options = ParserOptions {
            ignore_header: true,
            ..self.options.clone()
        };
        self.with_options(options)
    }

    /// Undo [`Parser::ignore_table_header`]
    pub fn resolve_table_header(self) -> Self {
        let options = ParserOptions {
            ignore_header: false,
            ..self.options.clone()
        };
        self.with_options(options)
    }

    /// Read the header from the row at `offset` within `section`
    pub fn table_header_position(self, section: Section, offset: i64) -> TableResult<Self> {
        if offset < 0 {
            return Err(TableError::InvalidOffset { offset });
        }

        let options = ParserOptions {
            header_section: section,
            header_offset: offset as usize,
            ..self.options.clone()
        };
        Ok(self.with_options(options))
    }

    /// Scan rows of `section` for records (`Header` is never scanned)
    pub fn include_section(self, section: Section) -> Self {
        let options = ParserOptions {
            inclusion: self.options.inclusion.with(section),
            ..self.options.clone()
        };
        self.with_options(options)
    }

    pub fn exclude_section(self, section: Section) -> Self {
        let options = ParserOptions {
            inclusion: self.options.inclusion.without(section),
            ..self.options.clone()
        };
        self.with_options(options)
    }

    pub fn include_table_footer(self) -> Self {
        self.include_section(Section::Footer)
    }

    pub fn exclude_table_footer(self) -> Self {
        self.exclude_section(Section::Footer)
    }

    /// Caption used when the table has no `<caption>` of its own
    pub fn table_caption(self, caption: Option<String>) -> Self {
        let options = ParserOptions {
            caption,
            ..self.options.clone()
        };
        self.with_options(options)
    }

    /// Fail with `MalformedMarkup` when the HTML parser reports errors
    pub fn fail_on_markup_errors(self) -> Self {
        let options = ParserOptions {
            strict: true,
            ..self.options.clone()
        };
        self.with_options(options)
    }

    pub fn ignore_markup_errors(self) -> Self {
        let options = ParserOptions {
            strict: false,
            ..self.options.clone()
        };
        self.with_options(options)
    }

    /// Apply `formatter` to every record; its output becomes the record
    pub fn with_formatter<T, F>(self, formatter: F) -> Parser<T>
    where
        F: Fn(Record) -> T + Send + Sync + 'static,
    {
        Parser {
            options: self.options,
            formatter: Arc::new(formatter),
            custom_formatter: true,
        }
    }

    pub fn without_formatter(self) -> Parser<Record> {
        Parser {
            options: self.options,
            formatter: Arc::new(|record| record),
            custom_formatter: false,
        }
    }

    /// Extract the configured table from markup, a parsed document or an element
    pub fn parse_html<'a>(&self, source: impl Into<HtmlSource<'a>>) -> TableResult<Table<R>> {
        self.parse_source(source.into(), "<markup>")
    }

    /// Read a file fully, then extract the configured table from it
    pub fn parse_file(&self, path: impl AsRef<Path>) -> TableResult<Table<R>> {
        let path = path.as_ref();
        let origin = path.display().to_string();
        let bytes = std::fs::read(path).map_err(|e| TableError::source_unreadable(origin.as_str(), e))?;

        self.parse_source(HtmlSource::from(bytes), &origin)
    }

    /// Read an already open stream to its end, then extract the table
    pub fn parse_reader<Rd: Read>(&self, mut reader: Rd) -> TableResult<Table<R>> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| TableError::source_unreadable("<stream>", e))?;

        self.parse_source(HtmlSource::from(bytes), "<stream>")
    }

    fn parse_source(&self, source: HtmlSource<'_>, origin: &str) -> TableResult<Table<R>> {
        let timer = PerformanceTimer::start(format!("table extraction from {}", origin));

        let loaded = document::load(source, origin, self.options.strict)?;
        let html = loaded.html();
        timer.checkpoint("document ready");

        let table = self
            .options
            .query
            .nth(html.tree.root(), 0)
            .ok_or_else(|| TableError::table_not_found(self.options.query.as_str()))?;
        let tag = table.value().name();
        if !tag.eq_ignore_ascii_case("table") {
            return Err(TableError::UnexpectedElement {
                tag: tag.to_string(),
            });
        }
        debug!(query = %self.options.query, "Located table");

        let header = resolve_header(table, &self.header_spec())?;
        let rows = scan_rows(table, &header, &self.options.inclusion);
        let records: Vec<R> = rows
            .into_iter()
            .map(|values| (self.formatter)(format_record(values, &header.names)))
            .collect();

        let caption = table_caption(table).or_else(|| self.options.caption.clone());
        debug!(
            records = records.len(),
            columns = header.names.len(),
            caption = caption.is_some(),
            "Extracted table"
        );

        Ok(Table::new(header.names, records, caption))
    }
}

/// Flat values of every content row of `table`, in document order
fn scan_rows(table: ElementRef<'_>, header: &ResolvedHeader, inclusion: &InclusionSet) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut bare_rows = RowSpanState::new();

    for child in table.children().filter_map(ElementRef::wrap) {
        let tag = child.value().name();
        let section = Section::from_tag(tag);
        if section != Some(Section::Row) {
            bare_rows = RowSpanState::new();
        }

        match section {
            Some(section) if !is_included(tag, inclusion) => trace!(%section, "Section not included"),
            Some(Section::Row) => {
                if Some(child.id()) != header.row {
                    rows.push(extract_row(child, &mut bare_rows));
                }
            }
            Some(container) => {
                let before = rows.len();
                let mut state = RowSpanState::new();
                for row in child.children().filter_map(ElementRef::wrap) {
                    if row.value().name().eq_ignore_ascii_case("tr") && Some(row.id()) != header.row {
                        rows.push(extract_row(row, &mut state));
                    }
                }
                debug!(section = %container, rows = rows.len() - before, "Scanned section");
            }
            None => trace!(tag, "Skipping unrecognized table child"),
        }
    }

    rows
}

/// Trimmed text of the first `<caption>` in the table, if not blank
fn table_caption(table: ElementRef<'_>) -> Option<String> {
    let query = Query::parse(".//caption").ok()?;
    query
        .nth(*table, 0)
        .map(|caption| text_content(caption).trim().to_string())
        .filter(|caption| !caption.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn test_unchanged_settings_keep_the_parser() {
        let parser = Parser::new();

        let same = parser
            .clone()
            .table_position(0)
            .unwrap()
            .table_header_position(Section::Header, 0)
            .unwrap()
            .include_table_footer()
            .table_header(Vec::<String>::new())
            .unwrap()
            .resolve_table_header()
            .ignore_markup_errors()
            .without_formatter();

        assert_eq!(same, parser);
    }

    #[test]
    fn test_same_resolved_expression_is_a_no_op() {
        let parser = Parser::new().table_id("testb").unwrap();
        let again = parser.clone().table_expression(r#"//table[@id="testb"]"#).unwrap();
        assert_eq!(again, parser);
    }

    #[test]
    fn test_settings_change_equality() {
        let parser = Parser::new();
        assert_ne!(parser.clone().ignore_table_header(), parser);
        assert_ne!(parser.clone().exclude_table_footer(), parser);
        assert_ne!(parser.clone().fail_on_markup_errors(), parser);
        assert_ne!(parser.clone().table_caption(Some("c".into())), parser);
    }

    #[test]
    fn test_formatters_compare_by_identity() {
        let formatted = Parser::new().with_formatter(|record: Record| record.len());
        assert_eq!(formatted.clone(), formatted);

        let other = Parser::new().with_formatter(|record: Record| record.len());
        assert_ne!(other, formatted);
        assert_eq!(formatted.without_formatter(), Parser::new());
    }

    #[test]
    fn test_header_spec_priority() {
        let parser = Parser::new();
        assert_eq!(
            parser.header_spec(),
            HeaderSpec::Derived {
                section: Section::Header,
                offset: 0
            }
        );

        let parser = parser.ignore_table_header();
        assert_eq!(parser.header_spec(), HeaderSpec::Suppressed);

        let parser = parser.table_header(["a", "b"]).unwrap();
        assert_eq!(parser.header_spec(), HeaderSpec::Explicit(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_configuration_errors() {
        assert!(matches!(
            Parser::new().table_position(-1),
            Err(TableError::InvalidSelector { .. })
        ));
        assert!(matches!(
            Parser::new().table_id("foo bar"),
            Err(TableError::InvalidSelector { .. })
        ));
        assert!(matches!(
            Parser::new().table_header_position(Section::Header, -1),
            Err(TableError::InvalidOffset { offset: -1 })
        ));
        let error = Parser::new()
            .table_header(["foo", "foo", "toto", "toto", "baz"])
            .unwrap_err();
        assert_eq!(error.duplicate_column_names(), ["foo", "toto"]);
    }

    #[test]
    fn test_parser_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Parser>();
        assert_send_sync::<Parser<usize>>();
    }

    #[test]
    fn test_scan_resets_state_between_sections() {
        let html = Html::parse_document(
            r#"<table>
                <tbody><tr><td rowspan="3">A</td><td>1</td></tr></tbody>
                <tbody><tr><td>2</td></tr></tbody>
            </table>"#,
        );
        let table = Query::parse("//table").unwrap().nth(html.tree.root(), 0).unwrap();
        let rows = scan_rows(table, &ResolvedHeader::default(), &InclusionSet::all());

        assert_eq!(rows, vec![vec!["A", "1"], vec!["2"]]);
    }

    #[test]
    fn test_scan_skips_header_row_and_excluded_sections() {
        let html = Html::parse_document(
            r#"<table>
                <caption>Ignored</caption>
                <tbody><tr><th>h</th></tr><tr><td>b</td></tr></tbody>
                <tfoot><tr><td>f</td></tr></tfoot>
            </table>"#,
        );
        let table = Query::parse("//table").unwrap().nth(html.tree.root(), 0).unwrap();
        let header_row = Query::parse("tbody/tr").unwrap().nth(*table, 0).unwrap();
        let header = ResolvedHeader {
            names: vec!["h".to_string()],
            row: Some(header_row.id()),
        };

        let rows = scan_rows(table, &header, &InclusionSet::all());
        assert_eq!(rows, vec![vec!["b"], vec!["f"]]);

        let rows = scan_rows(table, &header, &InclusionSet::all().without(Section::Footer));
        assert_eq!(rows, vec![vec!["b"]]);
    }

    #[test]
    fn test_scan_never_reads_the_head_section() {
        let html = Html::parse_document(
            "<table><thead><tr><td>h</td></tr></thead><tbody><tr><td>b</td></tr></tbody></table>",
        );
        let table = Query::parse("//table").unwrap().nth(html.tree.root(), 0).unwrap();

        let rows = scan_rows(table, &ResolvedHeader::default(), &InclusionSet::all().with(Section::Header));
        assert_eq!(rows, vec![vec!["b"]]);
    }

    #[test]
    fn test_bare_rows_scan_as_row_section() {
        let parsed = crate::markup::parse_document(
            "<table><tr><td>h1</td><td>h2</td></tr><tr><td>a</td><td>b</td></tr><tr><td>c</td><td>d</td></tr></table>",
            "<markup>",
        );
        let table = Query::parse("//table").unwrap().nth(parsed.html.tree.root(), 0).unwrap();
        let header_row = Query::parse("tr").unwrap().nth(*table, 0).unwrap();
        let header = ResolvedHeader {
            names: vec!["h1".to_string(), "h2".to_string()],
            row: Some(header_row.id()),
        };

        let rows = scan_rows(table, &header, &InclusionSet::all());
        assert_eq!(rows, vec![vec!["a", "b"], vec!["c", "d"]]);

        let rows = scan_rows(table, &header, &InclusionSet::all().without(Section::Body));
        assert_eq!(rows.len(), 2);

        let rows = scan_rows(table, &header, &InclusionSet::all().without(Section::Row));
        assert!(rows.is_empty());
    }

    #[test]
    fn test_caption_is_trimmed() {
        let html = Html::parse_document("<table><caption>  Prenoms 2004 </caption><tr><td>x</td></tr></table>");
        let table = Query::parse("//table").unwrap().nth(html.tree.root(), 0).unwrap();
        assert_eq!(table_caption(table).as_deref(), Some("Prenoms 2004"));

        let html = Html::parse_document("<table><caption> </caption></table>");
        let table = Query::parse("//table").unwrap().nth(html.tree.root(), 0).unwrap();
        assert_eq!(table_caption(table), None);
    }
}
