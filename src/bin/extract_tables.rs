use std::io::{self, Write};
use std::path::PathBuf;
use clap::{Parser as ClapParser, ValueEnum};
use anyhow::{Context, Result};
use tracing::debug;

use html_tables::config::ExtractorConfig;
use html_tables::logging::{init_logging, LoggingConfig};
use html_tables::{Parser, Section, Table};

#[derive(ClapParser)]
#[command(name = "extract_tables")]
#[command(about = "Extract one table from an HTML document as CSV, TSV, Markdown or JSON")]
struct Cli {
    /// Input HTML file, or `-` for stdin
    input: String,

    /// Zero-based position of the table in the document
    #[arg(short, long, conflicts_with_all = ["id", "expression"])]
    table: Option<i64>,

    /// Id attribute of the table
    #[arg(long, conflicts_with = "expression")]
    id: Option<String>,

    /// Path expression locating the table, e.g. `//div[@id="main"]/table`
    #[arg(long)]
    expression: Option<String>,

    /// Comma separated column names to use instead of the table's header
    #[arg(long, value_delimiter = ',', conflicts_with = "no_header")]
    header: Vec<String>,

    /// Treat every row as data
    #[arg(long)]
    no_header: bool,

    /// Section holding the header row: thead, tbody, tfoot or tr
    #[arg(long)]
    header_section: Option<Section>,

    /// Row offset of the header within its section
    #[arg(long, allow_negative_numbers = true)]
    header_offset: Option<i64>,

    /// Sections to leave out of the records (repeatable)
    #[arg(long)]
    exclude: Vec<Section>,

    /// Caption to report when the table has none
    #[arg(long)]
    caption: Option<String>,

    /// Fail on HTML parse errors
    #[arg(long)]
    strict: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML configuration applied before the flags
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Csv,
    Tsv,
    Markdown,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _guard = init_logging(&LoggingConfig {
        level: cli.log_level.clone(),
        ..LoggingConfig::default()
    })?;

    let parser = build_parser(&cli)?;
    debug!(query = %parser.query(), "Parser ready");

    let table = if cli.input == "-" {
        parser.parse_reader(io::stdin().lock())
    } else {
        parser.parse_file(&cli.input)
    }
    .with_context(|| format!("Failed to extract a table from {}", cli.input))?;

    let mut buffer = Vec::new();
    match cli.format {
        OutputFormat::Csv => write_delimited(&mut buffer, &table, b',')?,
        OutputFormat::Tsv => write_delimited(&mut buffer, &table, b'\t')?,
        OutputFormat::Markdown => buffer.extend_from_slice(table_to_markdown(&table).as_bytes()),
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut buffer, &table)?;
            buffer.push(b'\n');
        }
    }

    match &cli.output {
        Some(path) => {
            std::fs::write(path, &buffer)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        None => io::stdout().lock().write_all(&buffer)?,
    }

    eprintln!(
        "Extracted {} records ({} columns){}",
        table.len(),
        table.header().len(),
        table.caption().map(|c| format!(" from \"{}\"", c)).unwrap_or_default()
    );

    Ok(())
}

/// Config file (or `HTML_TABLES_*` variables) first, then the flags
fn build_parser(cli: &Cli) -> Result<Parser> {
    let config = match &cli.config {
        Some(path) => ExtractorConfig::load_from_file(path)?.with_env_overrides(),
        None => ExtractorConfig::load_from_env(),
    };
    let mut parser = config.to_parser()?;

    if let Some(position) = cli.table {
        parser = parser.table_position(position)?;
    }
    if let Some(id) = &cli.id {
        parser = parser.table_id(id)?;
    }
    if let Some(expression) = &cli.expression {
        parser = parser.table_expression(expression)?;
    }

    if !cli.header.is_empty() {
        let names: Vec<&str> = cli.header.iter().map(|name| name.trim()).collect();
        parser = parser.table_header(names)?;
    }
    if cli.no_header {
        parser = parser.ignore_table_header();
    }
    if cli.header_section.is_some() || cli.header_offset.is_some() {
        let section = cli.header_section.unwrap_or(Section::Header);
        parser = parser.table_header_position(section, cli.header_offset.unwrap_or(0))?;
    }

    for section in &cli.exclude {
        parser = parser.exclude_section(*section);
    }
    if cli.caption.is_some() {
        parser = parser.table_caption(cli.caption.clone());
    }
    if cli.strict {
        parser = parser.fail_on_markup_errors();
    }

    Ok(parser)
}

fn write_delimited<W: Write>(writer: W, table: &Table, delimiter: u8) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_writer(writer);

    if !table.header().is_empty() {
        writer.write_record(table.header())?;
    }
    for record in table {
        writer.write_record(record.values())?;
    }

    writer.flush()?;
    Ok(())
}

fn table_to_markdown(table: &Table) -> String {
    let mut md_content = String::new();

    if let Some(caption) = table.caption() {
        md_content.push_str(&format!("## {}\n\n", caption));
    }

    let max_cols = table
        .header()
        .len()
        .max(table.iter().map(|record| record.len()).max().unwrap_or(0));
    if max_cols == 0 {
        md_content.push_str("*No data available*\n");
        return md_content;
    }

    // Markdown needs a header row; positional tables get numbered columns
    let headers: Vec<String> = if table.header().is_empty() {
        (1..=max_cols).map(|i| i.to_string()).collect()
    } else {
        table.header().iter().map(|h| escape_markdown_cell(h)).collect()
    };
    let rows: Vec<Vec<String>> = table
        .iter()
        .map(|record| record.values().into_iter().map(escape_markdown_cell).collect())
        .collect();

    let mut col_widths = vec![3; max_cols];
    for row in std::iter::once(&headers).chain(rows.iter()) {
        for (i, cell) in row.iter().enumerate() {
            col_widths[i] = col_widths[i].max(cell.chars().count());
        }
    }

    let format_row = |cells: &[String]| -> String {
        let formatted: Vec<String> = (0..max_cols)
            .map(|i| {
                let cell = cells.get(i).map(|s| s.as_str()).unwrap_or("");
                format!(" {:<width$} ", cell, width = col_widths[i])
            })
            .collect();
        format!("|{}|\n", formatted.join("|"))
    };

    md_content.push_str(&format_row(&headers));
    let separator_cells: Vec<String> = col_widths.iter().map(|&width| "-".repeat(width + 2)).collect();
    md_content.push_str(&format!("|{}|\n", separator_cells.join("|")));
    for row in &rows {
        md_content.push_str(&format_row(row));
    }

    md_content
}

fn escape_markdown_cell(cell: &str) -> String {
    cell.split_whitespace().collect::<Vec<_>>().join(" ").replace('|', "\\|")
}
