use serde::{Deserialize, Serialize};
use std::path::Path;
use anyhow::{Result, anyhow};
use tracing::warn;

use crate::error::{TableError, TableResult};
use crate::parser::Parser;
use crate::section::Section;
use crate::selector::TableSelector;

/// Extraction settings stored as TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub table: TableConfig,
    pub header: HeaderConfig,
    pub parsing: ParsingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Zero-based table position
    pub position: Option<i64>,

    /// Table id attribute; takes precedence over `position`
    pub id: Option<String>,

    /// Raw path expression; takes precedence over `id` and `position`
    pub expression: Option<String>,

    /// Caption used when the table has none
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderConfig {
    /// Explicit column names; kept untyped so bad entries can be reported
    pub names: Vec<toml::Value>,

    /// Treat every row as data
    pub ignore: bool,

    /// Section holding the header row
    pub section: Section,

    /// Row offset within `section`
    pub offset: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsingConfig {
    /// Fail on markup errors instead of logging them
    pub strict: bool,

    /// Sections scanned for records
    pub include: Vec<Section>,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            names: Vec::new(),
            ignore: false,
            section: Section::Header,
            offset: 0,
        }
    }
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            strict: false,
            include: vec![Section::Body, Section::Footer, Section::Row],
        }
    }
}

impl ExtractorConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path.as_ref().display(), e))?;

        let config: ExtractorConfig = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file: {}", e))?;

        Ok(config)
    }

    pub fn load_from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Override settings from `HTML_TABLES_*` environment variables
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(position) = std::env::var("HTML_TABLES_POSITION") {
            match position.trim().parse::<i64>() {
                Ok(value) => self.table.position = Some(value),
                Err(_) => warn!("Ignoring HTML_TABLES_POSITION={:?}", position),
            }
        }

        if let Ok(id) = std::env::var("HTML_TABLES_ID") {
            if !id.is_empty() {
                self.table.id = Some(id);
            }
        }

        if let Ok(strict) = std::env::var("HTML_TABLES_STRICT") {
            self.parsing.strict = is_truthy(&strict);
        }

        if let Ok(ignore) = std::env::var("HTML_TABLES_IGNORE_HEADER") {
            self.header.ignore = is_truthy(&ignore);
        }

        self
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| anyhow!("Failed to write config file: {}", e))?;

        Ok(())
    }

    /// The table selector in effect: expression, then id, then position
    pub fn selector(&self) -> TableSelector {
        if let Some(expression) = &self.table.expression {
            TableSelector::Expression(expression.clone())
        } else if let Some(id) = &self.table.id {
            TableSelector::Id(id.clone())
        } else {
            TableSelector::Position(self.table.position.unwrap_or(0))
        }
    }

    /// Header names as strings; any other TOML type is rejected
    pub fn header_names(&self) -> TableResult<Vec<String>> {
        self.header
            .names
            .iter()
            .enumerate()
            .map(|(position, value)| match value {
                toml::Value::String(name) => Ok(name.clone()),
                other => Err(TableError::invalid_header_type(position, other.type_str())),
            })
            .collect()
    }

    pub fn to_parser(&self) -> TableResult<Parser> {
        let mut parser = Parser::new()
            .table_selector(self.selector())?
            .table_header(self.header_names()?)?
            .table_header_position(self.header.section, self.header.offset)?
            .table_caption(self.table.caption.clone());

        if self.header.ignore {
            parser = parser.ignore_table_header();
        }

        for section in [Section::Body, Section::Footer, Section::Row] {
            if !self.parsing.include.contains(&section) {
                parser = parser.exclude_section(section);
            }
        }

        if self.parsing.strict {
            parser = parser.fail_on_markup_errors();
        }

        Ok(parser)
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use std::fs;

    #[test]
    fn test_default_config() {
        let config = ExtractorConfig::default();
        assert_eq!(config.header.section, Section::Header);
        assert!(!config.parsing.strict);
        assert_eq!(config.to_parser().unwrap(), Parser::new());
    }

    #[test]
    fn test_config_serialization() {
        let mut config = ExtractorConfig::default();
        config.table.id = Some("testb".to_string());
        config.header.names = vec!["a".into(), "b".into()];
        config.parsing.include = vec![Section::Body];

        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        config.save_to_file(&config_path).unwrap();

        let loaded_config = ExtractorConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded_config, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
[table]
position = 1

[header]
section = "tbody"
"#,
        )
        .unwrap();

        let config = ExtractorConfig::load_from_file(&config_path).unwrap();
        assert_eq!(config.table.position, Some(1));
        assert_eq!(config.header.section, Section::Body);
        assert_eq!(config.parsing, ParsingConfig::default());

        let parser = config.to_parser().unwrap();
        assert_eq!(parser.query().as_str(), "(//table)[2]");
    }

    #[test]
    fn test_selector_precedence() {
        let mut config = ExtractorConfig::default();
        config.table.position = Some(3);
        config.table.id = Some("prices".to_string());
        assert_eq!(config.selector(), TableSelector::Id("prices".to_string()));

        config.table.expression = Some("//div/table".to_string());
        assert_eq!(config.selector(), TableSelector::Expression("//div/table".to_string()));
    }

    #[test]
    fn test_non_string_header_name_is_rejected() {
        let config: ExtractorConfig = toml::from_str(
            r#"
[header]
names = ["name", 42, "count"]
"#,
        )
        .unwrap();

        match config.to_parser() {
            Err(TableError::InvalidHeaderType { position, found }) => {
                assert_eq!(position, 1);
                assert_eq!(found, "integer");
            }
            other => panic!("expected InvalidHeaderType, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_values_surface_parser_errors() {
        let mut config = ExtractorConfig::default();
        config.header.offset = -2;
        assert!(matches!(config.to_parser(), Err(TableError::InvalidOffset { offset: -2 })));

        let mut config = ExtractorConfig::default();
        config.table.position = Some(-1);
        assert!(matches!(config.to_parser(), Err(TableError::InvalidSelector { .. })));
    }

    #[test]
    fn test_to_parser_applies_sections_and_flags() {
        let mut config = ExtractorConfig::default();
        config.parsing.include = vec![Section::Body];
        config.parsing.strict = true;
        config.header.ignore = true;

        let parser = config.to_parser().unwrap();
        assert!(parser.is_strict());
        assert!(!parser.inclusion().contains(Section::Footer));
        assert!(!parser.inclusion().contains(Section::Row));
        assert!(parser.inclusion().contains(Section::Body));
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("HTML_TABLES_ID", "testb");
        std::env::set_var("HTML_TABLES_STRICT", "yes");
        std::env::set_var("HTML_TABLES_POSITION", "not a number");

        let config = ExtractorConfig::load_from_env();

        std::env::remove_var("HTML_TABLES_ID");
        std::env::remove_var("HTML_TABLES_STRICT");
        std::env::remove_var("HTML_TABLES_POSITION");

        assert_eq!(config.table.id.as_deref(), Some("testb"));
        assert_eq!(config.table.position, None);
        assert!(config.parsing.strict);
        assert!(!config.header.ignore);
    }
}
