use std::fmt;
use thiserror::Error;

/// A diagnostic recorded by the HTML parser while building the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    /// Where the markup came from (`<markup>`, `<stream>` or a file path)
    pub origin: String,
    /// html5ever does not report positions, so this is usually absent
    pub line: Option<usize>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(
                f,
                "html parse error: {} in {} at line {}",
                self.message, self.origin, line
            ),
            None => write!(f, "html parse error: {} in {}", self.message, self.origin),
        }
    }
}

/// Main error type for HTML table extraction
#[derive(Error, Debug)]
pub enum TableError {
    #[error("Invalid table selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("The table header row offset must be a positive integer or 0, got {offset}.")]
    InvalidOffset { offset: i64 },

    #[error("The header record contains duplicate column names: `{}`.", names.join("`, `"))]
    DuplicateHeaderNames { names: Vec<String> },

    #[error("The header record contains a non string column name at position {position} ({found}).")]
    InvalidHeaderType { position: usize, found: String },

    #[error("The HTML table could not be found in the submitted html (query: {query}).")]
    TableNotFound { query: String },

    #[error("The selected element is a `<{tag}>`, not a `<table>`.")]
    UnexpectedElement { tag: String },

    #[error("{}", render_diagnostics(diagnostics))]
    MalformedMarkup { diagnostics: Vec<Diagnostic> },

    #[error("`{path}`: the source could not be read")]
    SourceUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

impl TableError {
    /// Create an invalid selector error
    pub fn invalid_selector(selector: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.into(),
            reason: reason.into(),
        }
    }

    /// Create a duplicate header error, collecting the names that occur more
    /// than once in first-seen order
    pub fn duplicate_header_names<S: AsRef<str>>(header: &[S]) -> Self {
        let mut names: Vec<String> = Vec::new();
        for (index, name) in header.iter().enumerate() {
            let name = name.as_ref();
            let repeated = header[..index].iter().any(|seen| seen.as_ref() == name);
            if repeated && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }

        Self::DuplicateHeaderNames { names }
    }

    /// Create an invalid header type error
    pub fn invalid_header_type(position: usize, found: impl Into<String>) -> Self {
        Self::InvalidHeaderType {
            position,
            found: found.into(),
        }
    }

    pub fn table_not_found(query: impl Into<String>) -> Self {
        Self::TableNotFound {
            query: query.into(),
        }
    }

    /// Create a source I/O error
    pub fn source_unreadable(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::SourceUnreadable {
            path: path.into(),
            source,
        }
    }

    /// Column names reported by a `DuplicateHeaderNames` error, empty otherwise
    pub fn duplicate_column_names(&self) -> &[String] {
        match self {
            TableError::DuplicateHeaderNames { names } => names,
            _ => &[],
        }
    }

    /// Check if the same input may succeed with different settings
    pub fn is_recoverable(&self) -> bool {
        match self {
            TableError::TableNotFound { .. } => true,
            TableError::UnexpectedElement { .. } => true,
            TableError::MalformedMarkup { .. } => true,
            TableError::SourceUnreadable { .. } => false,
            _ => false,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            TableError::TableNotFound { .. } => {
                "No matching table. Try another --table position, --id or --expression.".to_string()
            }
            TableError::MalformedMarkup { diagnostics } => format!(
                "The document has {} markup error(s). Drop --strict to parse it anyway.",
                diagnostics.len()
            ),
            TableError::SourceUnreadable { path, .. } => {
                format!("Could not read `{}`. Check the path and its permissions.", path)
            }
            other => other.to_string(),
        }
    }
}

/// Result type alias for convenience
pub type TableResult<T> = Result<T, TableError>;
