use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{TableError, TableResult};
use crate::query::Query;

/// A table sub-container, or bare rows directly under `<table>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Section {
    #[serde(rename = "thead")]
    Header,
    #[serde(rename = "tbody")]
    Body,
    #[serde(rename = "tfoot")]
    Footer,
    #[serde(rename = "tr")]
    Row,
}

impl Section {
    /// Classify a direct child tag of `<table>`
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "thead" => Some(Section::Header),
            "tbody" => Some(Section::Body),
            "tfoot" => Some(Section::Footer),
            "tr" => Some(Section::Row),
            _ => None,
        }
    }

    /// Canonical container tag, `None` for bare rows
    pub fn tag_name(&self) -> Option<&'static str> {
        match self {
            Section::Header => Some("thead"),
            Section::Body => Some("tbody"),
            Section::Footer => Some("tfoot"),
            Section::Row => None,
        }
    }

    /// Query, relative to the table, matching the rows of this section
    ///
    /// The (offset+1)-th match is the row at `offset`; matches run across
    /// every container of the section in document order.
    pub fn row_query(&self, offset: i64) -> TableResult<(Query, usize)> {
        if offset < 0 {
            return Err(TableError::InvalidOffset { offset });
        }

        let expression = match self.tag_name() {
            Some(tag) => format!("{}/tr", tag),
            None => "tr".to_string(),
        };

        Ok((Query::parse(&expression)?, offset as usize))
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag_name().unwrap_or("tr"))
    }
}

impl FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "thead" | "header" => Ok(Section::Header),
            "tbody" | "body" => Ok(Section::Body),
            "tfoot" | "footer" => Ok(Section::Footer),
            "tr" | "row" | "none" => Ok(Section::Row),
            other => Err(format!("unknown table section `{}` (thead, tbody, tfoot or tr)", other)),
        }
    }
}

/// Sections walked for data rows; the header section is never part of it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InclusionSet {
    body: bool,
    footer: bool,
    row: bool,
}

impl InclusionSet {
    pub fn all() -> Self {
        Self {
            body: true,
            footer: true,
            row: true,
        }
    }

    pub fn none() -> Self {
        Self {
            body: false,
            footer: false,
            row: false,
        }
    }

    pub fn contains(&self, section: Section) -> bool {
        match section {
            Section::Header => false,
            Section::Body => self.body,
            Section::Footer => self.footer,
            Section::Row => self.row,
        }
    }

    /// Returns a set with `section` added; adding `Header` has no effect
    pub fn with(mut self, section: Section) -> Self {
        match section {
            Section::Header => {}
            Section::Body => self.body = true,
            Section::Footer => self.footer = true,
            Section::Row => self.row = true,
        }
        self
    }

    pub fn without(mut self, section: Section) -> Self {
        match section {
            Section::Header => {}
            Section::Body => self.body = false,
            Section::Footer => self.footer = false,
            Section::Row => self.row = false,
        }
        self
    }

    pub fn sections(&self) -> Vec<Section> {
        [Section::Body, Section::Footer, Section::Row]
            .into_iter()
            .filter(|section| self.contains(*section))
            .collect()
    }
}

impl Default for InclusionSet {
    fn default() -> Self {
        Self::all()
    }
}

impl FromIterator<Section> for InclusionSet {
    fn from_iter<I: IntoIterator<Item = Section>>(iter: I) -> Self {
        iter.into_iter().fold(Self::none(), InclusionSet::with)
    }
}

/// Whether rows under a `tag` child of the table are scanned for records
pub fn is_included(tag: &str, inclusion: &InclusionSet) -> bool {
    Section::from_tag(tag).is_some_and(|section| inclusion.contains(section))
}
