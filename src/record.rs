use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// One data row of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// Cell values in column order (no header)
    Values(Vec<String>),
    /// Header name to cell value, in header order
    Named(Vec<(String, String)>),
}

impl Record {
    /// Value at a column offset
    pub fn get(&self, offset: usize) -> Option<&str> {
        match self {
            Record::Values(values) => values.get(offset).map(String::as_str),
            Record::Named(pairs) => pairs.get(offset).map(|(_, value)| value.as_str()),
        }
    }

    /// Value of a named column; positional records have no names
    pub fn get_by_name(&self, name: &str) -> Option<&str> {
        match self {
            Record::Values(_) => None,
            Record::Named(pairs) => pairs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Record::Values(values) => values.len(),
            Record::Named(pairs) => pairs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Column names, empty for positional records
    pub fn keys(&self) -> Vec<&str> {
        match self {
            Record::Values(_) => Vec::new(),
            Record::Named(pairs) => pairs.iter().map(|(key, _)| key.as_str()).collect(),
        }
    }

    pub fn values(&self) -> Vec<&str> {
        match self {
            Record::Values(values) => values.iter().map(String::as_str).collect(),
            Record::Named(pairs) => pairs.iter().map(|(_, value)| value.as_str()).collect(),
        }
    }

    pub fn into_values(self) -> Vec<String> {
        match self {
            Record::Values(values) => values,
            Record::Named(pairs) => pairs.into_iter().map(|(_, value)| value).collect(),
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Record::Values(values) => {
                let mut seq = serializer.serialize_seq(Some(values.len()))?;
                for value in values {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
            Record::Named(pairs) => {
                let mut map = serializer.serialize_map(Some(pairs.len()))?;
                for (key, value) in pairs {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

/// Combine a flat row with the resolved header
///
/// Without a header the row stays positional. With one, missing trailing
/// cells become empty strings and surplus cells are dropped.
pub fn format_record(values: Vec<String>, header: &[String]) -> Record {
    if header.is_empty() {
        return Record::Values(values);
    }

    let mut values = values.into_iter();
    Record::Named(
        header
            .iter()
            .map(|name| (name.clone(), values.next().unwrap_or_default()))
            .collect(),
    )
}
