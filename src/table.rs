use serde::Serialize;

use crate::record::Record;

/// Records extracted from one HTML table, with their header and caption
///
/// The table owns its data; it keeps no link to the source document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table<R = Record> {
    header: Vec<String>,
    caption: Option<String>,
    records: Vec<R>,
}

impl<R> Table<R> {
    pub fn new(header: Vec<String>, records: Vec<R>, caption: Option<String>) -> Self {
        Self {
            header,
            caption,
            records,
        }
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn caption(&self) -> Option<&str> {
        self.caption.as_deref()
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn count(&self) -> usize {
        self.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.records.iter()
    }

    /// Record at a zero-based offset
    pub fn nth(&self, offset: usize) -> Option<&R> {
        self.records.get(offset)
    }

    pub fn first(&self) -> Option<&R> {
        self.records.first()
    }

    /// Visit records in order until `f` returns `false`; `true` when every
    /// record was visited
    pub fn each<F>(&self, mut f: F) -> bool
    where
        F: FnMut(&R, usize) -> bool,
    {
        self.records.iter().enumerate().all(|(offset, record)| f(record, offset))
    }

    pub fn exists<F>(&self, mut f: F) -> bool
    where
        F: FnMut(&R, usize) -> bool,
    {
        self.records.iter().enumerate().any(|(offset, record)| f(record, offset))
    }

    pub fn reduce<T, F>(&self, initial: T, f: F) -> T
    where
        F: FnMut(T, &R) -> T,
    {
        self.records.iter().fold(initial, f)
    }

    pub fn map<T, F>(self, f: F) -> Table<T>
    where
        F: FnMut(R) -> T,
    {
        Table {
            header: self.header,
            caption: self.caption,
            records: self.records.into_iter().map(f).collect(),
        }
    }

    pub fn into_records(self) -> Vec<R> {
        self.records
    }
}

impl<R: Clone> Table<R> {
    /// Records accepted by `f`; header and caption are kept
    pub fn filter<F>(&self, mut f: F) -> Self
    where
        F: FnMut(&R) -> bool,
    {
        self.with_records(self.records.iter().filter(|r| f(*r)).cloned().collect())
    }

    /// Up to `length` records starting at `offset` (all remaining when `None`)
    pub fn slice(&self, offset: usize, length: Option<usize>) -> Self {
        let records = self.records.iter().skip(offset);
        let records = match length {
            Some(length) => records.take(length).cloned().collect(),
            None => records.cloned().collect(),
        };
        self.with_records(records)
    }

    pub fn sorted<F>(&self, compare: F) -> Self
    where
        F: FnMut(&R, &R) -> std::cmp::Ordering,
    {
        let mut records = self.records.clone();
        records.sort_by(compare);
        self.with_records(records)
    }

    fn with_records(&self, records: Vec<R>) -> Self {
        Self {
            header: self.header.clone(),
            caption: self.caption.clone(),
            records,
        }
    }
}

impl Table<Record> {
    /// Values of a named column; empty when the name is not in the header
    pub fn fetch_column_by_name(&self, name: &str) -> Vec<&str> {
        match self.header.iter().position(|column| column == name) {
            Some(offset) => self.fetch_column_by_offset(offset),
            None => Vec::new(),
        }
    }

    /// Values at a column offset; records too short for it are skipped
    pub fn fetch_column_by_offset(&self, offset: usize) -> Vec<&str> {
        self.records.iter().filter_map(|record| record.get(offset)).collect()
    }

    /// `(key, value)` pairs taken from two column offsets; a missing value
    /// column yields `None`
    pub fn fetch_pairs(&self, key_offset: usize, value_offset: usize) -> Vec<(&str, Option<&str>)> {
        self.records
            .iter()
            .filter_map(|record| Some((record.get(key_offset)?, record.get(value_offset))))
            .collect()
    }
}

impl<R> IntoIterator for Table<R> {
    type Item = R;
    type IntoIter = std::vec::IntoIter<R>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a, R> IntoIterator for &'a Table<R> {
    type Item = &'a R;
    type IntoIter = std::slice::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
