//! Data model shared by every pipeline stage.
//!
//! A document becomes a [`StructuredResult`]: one [`PageRecord`] per page,
//! ordered by page number. Each page carries its text and zero or more
//! [`Table`]s; a table is an ordered list of [`TableRow`]s, and a row maps
//! column labels to text cells.
//!
//! Column order matters for the CSV encoding (the header is the union of
//! labels in first-seen order), so [`TableRow`] keeps its cells in insertion
//! order instead of using a hash or B-tree map. `"10"` must not sort before
//! `"2"`.

use crate::error::ExtractError;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Page-ordered extraction result for a whole document.
pub type StructuredResult = Vec<PageRecord>;

/// One page of the source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    /// 1-indexed page number.
    pub page: usize,
    /// Extracted text; empty string when the page has none.
    pub text: String,
    /// Tables found on the page, in reading order.
    pub tables: Vec<Table>,
}

impl PageRecord {
    pub fn new(page: usize, text: impl Into<String>) -> Self {
        Self {
            page,
            text: text.into(),
            tables: Vec::new(),
        }
    }

    pub fn with_table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }
}

/// A table is an ordered sequence of rows.
pub type Table = Vec<TableRow>;

/// One table row: column label → cell text, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRow {
    cells: Vec<(String, String)>,
}

impl TableRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from positional cells, labelling columns `"0"`, `"1"`, ….
    pub fn from_positional<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cells: cells
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v.into()))
                .collect(),
        }
    }

    /// Set a cell, replacing an existing value for the same label in place.
    pub fn insert(&mut self, label: impl Into<String>, value: impl Into<String>) {
        let label = label.into();
        let value = value.into();
        match self.cells.iter_mut().find(|(l, _)| *l == label) {
            Some(cell) => cell.1 = value,
            None => self.cells.push((label, value)),
        }
    }

    pub fn with(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(label, value);
        self
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }

    /// Column labels in order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(l, _)| l.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl Serialize for TableRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (label, value) in &self.cells {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TableRow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RowVisitor;

        impl<'de> Visitor<'de> for RowVisitor {
            type Value = TableRow;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of column label to cell text")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<TableRow, A::Error> {
                let mut row = TableRow::new();
                while let Some((label, value)) = access.next_entry::<String, String>()? {
                    row.insert(label, value);
                }
                Ok(row)
            }
        }

        deserializer.deserialize_map(RowVisitor)
    }
}

// ── Output formats ───────────────────────────────────────────────────────

/// The closed set of artifact encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One record per page: `{page, text, tables}`. (default)
    #[default]
    Json,
    /// Every table row from every page in a single row set.
    Csv,
    /// Page-delimited plain text.
    Txt,
}

impl OutputFormat {
    /// File extension used for the staged artifact.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Txt => "txt",
        }
    }

    /// `Content-Type` for the delivered artifact.
    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Json => "application/json",
            OutputFormat::Csv => "text/csv",
            OutputFormat::Txt => "text/plain",
        }
    }

    /// Parse an optional request parameter; absent means [`OutputFormat::Json`].
    pub fn from_param(param: Option<&str>) -> Result<Self, ExtractError> {
        match param {
            None => Ok(OutputFormat::default()),
            Some(s) => s.parse(),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            "txt" => Ok(OutputFormat::Txt),
            _ => Err(ExtractError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_keeps_column_order() {
        let row = TableRow::from_positional((0..12).map(|i| format!("c{i}")));
        let labels: Vec<&str> = row.labels().collect();
        assert_eq!(labels[2], "2");
        assert_eq!(labels[10], "10");
        let json = serde_json::to_string(&row).unwrap();
        assert!(json.find("\"2\"").unwrap() < json.find("\"10\"").unwrap());
    }

    #[test]
    fn row_insert_replaces_in_place() {
        let mut row = TableRow::new().with("a", "1").with("b", "2");
        row.insert("a", "3");
        assert_eq!(row.get("a"), Some("3"));
        assert_eq!(row.labels().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn row_deserializes_from_json_object() {
        let row: TableRow = serde_json::from_str(r#"{"name":"Ada","year":"1843"}"#).unwrap();
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("year"), Some("1843"));
    }

    #[test]
    fn format_parsing() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!(" txt ".parse::<OutputFormat>().unwrap(), OutputFormat::Txt);
        assert!(matches!(
            "xml".parse::<OutputFormat>(),
            Err(ExtractError::UnsupportedFormat(f)) if f == "xml"
        ));
        assert_eq!(OutputFormat::from_param(None).unwrap(), OutputFormat::Json);
    }

    #[test]
    fn format_media_types() {
        assert_eq!(OutputFormat::Json.content_type(), "application/json");
        assert_eq!(OutputFormat::Csv.content_type(), "text/csv");
        assert_eq!(OutputFormat::Txt.content_type(), "text/plain");
        assert_eq!(OutputFormat::Csv.to_string(), "csv");
    }
}
