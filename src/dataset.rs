//! In-memory tabular dataset.
//!
//! A [`Dataset`] is one loaded CSV file: an identifier (the file name) and an
//! ordered list of uniquely named columns of equal length. Cells are
//! `Option<String>`, `None` standing for a missing value.

use std::{
    collections::HashSet,
    fs,
    path::Path,
    sync::OnceLock,
};

use encoding_rs::{Encoding, UTF_8};
use log::debug;

use crate::{
    error::{Result, StewardError},
    io_utils,
    kind::{self, ColumnType},
};

pub type Cell = Option<String>;

/// Tokens read as missing under [`MissingPolicy::Lenient`].
pub const NA_TOKENS: &[&str] = &[
    "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "NULL", "null", "None", "<NA>", "#N/A",
    "#NA",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingPolicy {
    /// Empty fields and the common NA spellings are missing.
    #[default]
    Lenient,
    /// Only empty fields are missing.
    Strict,
}

impl MissingPolicy {
    pub fn to_cell(self, raw: String) -> Cell {
        if raw.is_empty() {
            return None;
        }
        match self {
            MissingPolicy::Lenient if NA_TOKENS.contains(&raw.as_str()) => None,
            _ => Some(raw),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    /// Overrides extension-based delimiter detection.
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
    pub missing: MissingPolicy,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: UTF_8,
            missing: MissingPolicy::Lenient,
        }
    }
}

impl LoadOptions {
    pub fn strict(self) -> Self {
        Self {
            missing: MissingPolicy::Strict,
            ..self
        }
    }
}

#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    cells: Vec<Cell>,
    column_type: OnceLock<ColumnType>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            cells,
            column_type: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Inferred once, then reused.
    pub fn column_type(&self) -> ColumnType {
        *self
            .column_type
            .get_or_init(|| kind::infer_column_type(&self.cells))
    }
}

impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.cells == other.cells
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    id: String,
    columns: Vec<Column>,
    row_count: usize,
}

impl Dataset {
    /// Builds a dataset, rejecting duplicate names and ragged columns.
    pub fn new(id: impl Into<String>, columns: Vec<Column>) -> Result<Self> {
        let id = id.into();
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(StewardError::parse(
                    &id,
                    format!("duplicate column '{}'", column.name),
                ));
            }
        }
        let row_count = columns.first().map(|c| c.cells.len()).unwrap_or(0);
        if let Some(column) = columns.iter().find(|c| c.cells.len() != row_count) {
            return Err(StewardError::parse(
                &id,
                format!(
                    "column '{}' has {} value(s), expected {row_count}",
                    column.name,
                    column.cells.len()
                ),
            ));
        }
        Ok(Self {
            id,
            columns,
            row_count,
        })
    }

    /// Convenience constructor from string columns; empty strings are missing.
    pub fn from_str_columns(id: &str, columns: &[(&str, &[&str])]) -> Result<Self> {
        let columns = columns
            .iter()
            .map(|(name, values)| {
                let cells = values
                    .iter()
                    .map(|v| (!v.is_empty()).then(|| v.to_string()))
                    .collect();
                Column::new(*name, cells)
            })
            .collect();
        Dataset::new(id, columns)
    }

    pub fn load(path: &Path, options: &LoadOptions) -> Result<Self> {
        let id = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| StewardError::parse(path, "path has no UTF-8 file name"))?;
        let delimiter = io_utils::resolve_input_delimiter(path, options.delimiter);
        let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)
            .map_err(|err| StewardError::parse(path, format!("{err:#}")))?;
        let header_record = reader
            .byte_headers()
            .map_err(|err| StewardError::parse(path, err))?
            .clone();
        let headers = io_utils::decode_record(&header_record, options.encoding)
            .map_err(|err| StewardError::parse(path, format!("{err:#}")))?;
        if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
            return Err(StewardError::parse(path, "no header row"));
        }

        let mut columns: Vec<Vec<Cell>> = vec![Vec::new(); headers.len()];
        for (row_idx, record) in reader.byte_records().enumerate() {
            let record = record
                .map_err(|err| StewardError::parse(path, format!("row {}: {err}", row_idx + 2)))?;
            let decoded = io_utils::decode_record(&record, options.encoding).map_err(|err| {
                StewardError::parse(path, format!("row {}: {err:#}", row_idx + 2))
            })?;
            for (idx, raw) in decoded.into_iter().enumerate() {
                columns[idx].push(options.missing.to_cell(raw));
            }
        }

        let columns = headers
            .into_iter()
            .zip(columns)
            .map(|(name, cells)| Column::new(name, cells))
            .collect();
        let dataset = Dataset::new(id, columns).map_err(|err| match err {
            StewardError::ParseFailure { message, .. } => StewardError::parse(path, message),
            other => other,
        })?;
        debug!(
            "Loaded {:?}: {} column(s), {} row(s)",
            path,
            dataset.column_count(),
            dataset.row_count()
        );
        Ok(dataset)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// File name without its extension (`survey.csv` → `survey`).
    pub fn stem(&self) -> &str {
        Path::new(&self.id)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&self.id)
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn cells(&self, name: &str) -> Option<&[Cell]> {
        self.column(name).map(Column::cells)
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.column(name).map(Column::column_type)
    }

    pub fn rename_column(&mut self, old: &str, new: &str) -> Result<()> {
        if self.has_column(new) {
            return Err(StewardError::Conflict {
                column: new.to_string(),
                datasets: vec![self.id.clone()],
            });
        }
        let column = self
            .columns
            .iter_mut()
            .find(|c| c.name == old)
            .ok_or_else(|| StewardError::ColumnMissingInDataset {
                column: old.to_string(),
                dataset: self.id.clone(),
            })?;
        column.name = new.to_string();
        Ok(())
    }

    pub fn drop_column(&mut self, name: &str) -> Result<Column> {
        let position = self
            .columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| StewardError::ColumnMissingInDataset {
                column: name.to_string(),
                dataset: self.id.clone(),
            })?;
        Ok(self.columns.remove(position))
    }

    /// Copy of this dataset with one column's cells replaced.
    pub fn with_replaced_cells(&self, name: &str, cells: Vec<Cell>) -> Result<Self> {
        let mut copy = self.clone();
        let column = copy
            .columns
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| StewardError::ColumnMissingInDataset {
                column: name.to_string(),
                dataset: self.id.clone(),
            })?;
        if cells.len() != self.row_count {
            return Err(StewardError::parse(
                &self.id,
                format!(
                    "replacement for '{name}' has {} value(s), expected {}",
                    cells.len(),
                    self.row_count
                ),
            ));
        }
        *column = Column::new(name, cells);
        Ok(copy)
    }

    pub fn to_csv_bytes(&self, delimiter: u8, encoding: &'static Encoding) -> Result<Vec<u8>> {
        let headers = self.column_names().map(str::to_string).collect::<Vec<_>>();
        let rows = (0..self.row_count).map(|row| {
            self.columns
                .iter()
                .map(move |column| column.cells[row].as_deref().unwrap_or(""))
        });
        io_utils::render_csv_bytes(&self.id, &headers, rows, delimiter, encoding)
    }

    pub fn save(&self, path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<()> {
        let bytes = self.to_csv_bytes(delimiter, encoding)?;
        fs::write(path, bytes).map_err(|err| StewardError::io(path, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::from_str_columns("people.csv", &[("id", &["1", "2"]), ("name", &["Ann", ""])])
            .unwrap()
    }

    #[test]
    fn rename_and_drop_mutate_in_place() {
        let mut ds = sample();
        ds.rename_column("name", "full_name").unwrap();
        assert_eq!(ds.column_names().collect::<Vec<_>>(), vec!["id", "full_name"]);
        let dropped = ds.drop_column("id").unwrap();
        assert_eq!(dropped.name(), "id");
        assert_eq!(ds.column_count(), 1);
        assert_eq!(ds.row_count(), 2);
    }

    #[test]
    fn rename_refuses_existing_target() {
        let mut ds = sample();
        let err = ds.rename_column("id", "name").unwrap_err();
        assert!(matches!(err, StewardError::Conflict { .. }));
        assert!(ds.has_column("id"));
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let err = Dataset::from_str_columns("d.csv", &[("a", &["1"]), ("a", &["2"])]).unwrap_err();
        assert!(matches!(err, StewardError::ParseFailure { .. }));
    }

    #[test]
    fn ragged_columns_are_rejected() {
        let err =
            Dataset::from_str_columns("d.csv", &[("a", &["1", "2"]), ("b", &["2"])]).unwrap_err();
        assert!(matches!(err, StewardError::ParseFailure { .. }));
    }

    #[test]
    fn lenient_policy_maps_na_tokens_to_missing() {
        assert_eq!(MissingPolicy::Lenient.to_cell("NA".into()), None);
        assert_eq!(MissingPolicy::Strict.to_cell("NA".into()), Some("NA".into()));
        assert_eq!(MissingPolicy::Strict.to_cell(String::new()), None);
    }

    #[test]
    fn missing_cells_serialize_as_empty_fields() {
        let bytes = sample().to_csv_bytes(b',', UTF_8).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "id,name\n1,Ann\n2,\n");
    }

    #[test]
    fn unencodable_save_fails_without_creating_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cities.csv");
        let ds = Dataset::from_str_columns("cities.csv", &[("name", &["東京"])]).unwrap();
        let encoding = Encoding::for_label(b"windows-1252").unwrap();

        let err = ds.save(&path, b',', encoding).unwrap_err();
        assert!(matches!(
            err,
            StewardError::RenderFailure { ref target, .. } if target == "cities.csv"
        ));
        assert!(!path.exists());
    }

    #[test]
    fn stem_strips_extension() {
        assert_eq!(sample().stem(), "people");
    }
}
