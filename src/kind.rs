//! Value classification.
//!
//! Cells are classified once into a [`ValueKind`]; a column's cells fold into a
//! single [`ColumnType`] that the comparison engine and the summary export
//! share.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dataset::Cell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueKind {
    Missing,
    Numeric,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Every cell is missing.
    Empty,
    Integer,
    Float,
    Text,
}

impl ColumnType {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::Empty => "empty",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Text => "text",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a trimmed cell as a finite or infinite float; `NaN` spellings are
/// not numbers here because they are treated as missing on load.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<f64>() {
        Ok(value) if !value.is_nan() => Some(value),
        _ => None,
    }
}

pub fn classify(cell: &Cell) -> ValueKind {
    match cell {
        None => ValueKind::Missing,
        Some(raw) if parse_number(raw).is_some() => ValueKind::Numeric,
        Some(_) => ValueKind::Text,
    }
}

#[derive(Debug, Clone)]
struct TypeCandidate {
    seen_value: bool,
    possible_integer: bool,
    possible_float: bool,
}

impl TypeCandidate {
    fn new() -> Self {
        Self {
            seen_value: false,
            possible_integer: true,
            possible_float: true,
        }
    }

    fn observe(&mut self, raw: &str) {
        self.seen_value = true;
        let trimmed = raw.trim();
        if self.possible_integer && trimmed.parse::<i64>().is_err() {
            self.possible_integer = false;
        }
        if self.possible_float && parse_number(trimmed).is_none() {
            self.possible_float = false;
        }
    }

    fn decide(&self) -> ColumnType {
        if !self.seen_value {
            ColumnType::Empty
        } else if self.possible_integer {
            ColumnType::Integer
        } else if self.possible_float {
            ColumnType::Float
        } else {
            ColumnType::Text
        }
    }
}

/// Folds every present cell of a column into one type.
pub fn infer_column_type(cells: &[Cell]) -> ColumnType {
    let mut candidate = TypeCandidate::new();
    for raw in cells.iter().flatten() {
        candidate.observe(raw);
        if !candidate.possible_float {
            break;
        }
    }
    candidate.decide()
}

/// Mean over the numeric cells, skipping missing ones.
pub fn numeric_mean(cells: &[Cell]) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for value in cells.iter().flatten().filter_map(|raw| parse_number(raw)) {
        sum += value;
        count += 1;
    }
    (count > 0).then(|| sum / count as f64)
}

/// Bucket key used for distinct counting. Numeric columns bucket by value so
/// `1` and `1.0` coincide; `-0.0` folds into `0.0`.
pub fn bucket_key(raw: &str, column_type: ColumnType) -> String {
    if column_type.is_numeric()
        && let Some(value) = parse_number(raw)
    {
        let normalized = if value == 0.0 { 0.0 } else { value };
        return format!("n:{:x}", normalized.to_bits());
    }
    format!("s:{raw}")
}
