//! Per-column profile export.
//!
//! One row per registry column, sorted by name: where it lives, which types it
//! takes, its mean when every observation is numeric, its distinct count and a
//! sample of its values.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
};

use encoding_rs::Encoding;
use itertools::Itertools;
use log::info;

use crate::{
    error::{Result, StewardError},
    io_utils,
    kind::{self, ColumnType, ValueKind},
    session::Session,
};

pub const SUMMARY_HEADERS: [&str; 7] = [
    "Name",
    "N_Files",
    "Files",
    "Dtype",
    "Mean",
    "CountUnique",
    "Values",
];

/// Numeric columns list this many of their smallest distinct values.
pub const NUMERIC_SAMPLE: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnProfile {
    pub name: String,
    pub files: Vec<String>,
    pub types: BTreeSet<ColumnType>,
    pub mean: Option<f64>,
    pub unique: usize,
    pub values: Vec<String>,
}

impl ColumnProfile {
    pub fn to_record(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.files.len().to_string(),
            self.files.join(","),
            self.types.iter().map(|t| t.as_str()).join(","),
            self.mean.map(|m| format!("{m:.3}")).unwrap_or_default(),
            self.unique.to_string(),
            self.values.join(","),
        ]
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

pub fn profile_columns(session: &Session) -> Vec<ColumnProfile> {
    let registry = session.registry();
    let mut names = registry.columns().into_iter().map(|(name, _)| name).collect::<Vec<_>>();
    names.sort_unstable();

    names
        .into_iter()
        .map(|name| {
            let files = registry.locations(name).iter().cloned().collect::<Vec<_>>();
            let columns = files
                .iter()
                .filter_map(|id| session.dataset(id).and_then(|ds| ds.column(name)))
                .collect::<Vec<_>>();
            let types = columns
                .iter()
                .map(|c| c.column_type())
                .collect::<BTreeSet<_>>();
            let kinds = columns
                .iter()
                .flat_map(|c| c.cells().iter().map(kind::classify))
                .collect::<BTreeSet<_>>();
            let numeric = kinds.contains(&ValueKind::Numeric) && !kinds.contains(&ValueKind::Text);

            let present = columns.iter().flat_map(|c| c.cells().iter().flatten());
            let (mean, unique, values) = if numeric {
                let mut distinct = BTreeMap::new();
                let (mut sum, mut count) = (0.0, 0usize);
                for value in present.filter_map(|raw| kind::parse_number(raw)) {
                    sum += value;
                    count += 1;
                    let normalized = if value == 0.0 { 0.0 } else { value };
                    distinct.insert(normalized.to_bits(), normalized);
                }
                let mut sorted = distinct.into_values().collect::<Vec<_>>();
                sorted.sort_by(f64::total_cmp);
                let sample = sorted
                    .iter()
                    .take(NUMERIC_SAMPLE)
                    .map(|v| format_number(*v))
                    .collect::<Vec<_>>();
                ((count > 0).then(|| sum / count as f64), sorted.len(), sample)
            } else {
                let distinct = present.map(String::as_str).collect::<BTreeSet<_>>();
                let values = distinct.iter().map(|v| v.to_string()).collect::<Vec<_>>();
                (None, values.len(), values)
            };

            ColumnProfile {
                name: name.to_string(),
                files,
                types,
                mean,
                unique,
                values,
            }
        })
        .collect()
}

/// Writes the profile CSV to `path`; returns the number of columns written.
pub fn export(session: &Session, path: &Path, encoding: &'static Encoding) -> Result<usize> {
    let profiles = profile_columns(session);
    let headers = SUMMARY_HEADERS.map(str::to_string).to_vec();
    let rows = profiles.iter().map(ColumnProfile::to_record);
    let target = path.display().to_string();
    let bytes = io_utils::render_csv_bytes(&target, &headers, rows, b',', encoding)?;
    fs::write(path, bytes).map_err(|err| StewardError::io(path, err))?;
    info!("Wrote {} column profile(s) to {path:?}", profiles.len());
    Ok(profiles.len())
}
