//! Folder comparison engine.
//!
//! Two folders are compared file by file: files present on one side only are
//! listed in the summary, and every shared file gets a list of typed
//! [`Difference`] records. Each file pair is compared independently, possibly
//! on a rayon pool; results are collected in shared-file order and merged
//! into the [`ComparisonReport`] afterwards.

use std::{
    collections::{BTreeSet, HashSet},
    path::Path,
};

use log::{debug, info, warn};
use rayon::{ThreadPoolBuilder, prelude::*};
use serde::Serialize;

use crate::{
    dataset::{Column, Dataset, LoadOptions},
    error::{Result, StewardError},
    io_utils,
    kind::{self, ColumnType},
};

/// Means closer than this are considered equal.
pub const MEAN_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    A,
    B,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Difference {
    ColumnsOnlyInA { columns: Vec<String> },
    ColumnsOnlyInB { columns: Vec<String> },
    RowCountMismatch { a: usize, b: usize },
    DtypeMismatch { column: String, a: ColumnType, b: ColumnType },
    MeanMismatch { column: String, a: f64, b: f64 },
    UniqueCountMismatch { column: String, a: usize, b: usize },
}

/// Report sub-block a difference belongs to, in rendering order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Block {
    Columns,
    Rows,
    Dtype,
    Means,
    Uniques,
}

impl Difference {
    pub fn block(&self) -> Block {
        match self {
            Difference::ColumnsOnlyInA { .. } | Difference::ColumnsOnlyInB { .. } => Block::Columns,
            Difference::RowCountMismatch { .. } => Block::Rows,
            Difference::DtypeMismatch { .. } => Block::Dtype,
            Difference::MeanMismatch { .. } => Block::Means,
            Difference::UniqueCountMismatch { .. } => Block::Uniques,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Compared { differences: Vec<Difference> },
    ReadError { side: Side, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileComparison {
    pub file: String,
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

impl FileComparison {
    pub fn has_findings(&self) -> bool {
        match &self.outcome {
            FileOutcome::Compared { differences } => !differences.is_empty(),
            FileOutcome::ReadError { .. } => true,
        }
    }

    pub fn differences(&self) -> &[Difference] {
        match &self.outcome {
            FileOutcome::Compared { differences } => differences,
            FileOutcome::ReadError { .. } => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub source_a: String,
    pub source_b: String,
    pub shared: Vec<String>,
    pub only_in_a: Vec<String>,
    pub only_in_b: Vec<String>,
    pub files: Vec<FileComparison>,
}

impl ComparisonReport {
    pub fn file(&self, name: &str) -> Option<&FileComparison> {
        self.files.iter().find(|f| f.file == name)
    }

    pub fn difference_count(&self) -> usize {
        self.files.iter().map(|f| f.differences().len()).sum()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CompareOptions {
    pub load: LoadOptions,
    /// Worker threads for file pairs; `None` uses rayon's global pool and
    /// `Some(1)` compares sequentially.
    pub jobs: Option<usize>,
}

pub fn compare_folders(a: &Path, b: &Path, options: &CompareOptions) -> Result<ComparisonReport> {
    for folder in [a, b] {
        if !folder.is_dir() {
            return Err(StewardError::FolderNotFound {
                path: folder.to_path_buf(),
            });
        }
    }
    let files_a = list_files(a)?;
    let files_b = list_files(b)?;

    let shared = files_a.intersection(&files_b).cloned().collect::<Vec<_>>();
    let only_in_a = files_a.difference(&files_b).cloned().collect::<Vec<_>>();
    let only_in_b = files_b.difference(&files_a).cloned().collect::<Vec<_>>();
    debug!(
        "Shared {} file(s), {} only in A, {} only in B",
        shared.len(),
        only_in_a.len(),
        only_in_b.len()
    );

    let compare_one = |name: &String| compare_file(a, b, name, &options.load);
    let files: Vec<FileComparison> = match options.jobs {
        Some(1) => shared.iter().map(compare_one).collect(),
        Some(threads) => match ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => pool.install(|| shared.par_iter().map(compare_one).collect()),
            Err(err) => {
                warn!("Falling back to sequential comparison: {err}");
                shared.iter().map(compare_one).collect()
            }
        },
        None => shared.par_iter().map(compare_one).collect(),
    };

    let report = ComparisonReport {
        source_a: a.display().to_string(),
        source_b: b.display().to_string(),
        shared,
        only_in_a,
        only_in_b,
        files,
    };
    info!(
        "Compared {} shared file(s): {} difference(s)",
        report.shared.len(),
        report.difference_count()
    );
    Ok(report)
}

fn list_files(folder: &Path) -> Result<BTreeSet<String>> {
    io_utils::list_csv_files(folder)
        .map(|names| names.into_iter().collect())
        .map_err(|err| StewardError::io(folder, std::io::Error::other(format!("{err:#}"))))
}

fn compare_file(a: &Path, b: &Path, name: &str, options: &LoadOptions) -> FileComparison {
    let loaded = Dataset::load(&a.join(name), options)
        .map_err(|err| (Side::A, err))
        .and_then(|left| {
            Dataset::load(&b.join(name), options)
                .map(|right| (left, right))
                .map_err(|err| (Side::B, err))
        });
    let outcome = match loaded {
        Ok((left, right)) => FileOutcome::Compared {
            differences: compare_datasets(&left, &right),
        },
        Err((side, err)) => {
            warn!("Cannot compare {name}: {err}");
            FileOutcome::ReadError {
                side,
                message: err.to_string(),
            }
        }
    };
    FileComparison {
        file: name.to_string(),
        outcome,
    }
}

/// Differences between two versions of the same file, in block order:
/// columns, rows, dtype, means, uniques.
pub fn compare_datasets(a: &Dataset, b: &Dataset) -> Vec<Difference> {
    let cols_a = a.column_names().collect::<BTreeSet<_>>();
    let cols_b = b.column_names().collect::<BTreeSet<_>>();
    let mut differences = Vec::new();

    let only_a = cols_a.difference(&cols_b).map(|c| c.to_string()).collect::<Vec<_>>();
    let only_b = cols_b.difference(&cols_a).map(|c| c.to_string()).collect::<Vec<_>>();
    if !only_a.is_empty() {
        differences.push(Difference::ColumnsOnlyInA { columns: only_a });
    }
    if !only_b.is_empty() {
        differences.push(Difference::ColumnsOnlyInB { columns: only_b });
    }

    if a.row_count() != b.row_count() {
        differences.push(Difference::RowCountMismatch {
            a: a.row_count(),
            b: b.row_count(),
        });
    }

    let mut dtypes = Vec::new();
    let mut means = Vec::new();
    let mut uniques = Vec::new();
    for name in cols_a.intersection(&cols_b) {
        let (Some(left), Some(right)) = (a.column(name), b.column(name)) else {
            continue;
        };
        let (type_a, type_b) = (left.column_type(), right.column_type());
        if type_a != type_b {
            dtypes.push(Difference::DtypeMismatch {
                column: name.to_string(),
                a: type_a,
                b: type_b,
            });
            continue;
        }
        if type_a.is_numeric()
            && let (Some(mean_a), Some(mean_b)) =
                (kind::numeric_mean(left.cells()), kind::numeric_mean(right.cells()))
            && (mean_a - mean_b).abs() > MEAN_EPSILON
        {
            means.push(Difference::MeanMismatch {
                column: name.to_string(),
                a: mean_a,
                b: mean_b,
            });
        }
        let (unique_a, unique_b) = (unique_count(left), unique_count(right));
        if unique_a != unique_b {
            uniques.push(Difference::UniqueCountMismatch {
                column: name.to_string(),
                a: unique_a,
                b: unique_b,
            });
        }
    }
    differences.extend(dtypes);
    differences.extend(means);
    differences.extend(uniques);
    differences
}

/// Distinct values with missing counted as one extra bucket.
pub fn unique_count(column: &Column) -> usize {
    let column_type = column.column_type();
    let mut buckets = HashSet::new();
    let mut saw_missing = false;
    for cell in column.cells() {
        match cell {
            Some(raw) => {
                buckets.insert(kind::bucket_key(raw, column_type));
            }
            None => saw_missing = true,
        }
    }
    buckets.len() + usize::from(saw_missing)
}
