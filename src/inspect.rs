//! Read-only views over a session: column listings and per-file summaries.

use std::fmt::Write as _;

use crate::{
    registry::ColumnRegistry,
    session::Session,
    table::{Align, render_table},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileDetail {
    #[default]
    Basic,
    Detailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOverview {
    pub dataset: String,
    pub rows: usize,
    /// Columns shared with other files, with the number of files carrying each.
    pub shared: Vec<(String, usize)>,
    pub unique: Vec<String>,
}

impl FileOverview {
    pub fn column_count(&self) -> usize {
        self.shared.len() + self.unique.len()
    }
}

/// All columns with their file counts.
pub fn render_columns(registry: &ColumnRegistry) -> String {
    if registry.is_empty() {
        return "No columns loaded.\n".to_string();
    }
    let rows = registry
        .columns()
        .into_iter()
        .map(|(name, count)| vec![name.to_string(), count.to_string()])
        .collect::<Vec<_>>();
    render_table(
        &["column".to_string(), "files".to_string()],
        &rows,
        &[Align::Left, Align::Right],
    )
}

/// Columns appearing in more than one file, with the files carrying them.
pub fn render_repeated(registry: &ColumnRegistry) -> String {
    let repeated = registry.repeated_columns();
    if repeated.is_empty() {
        return "No columns appear in multiple files.\n".to_string();
    }
    let mut out = String::new();
    for column in repeated {
        let files = registry.locations(column);
        let _ = writeln!(out, "Column '{column}' appears in {} files:", files.len());
        for file in files {
            let _ = writeln!(out, "  - {file}");
        }
    }
    out
}

/// Where a column lives; unknown columns are reported, not treated as errors.
pub fn render_locations(registry: &ColumnRegistry, column: &str) -> String {
    let files = registry.locations(column);
    if files.is_empty() {
        return format!("Column '{column}' not found in any file.\n");
    }
    let mut out = format!("Column '{column}' appears in {} files:\n", files.len());
    for file in files {
        let _ = writeln!(out, "  - {file}");
    }
    out
}

pub fn file_overviews(session: &Session) -> Vec<FileOverview> {
    let registry = session.registry();
    session
        .datasets()
        .values()
        .map(|dataset| {
            let (shared, unique): (Vec<_>, Vec<_>) = dataset
                .column_names()
                .partition(|name| registry.is_repeated(name));
            FileOverview {
                dataset: dataset.id().to_string(),
                rows: dataset.row_count(),
                shared: shared
                    .into_iter()
                    .map(|name| (name.to_string(), registry.file_count(name)))
                    .collect(),
                unique: unique.into_iter().map(str::to_string).collect(),
            }
        })
        .collect()
}

pub fn render_files(session: &Session, detail: FileDetail) -> String {
    if session.datasets().is_empty() {
        return "No files currently loaded.\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(out, "Folder: {}", session.folder().display());
    let _ = writeln!(out, "Total files loaded: {}", session.datasets().len());
    let _ = writeln!(out, "Total rows across all files: {}", session.total_rows());
    let _ = writeln!(
        out,
        "Total columns across all files: {}",
        session.total_columns()
    );
    let _ = writeln!(out);

    let overviews = file_overviews(session);
    match detail {
        FileDetail::Basic => {
            let rows = overviews
                .iter()
                .map(|o| {
                    vec![
                        o.dataset.clone(),
                        o.rows.to_string(),
                        o.column_count().to_string(),
                        o.shared.len().to_string(),
                        o.unique.len().to_string(),
                    ]
                })
                .collect::<Vec<_>>();
            let headers = ["file", "rows", "columns", "shared", "unique"]
                .map(str::to_string)
                .to_vec();
            out.push_str(&render_table(
                &headers,
                &rows,
                &[Align::Left, Align::Right, Align::Right, Align::Right, Align::Right],
            ));
        }
        FileDetail::Detailed => {
            for overview in &overviews {
                let _ = writeln!(out, "{}:", overview.dataset);
                let _ = writeln!(out, "  Rows: {}", overview.rows);
                let _ = writeln!(out, "  Columns ({}):", overview.column_count());
                if !overview.shared.is_empty() {
                    let _ = writeln!(out, "  Shared columns:");
                    for (name, count) in &overview.shared {
                        let _ = writeln!(out, "    - {name} (appears in {count} files)");
                    }
                }
                if !overview.unique.is_empty() {
                    let _ = writeln!(out, "  Unique columns:");
                    for name in &overview.unique {
                        let _ = writeln!(out, "    - {name}");
                    }
                }
                let _ = writeln!(out);
            }
        }
    }
    for failure in session.load_failures() {
        let _ = writeln!(out, "Not loaded: {} ({})", failure.file, failure.message);
    }
    out
}
