//! Text rendering for comparison and remap results.
//!
//! The comparison layout is fixed: header with both sources, summary of shared
//! and one-sided files, then one block per shared file that has findings. Only
//! non-empty categories are rendered. Output for identical reports is
//! byte-identical.

use std::{fmt::Write as _, fs, path::{Path, PathBuf}};

use crate::{
    compare::{Block, ComparisonReport, Difference, FileOutcome, Side},
    error::{Result, StewardError},
    io_utils,
    remap::RemapReport,
};

const RULE_WIDTH: usize = 70;
const COMPARISON_TITLE: &str = "CSV FOLDER COMPARISON REPORT";

fn heavy_rule() -> String {
    "=".repeat(RULE_WIDTH)
}

fn light_rule() -> String {
    "-".repeat(RULE_WIDTH - 4)
}

fn centered(title: &str) -> String {
    let pad = RULE_WIDTH.saturating_sub(title.chars().count()) / 2;
    format!("{}{title}", " ".repeat(pad))
}

fn list(names: &[String]) -> String {
    format!("{names:?}")
}

fn block_label(block: Block) -> &'static str {
    match block {
        Block::Columns => "[COLUMNS]",
        Block::Rows => "[ROWS]",
        Block::Dtype => "[DTYPE MISMATCH]",
        Block::Means => "[MEANS]",
        Block::Uniques => "[UNIQUES]",
    }
}

fn side_label(side: Side) -> &'static str {
    match side {
        Side::A => "folder1",
        Side::B => "folder2",
    }
}

fn difference_line(difference: &Difference) -> String {
    match difference {
        Difference::ColumnsOnlyInA { columns } => {
            format!("  - Columns only in folder1: {}", list(columns))
        }
        Difference::ColumnsOnlyInB { columns } => {
            format!("  - Columns only in folder2: {}", list(columns))
        }
        Difference::RowCountMismatch { a, b } => format!(
            "  - Different row count: folder1={a}, folder2={b} (diff={})",
            a.abs_diff(*b)
        ),
        Difference::DtypeMismatch { column, a, b } => format!(
            "  - Column '{column}' => dtype mismatch: folder1={a}, folder2={b}"
        ),
        Difference::MeanMismatch { column, a, b } => format!(
            "  - Column '{column}' => different means: {a:.3} vs {b:.3} (diff={:.3})",
            a - b
        ),
        Difference::UniqueCountMismatch { column, a, b } => format!(
            "  - Column '{column}' => different unique counts: {a} vs {b} (diff={})",
            a.abs_diff(*b)
        ),
    }
}

/// Renders the comparison report as plain text, one `\n`-terminated line each.
pub fn render_comparison(report: &ComparisonReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", heavy_rule());
    let _ = writeln!(out, "{}", centered(COMPARISON_TITLE));
    let _ = writeln!(out, "{}", heavy_rule());
    let _ = writeln!(out, "Folder1: {}", report.source_a);
    let _ = writeln!(out, "Folder2: {}", report.source_b);
    let _ = writeln!(out);

    let _ = writeln!(out, "{}", light_rule());
    let _ = writeln!(
        out,
        "Shared files (N={}): {}",
        report.shared.len(),
        list(&report.shared)
    );
    let _ = writeln!(
        out,
        "Only in folder1 (M={}): {}",
        report.only_in_a.len(),
        list(&report.only_in_a)
    );
    let _ = writeln!(
        out,
        "Only in folder2 (X={}): {}",
        report.only_in_b.len(),
        list(&report.only_in_b)
    );
    let _ = writeln!(out, "{}", light_rule());
    let _ = writeln!(out);

    for file in report.files.iter().filter(|f| f.has_findings()) {
        let _ = writeln!(out, "--- FILE '{}' ---", file.file);
        match &file.outcome {
            FileOutcome::ReadError { side, message } => {
                let _ = writeln!(out, "[READ ERROR]");
                let _ = writeln!(out, "  - {}: {message}", side_label(*side));
            }
            FileOutcome::Compared { differences } => {
                let mut current = None;
                for difference in differences {
                    let block = difference.block();
                    if current != Some(block) {
                        let _ = writeln!(out, "{}", block_label(block));
                        current = Some(block);
                    }
                    let _ = writeln!(out, "{}", difference_line(difference));
                }
            }
        }
        let _ = writeln!(out);
    }
    out
}

pub fn render_remap(report: &RemapReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", heavy_rule());
    let _ = writeln!(out, "{}", centered("CODED VALUE REMAP REPORT"));
    let _ = writeln!(out, "{}", heavy_rule());
    let _ = writeln!(
        out,
        "Structure: {} ({} key(s))",
        report.structure_file, report.structure_entries
    );
    let _ = writeln!(
        out,
        "Values: {} ({} key(s))",
        report.values_file, report.value_entries
    );
    let _ = writeln!(out, "Output: {}", report.output_dir.display());
    let _ = writeln!(out);

    if report.files.is_empty() {
        let _ = writeln!(out, "No dataset column matched the structure table.");
        let _ = writeln!(out);
    }
    for file in &report.files {
        let _ = writeln!(out, "--- FILE '{}' -> {} ---", file.dataset, file.output.display());
        for column in &file.columns {
            let set = column.category_set.as_deref().unwrap_or("<ambiguous>");
            let _ = writeln!(
                out,
                "  - Column '{}' (set {set}): resolved={}, unresolved={}, missing={}",
                column.column, column.resolved, column.unresolved, column.missing
            );
        }
        let _ = writeln!(out);
    }

    if !report.unmatched_keys.is_empty() {
        let _ = writeln!(out, "[UNMATCHED STRUCTURE KEYS]");
        for (dataset, column) in &report.unmatched_keys {
            let _ = writeln!(out, "  - {dataset} / {column}");
        }
        let _ = writeln!(out);
    }
    if !report.ambiguities.is_empty() {
        let _ = writeln!(out, "[AMBIGUOUS]");
        for message in &report.ambiguities {
            let _ = writeln!(out, "  - {message}");
        }
        let _ = writeln!(out);
    }
    if !report.write_failures.is_empty() {
        let _ = writeln!(out, "[WRITE ERRORS]");
        for failure in &report.write_failures {
            let _ = writeln!(out, "  - {}: {}", failure.dataset, failure.message);
        }
        let _ = writeln!(out);
    }
    out
}

/// Writes `contents` to `<dir>/<prefix>_<timestamp>.txt` and returns the path.
pub fn write_timestamped(dir: &Path, prefix: &str, contents: &str) -> Result<PathBuf> {
    let path = io_utils::timestamped_path(dir, prefix, "txt");
    fs::write(&path, contents).map_err(|err| StewardError::io(&path, err))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compare::FileComparison, kind::ColumnType};

    fn report() -> ComparisonReport {
        ComparisonReport {
            source_a: "left".into(),
            source_b: "right".into(),
            shared: vec!["a.csv".into(), "c.csv".into()],
            only_in_a: vec!["b.csv".into()],
            only_in_b: vec![],
            files: vec![
                FileComparison {
                    file: "a.csv".into(),
                    outcome: FileOutcome::Compared {
                        differences: vec![
                            Difference::RowCountMismatch { a: 3, b: 5 },
                            Difference::DtypeMismatch {
                                column: "v".into(),
                                a: ColumnType::Integer,
                                b: ColumnType::Text,
                            },
                            Difference::MeanMismatch {
                                column: "w".into(),
                                a: 1.0,
                                b: 2.5,
                            },
                        ],
                    },
                },
                FileComparison {
                    file: "c.csv".into(),
                    outcome: FileOutcome::Compared {
                        differences: vec![],
                    },
                },
            ],
        }
    }

    #[test]
    fn comparison_layout_is_stable() {
        let text = render_comparison(&report());
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "=".repeat(70));
        assert_eq!(lines[1].trim(), "CSV FOLDER COMPARISON REPORT");
        assert_eq!(lines[3], "Folder1: left");
        assert_eq!(lines[4], "Folder2: right");
        assert_eq!(lines[7], "Shared files (N=2): [\"a.csv\", \"c.csv\"]");
        assert_eq!(lines[8], "Only in folder1 (M=1): [\"b.csv\"]");
        assert_eq!(lines[9], "Only in folder2 (X=0): []");
        assert_eq!(
            &lines[12..19],
            &[
                "--- FILE 'a.csv' ---",
                "[ROWS]",
                "  - Different row count: folder1=3, folder2=5 (diff=2)",
                "[DTYPE MISMATCH]",
                "  - Column 'v' => dtype mismatch: folder1=integer, folder2=text",
                "[MEANS]",
                "  - Column 'w' => different means: 1.000 vs 2.500 (diff=-1.500)",
            ]
        );
        assert!(!text.contains("c.csv' ---"));
    }

    #[test]
    fn read_errors_render_their_side() {
        let mut report = report();
        report.files[1].outcome = FileOutcome::ReadError {
            side: Side::B,
            message: "bad row".into(),
        };
        let text = render_comparison(&report);
        assert!(text.contains("--- FILE 'c.csv' ---\n[READ ERROR]\n  - folder2: bad row\n"));
    }
}
