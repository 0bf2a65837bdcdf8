use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Track, rename, compare and remap columns across folders of CSV files",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the columns of a folder with the number of files carrying each
    Columns(ColumnsArgs),
    /// Summarise the files of a folder: rows, columns, shared and unique columns
    Files(FilesArgs),
    /// Rename a column in every file that contains it
    Rename(RenameArgs),
    /// Delete a column from every file that contains it
    Delete(DeleteArgs),
    /// Compare the same-named CSV files of two folders
    Compare(CompareArgs),
    /// Replace coded values with labels using a structure table and a value table
    Remap(RemapArgs),
    /// Export a per-column profile of a folder as CSV
    Summary(SummaryArgs),
}

/// Options shared by every command that reads a folder.
#[derive(Debug, Clone, Args)]
pub struct InputArgs {
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ColumnsArgs {
    /// Folder containing the CSV files
    #[arg(short = 'f', long = "folder")]
    pub folder: PathBuf,
    /// Only list columns that appear in more than one file
    #[arg(long, conflicts_with = "locate")]
    pub repeated: bool,
    /// Show the files containing this column
    #[arg(long, value_name = "NAME")]
    pub locate: Option<String>,
    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(Debug, Args)]
pub struct FilesArgs {
    /// Folder containing the CSV files
    #[arg(short = 'f', long = "folder")]
    pub folder: PathBuf,
    /// List shared and unique columns per file instead of counts
    #[arg(long)]
    pub detail: bool,
    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(Debug, Args)]
pub struct RenameArgs {
    /// Folder containing the CSV files
    #[arg(short = 'f', long = "folder")]
    pub folder: PathBuf,
    /// Current column name
    pub old: String,
    /// New column name
    pub new: String,
    /// Report the affected files without writing them
    #[arg(long = "dry-run")]
    pub dry_run: bool,
    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Folder containing the CSV files
    #[arg(short = 'f', long = "folder")]
    pub folder: PathBuf,
    /// Column to remove
    pub column: String,
    /// Report the affected files without writing them
    #[arg(long = "dry-run")]
    pub dry_run: bool,
    /// Confirm the deletion; without it nothing is written
    #[arg(long)]
    pub yes: bool,
    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(Debug, Args)]
pub struct CompareArgs {
    /// First folder (reported as folder1)
    pub folder_a: PathBuf,
    /// Second folder (reported as folder2)
    pub folder_b: PathBuf,
    /// Directory receiving compare_result_<timestamp>.txt (defaults to the current directory)
    #[arg(long = "report-dir")]
    pub report_dir: Option<PathBuf>,
    /// Emit the report as JSON on stdout instead of text
    #[arg(long)]
    pub json: bool,
    /// Number of worker threads used to compare file pairs
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: Option<u16>,
    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(Debug, Args)]
pub struct RemapArgs {
    /// Folder containing the CSV files and the structure table
    #[arg(short = 'f', long = "folder")]
    pub folder: PathBuf,
    /// File name of the structure table inside the folder
    #[arg(long, default_value = crate::remap::DEFAULT_STRUCTURE_FILE)]
    pub structure: String,
    /// Value table path; a bare file name is looked up inside the folder
    #[arg(long, default_value = crate::remap::DEFAULT_VALUES_FILE)]
    pub values: PathBuf,
    /// Output directory (defaults to <folder>/transformed_data)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Text written for values without a label (defaults to an empty cell)
    #[arg(long = "unresolved-marker")]
    pub unresolved_marker: Option<String>,
    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(Debug, Args)]
pub struct SummaryArgs {
    /// Folder containing the CSV files
    #[arg(short = 'f', long = "folder")]
    pub folder: PathBuf,
    /// Output CSV path (defaults to column_summary_<timestamp>.csv in the current directory)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    #[command(flatten)]
    pub input: InputArgs,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
