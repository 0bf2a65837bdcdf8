//! I/O utilities for CSV reading, writing, encoding, and delimiter resolution.
//!
//! All file access in csv-steward flows through this module:
//!
//! - **Folder scan**: `list_csv_files` returns the sorted `.csv` file names of a
//!   folder (extension matched case-insensitively).
//! - **Delimiter resolution**: extension-based auto-detection (`.csv` → comma,
//!   `.tsv` → tab) with manual override support.
//! - **Encoding**: input decoding and output encoding via `encoding_rs`,
//!   defaulting to UTF-8.
//! - **Writing**: datasets are rendered into memory first and written with a
//!   single call, so a failed write never leaves a half-encoded buffer behind.

use std::{
    fs::{self, File},
    io::{BufReader, Read},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use chrono::Local;
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};

use crate::error::StewardError;

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn is_csv_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

/// Sorted `.csv` file names directly inside `folder`.
pub fn list_csv_files(folder: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(folder).with_context(|| format!("Listing folder {folder:?}"))? {
        let entry = entry.with_context(|| format!("Reading entry in {folder:?}"))?;
        if !entry.file_type().map(|ty| ty.is_file()).unwrap_or(false) {
            continue;
        }
        if let Some(name) = entry.file_name().to_str()
            && is_csv_name(name)
        {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(path: &Path, delimiter: u8) -> Result<csv::Reader<BufReader<File>>> {
    let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
    Ok(open_csv_reader(BufReader::new(file), delimiter))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

/// Renders a header and rows as delimited text encoded with `encoding`.
/// `target` names the file or dataset in the error.
pub fn render_csv_bytes<I, R>(
    target: &str,
    headers: &[String],
    rows: I,
    delimiter: u8,
    encoding: &'static Encoding,
) -> crate::error::Result<Vec<u8>>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let fail = |message: String| StewardError::RenderFailure {
        target: target.to_string(),
        message,
    };
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true)
        .from_writer(Vec::new());
    writer
        .write_record(headers)
        .map_err(|err| fail(format!("header row: {err}")))?;
    for (idx, row) in rows.into_iter().enumerate() {
        writer
            .write_record(row)
            .map_err(|err| fail(format!("row {}: {err}", idx + 2)))?;
    }
    let utf8 = writer
        .into_inner()
        .map_err(|err| fail(format!("flushing CSV buffer: {}", err.error())))?;
    if encoding == UTF_8 {
        return Ok(utf8);
    }
    let text = String::from_utf8(utf8).map_err(|err| fail(err.to_string()))?;
    let (encoded, _, had_errors) = encoding.encode(&text);
    if had_errors {
        return Err(fail(format!("text cannot be encoded as {}", encoding.name())));
    }
    Ok(encoded.into_owned())
}

/// `<prefix>_<YYYYmmdd_HHMMSS>.<ext>` inside `dir`.
pub fn timestamped_path(dir: &Path, prefix: &str, ext: &str) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("{prefix}_{stamp}.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_names_match_case_insensitively() {
        assert!(is_csv_name("a.csv"));
        assert!(is_csv_name("B.CSV"));
        assert!(!is_csv_name("notes.txt"));
        assert!(!is_csv_name("csv"));
    }

    #[test]
    fn tsv_extension_selects_tab() {
        assert_eq!(resolve_input_delimiter(Path::new("x.tsv"), None), b'\t');
        assert_eq!(resolve_input_delimiter(Path::new("x.csv"), None), b',');
        assert_eq!(resolve_input_delimiter(Path::new("x.csv"), Some(b';')), b';');
    }

    #[test]
    fn render_csv_bytes_quotes_only_when_needed() {
        let headers = vec!["id".to_string(), "note".to_string()];
        let rows = vec![vec!["1", "plain"], vec!["2", "a,b"]];
        let bytes = render_csv_bytes("t.csv", &headers, rows, b',', UTF_8).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "id,note\n1,plain\n2,\"a,b\"\n"
        );
    }

    #[test]
    fn render_csv_bytes_transcodes_output() {
        let encoding = resolve_encoding(Some("windows-1252")).unwrap();
        let headers = vec!["name".to_string()];
        let rows = vec![vec!["café"]];
        let bytes = render_csv_bytes("t.csv", &headers, rows, b',', encoding).unwrap();
        assert_eq!(bytes, b"name\ncaf\xe9\n");
    }

    #[test]
    fn unencodable_text_is_a_render_failure() {
        let encoding = resolve_encoding(Some("windows-1252")).unwrap();
        let headers = vec!["name".to_string()];
        let rows = vec![vec!["東京"]];
        let err = render_csv_bytes("t.csv", &headers, rows, b',', encoding).unwrap_err();
        assert!(matches!(
            err,
            StewardError::RenderFailure { ref target, .. } if target == "t.csv"
        ));
    }

    #[test]
    fn unknown_encoding_is_rejected() {
        assert!(resolve_encoding(Some("klingon")).is_err());
    }
}
