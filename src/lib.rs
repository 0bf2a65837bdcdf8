pub mod cli;
pub mod compare;
pub mod dataset;
pub mod error;
pub mod inspect;
pub mod io_utils;
pub mod kind;
pub mod registry;
pub mod remap;
pub mod report;
pub mod session;
pub mod summary;
pub mod table;

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};

use crate::{
    cli::{Cli, Commands, InputArgs},
    compare::CompareOptions,
    dataset::LoadOptions,
    inspect::FileDetail,
    remap::RemapOptions,
    session::Session,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_steward", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Columns(args) => handle_columns(&args),
        Commands::Files(args) => handle_files(&args),
        Commands::Rename(args) => handle_rename(&args),
        Commands::Delete(args) => handle_delete(&args),
        Commands::Compare(args) => handle_compare(&args),
        Commands::Remap(args) => handle_remap(&args),
        Commands::Summary(args) => handle_summary(&args),
    }
}

fn load_options(input: &InputArgs) -> Result<LoadOptions> {
    let encoding = io_utils::resolve_encoding(input.input_encoding.as_deref())?;
    Ok(LoadOptions {
        delimiter: input.delimiter,
        encoding,
        ..LoadOptions::default()
    })
}

fn open_session(folder: &Path, input: &InputArgs) -> Result<Session> {
    let options = load_options(input)?;
    if let Some(delimiter) = options.delimiter {
        debug!("Using delimiter '{}'", printable_delimiter(delimiter));
    }
    Session::open(folder, options).with_context(|| format!("Opening folder {folder:?}"))
}

fn handle_columns(args: &cli::ColumnsArgs) -> Result<()> {
    let session = open_session(&args.folder, &args.input)?;
    let registry = session.registry();
    let text = match (&args.locate, args.repeated) {
        (Some(column), _) => inspect::render_locations(registry, column),
        (None, true) => inspect::render_repeated(registry),
        (None, false) => inspect::render_columns(registry),
    };
    print!("{text}");
    Ok(())
}

fn handle_files(args: &cli::FilesArgs) -> Result<()> {
    let session = open_session(&args.folder, &args.input)?;
    let detail = if args.detail {
        FileDetail::Detailed
    } else {
        FileDetail::Basic
    };
    print!("{}", inspect::render_files(&session, detail));
    Ok(())
}

fn handle_rename(args: &cli::RenameArgs) -> Result<()> {
    let mut session = open_session(&args.folder, &args.input)?;
    let touched = session
        .rename(&args.old, &args.new)
        .with_context(|| format!("Renaming column '{}' to '{}'", args.old, args.new))?;
    let verb = if args.dry_run { "Would rename" } else { "Renamed" };
    println!(
        "{verb} '{}' to '{}' in {} file(s): {}",
        args.old,
        args.new,
        touched.len(),
        touched.join(", ")
    );
    if args.dry_run {
        info!("Dry run: no files written");
        return Ok(());
    }
    persist(&mut session)
}

fn handle_delete(args: &cli::DeleteArgs) -> Result<()> {
    let mut session = open_session(&args.folder, &args.input)?;
    let touched = session
        .delete(&args.column)
        .with_context(|| format!("Deleting column '{}'", args.column))?;
    let applied = args.yes && !args.dry_run;
    let verb = if applied { "Deleted" } else { "Would delete" };
    println!(
        "{verb} '{}' from {} file(s): {}",
        args.column,
        touched.len(),
        touched.join(", ")
    );
    if args.dry_run {
        info!("Dry run: no files written");
        return Ok(());
    }
    if !args.yes {
        println!("Nothing written; pass --yes to apply the deletion.");
        return Ok(());
    }
    persist(&mut session)
}

fn persist(session: &mut Session) -> Result<()> {
    let outcome = session.save();
    for failure in &outcome.failures {
        warn!("Could not save {}: {}", failure.dataset, failure.error);
    }
    info!("Saved {} file(s)", outcome.saved.len());
    if !outcome.is_clean() {
        bail!("{} file(s) could not be saved", outcome.failures.len());
    }
    Ok(())
}

fn handle_compare(args: &cli::CompareArgs) -> Result<()> {
    let options = CompareOptions {
        load: load_options(&args.input)?,
        jobs: args.jobs.map(usize::from),
    };
    info!("Comparing {:?} with {:?}", args.folder_a, args.folder_b);
    let report = compare::compare_folders(&args.folder_a, &args.folder_b, &options)
        .with_context(|| format!("Comparing {:?} and {:?}", args.folder_a, args.folder_b))?;

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Serializing comparison report")?;
        println!("{json}");
        return Ok(());
    }
    let text = report::render_comparison(&report);
    print!("{text}");
    let dir = args.report_dir.as_deref().unwrap_or(Path::new("."));
    let path = report::write_timestamped(dir, "compare_result", &text)
        .with_context(|| format!("Writing comparison report to {dir:?}"))?;
    info!("Comparison report written to {path:?}");
    Ok(())
}

fn handle_remap(args: &cli::RemapArgs) -> Result<()> {
    let session = open_session(&args.folder, &args.input)?;
    let options = RemapOptions {
        structure_file: args.structure.clone(),
        values_path: args.values.clone(),
        output_dir: args.output.clone(),
        unresolved_marker: args.unresolved_marker.clone(),
        ..RemapOptions::default()
    };
    let report = remap::run(&session, &options)
        .with_context(|| format!("Remapping coded values in {:?}", args.folder))?;
    print!("{}", report::render_remap(&report));
    if !report.write_failures.is_empty() {
        bail!(
            "{} remapped file(s) could not be written",
            report.write_failures.len()
        );
    }
    Ok(())
}

fn handle_summary(args: &cli::SummaryArgs) -> Result<()> {
    let session = open_session(&args.folder, &args.input)?;
    let path = args
        .output
        .clone()
        .unwrap_or_else(|| io_utils::timestamped_path(Path::new("."), "column_summary", "csv"));
    let written = summary::export(&session, &path, session.options().encoding)
        .with_context(|| format!("Writing column summary to {path:?}"))?;
    println!("Exported {written} column(s) to {}", path.display());
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
