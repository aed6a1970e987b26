// Movie Normalizer CLI binary

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use movie_normalizer::db::{self, migrations, tables::Table};
use movie_normalizer::ingest::progress::{ChunkProgress, ProgressListener};
use movie_normalizer::{run_pipeline, FileKind, FileReport, IngestConfig, NormalizeError, PipelineReport, SqliteSink};

#[derive(Parser)]
#[command(name = "movienorm")]
#[command(about = "Load the Movies Dataset CSV files into a normalized SQLite database", long_about = None)]
#[command(version)]
struct Cli {
    /// Debug logging (RUST_LOG still wins)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and apply the schema
    Init {
        /// Database path (defaults to MOVIENORM_DB_PATH or movies.db)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Drop every table and re-apply the schema
    Reset {
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Run the two-pass loader over the source files
    Load {
        /// Directory holding the CSV files
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        db: Option<PathBuf>,
        /// JSON config file; flags override its values
        #[arg(long)]
        config: Option<PathBuf>,
        /// Load only these files (repeatable)
        #[arg(long, value_enum)]
        only: Vec<FileKind>,
        /// Use ratings.csv instead of ratings_small.csv
        #[arg(long)]
        full_ratings: bool,
        /// Rows per chunk for files with JSON-like columns
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Rows per chunk for links and ratings
        #[arg(long)]
        flat_chunk_size: Option<usize>,
        /// Row error messages kept per file
        #[arg(long)]
        max_errors: Option<usize>,
        /// Reset the schema before loading
        #[arg(long)]
        reset: bool,
        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show row counts per table
    Counts {
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Init { db } => cmd_init(db),
        Commands::Reset { db } => cmd_reset(db),
        Commands::Load {
            data_dir,
            db,
            config,
            only,
            full_ratings,
            chunk_size,
            flat_chunk_size,
            max_errors,
            reset,
            json,
        } => load_config(config)
            .map(|mut cfg| {
                if let Some(dir) = data_dir {
                    cfg.data_dir = dir;
                }
                if let Some(db) = db {
                    cfg.db_path = db;
                }
                if !only.is_empty() {
                    cfg.files = only;
                }
                cfg.full_ratings |= full_ratings;
                if let Some(n) = chunk_size {
                    cfg.chunk_size = n;
                }
                if let Some(n) = flat_chunk_size {
                    cfg.flat_chunk_size = n;
                }
                if let Some(n) = max_errors {
                    cfg.max_error_samples = n;
                }
                cfg
            })
            .and_then(|cfg| cmd_load(cfg, reset, json)),
        Commands::Counts { db } => cmd_counts(db),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}

/// Defaults or a JSON file, then environment overrides on top.
fn load_config(path: Option<PathBuf>) -> Result<IngestConfig> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Cannot read config {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => IngestConfig::default(),
    };
    config.apply_env_with(|key| std::env::var(key).ok());
    Ok(config)
}

fn db_path(db: Option<PathBuf>) -> PathBuf {
    db.unwrap_or_else(|| IngestConfig::from_env().db_path)
}

fn cmd_init(db: Option<PathBuf>) -> Result<()> {
    let path = db_path(db);
    db::open_db(&path)?;
    println!("Initialized database at {}", path.display());
    Ok(())
}

fn cmd_reset(db: Option<PathBuf>) -> Result<()> {
    let path = db_path(db);
    let conn = db::open_db(&path)?;
    migrations::reset_schema(&conn)?;
    println!("Reset schema in {}", path.display());
    Ok(())
}

/// Prints a progress line per committed chunk and, unless JSON output was
/// requested, a report per file.
struct ConsoleProgress {
    file_reports: bool,
}

impl ProgressListener for ConsoleProgress {
    fn on_chunk(&self, progress: &ChunkProgress) {
        eprint!(
            "\r  {} [{}] chunk {}: {} rows read, {} stored",
            progress.file, progress.phase, progress.chunk, progress.rows_read, progress.rows_stored
        );
        let _ = std::io::stderr().flush();
    }

    fn on_file_complete(&self, report: &FileReport) {
        eprintln!();
        if self.file_reports {
            print_file_report(report);
        }
    }

    // The run fails without a final report, so the partial one is always shown
    fn on_file_aborted(&self, report: &FileReport, error: &NormalizeError) {
        eprintln!();
        eprintln!("{} aborted: {}", report.file, error);
        print_file_report(report);
    }
}

fn cmd_load(config: IngestConfig, reset: bool, json: bool) -> Result<()> {
    config.validate()?;
    let conn = db::open_db(&config.db_path)?;
    if reset {
        migrations::reset_schema(&conn)?;
    }

    log::info!(
        "Loading {} into {}",
        config.data_dir.display(),
        config.db_path.display()
    );

    let mut sink = SqliteSink::new(&conn);
    let listener = ConsoleProgress { file_reports: !json };
    let report = run_pipeline(&mut sink, &config, Some(&listener))
        .with_context(|| format!("Load from {} failed", config.data_dir.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(())
}

fn print_file_report(report: &FileReport) {
    println!();
    println!("{} ({})", report.file, report.path);
    println!("  Rows scanned:  {}", report.rows_scanned);
    println!("  Rows read:     {}", report.rows_read);
    println!("  Rows skipped:  {}", report.rows_skipped);
    println!("  Unresolved:    {}", report.unresolved);
    println!("  Rows stored:   {}", report.stored_total());
    println!("  Time:          {:.1}s", report.elapsed_ms as f64 / 1000.0);

    if !report.lookups.is_empty() {
        println!("  Lookups:");
        for lookup in &report.lookups {
            println!(
                "    {:<28} {:>8} candidates  {:>8} new",
                lookup.table.name(),
                lookup.candidates,
                lookup.stored
            );
        }
    }

    println!("  Tables:");
    for (table, counts) in &report.tables {
        println!(
            "    {:<28} {:>8} written     {:>8} new",
            table.name(),
            counts.written,
            counts.stored
        );
    }

    if !report.errors.samples.is_empty() {
        println!("  Errors ({} total):", report.errors.total);
        for sample in &report.errors.samples {
            println!("    {}", sample);
        }
        if report.errors.dropped() > 0 {
            println!("    ... and {} more", report.errors.dropped());
        }
    }
}

fn print_summary(report: &PipelineReport) {
    println!();
    println!("Load complete:");
    println!("  Files:         {}", report.files.len());
    if let Some(metadata) = report.file(FileKind::MoviesMetadata) {
        println!("  Movies stored: {}", metadata.stored(Table::Movies));
    }
    println!("  Rows skipped:  {}", report.rows_skipped());
    println!("  Time:          {:.1}s", report.elapsed_ms as f64 / 1000.0);
}

fn cmd_counts(db: Option<PathBuf>) -> Result<()> {
    let path = db_path(db);
    let conn = db::open_db(&path)?;
    let counts = db::table_counts(&conn)?;

    println!("{:<28}  {:>12}", "Table", "Rows");
    println!("{}", "-".repeat(42));
    for (table, count) in &counts {
        println!("{:<28}  {:>12}", table.name(), count);
    }

    let movies = counts
        .iter()
        .find(|(table, _)| *table == Table::Movies)
        .map(|(_, count)| *count)
        .unwrap_or(0);
    if movies == 0 {
        println!();
        println!("No movies loaded. Use 'movienorm load' to populate the database.");
    }
    Ok(())
}
