use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use rust_dbdox::logging::init_logging;
use rust_dbdox::settings::AppSettings;
use rust_dbdox::{extract_snapshot, load_queries, ExtractOptions, ExtractionRun, IntegrityMode};

#[derive(Parser)]
#[command(name = "rust-dbdox")]
#[command(author, version, about = "Extract and normalize SQL Server catalog metadata")]
struct Cli {
    /// Settings file (TOML); DBDOX_* environment variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the canonical model from a catalog snapshot
    Extract {
        /// Path to the catalog snapshot JSON document
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Where to write the run JSON (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fail the run on any integrity violation
        #[arg(long)]
        strict: bool,

        /// Abort if the run has not reached the barrier after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Directory of NN_name.sql files replacing the built-in queries
        #[arg(long)]
        query_dir: Option<PathBuf>,

        /// Run the extraction steps one after another
        #[arg(long)]
        sequential: bool,
    },
    /// List the extraction queries with their versions and required columns
    Queries {
        /// Directory of NN_name.sql files replacing the built-in queries
        #[arg(long)]
        query_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = AppSettings::load(cli.config.as_deref())?;
    init_logging(&settings.log);

    match cli.command {
        Commands::Extract {
            snapshot,
            output,
            strict,
            timeout_secs,
            query_dir,
            sequential,
        } => {
            let mut run = settings.run_options()?;
            if strict {
                run.integrity_mode = IntegrityMode::Strict;
            }
            if let Some(secs) = timeout_secs {
                run.timeout = Some(Duration::from_secs(secs));
            }
            if sequential {
                run.parallel = false;
            }

            let options = ExtractOptions {
                snapshot_path: snapshot,
                query_dir: query_dir.or(settings.run.query_dir),
                run,
            };
            let result = extract_snapshot(&options)?;
            print_summary(&result);

            let json = serde_json::to_string_pretty(&result)?;
            match output {
                Some(path) => std::fs::write(&path, json)
                    .with_context(|| format!("Failed to write output: {}", path.display()))?,
                None => println!("{}", json),
            }
        }
        Commands::Queries { query_dir } => {
            let queries = load_queries(query_dir.or(settings.run.query_dir).as_deref())?;
            for query in queries.iter() {
                println!(
                    "{:<28} {}  {}",
                    query.kind.file_name(),
                    query.version,
                    query.required_columns().join(", ")
                );
            }
        }
    }

    Ok(())
}

fn print_summary(run: &ExtractionRun) {
    let diagnostics = &run.diagnostics;
    eprintln!(
        "Run {} finished with status {:?}",
        run.audit.run_guid, run.audit.status
    );
    for (kind, count) in &diagnostics.row_counts {
        eprintln!("  {:<24} {}", kind.name(), count);
    }
    if diagnostics.is_clean() {
        return;
    }
    eprintln!(
        "Diagnostics: {} failed step(s), {} unmapped code(s), \
         {} introspection failure(s), {} integrity warning(s)",
        diagnostics.step_failures.len(),
        diagnostics.unmapped_codes.len(),
        diagnostics.introspection_failures.len(),
        diagnostics.integrity_warnings.len()
    );
    for failure in &diagnostics.step_failures {
        eprintln!("  step {}: {}", failure.query.step_key(), failure.error);
    }
}
