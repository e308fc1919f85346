//! Disease hierarchy nested-set index CLI
//!
//! # Usage
//!
//! ```bash
//! # Rebuild the index from a config file
//! disease-tree --config disease-tree.yaml build
//!
//! # Build without publishing, JSON report
//! disease-tree --database tcrd.db build --dry-run --format json
//!
//! # Query the published index
//! disease-tree --database tcrd.db descendants "disease of cellular proliferation"
//! disease-tree --database tcrd.db lookup DOID:1612
//! disease-tree --database tcrd.db ancestors 5123
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use disease_tree::{
    open_database, IndexQuery, IntervalRecord, JobConfig, RebuildJob, RebuildReport,
    SqliteIndexStore, SqliteSource,
};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "disease-tree")]
#[command(about = "Build and query the nested-set index of the disease hierarchy")]
#[command(long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database (overrides the config file)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the index
    Build {
        /// Root identifier (overrides the config file)
        #[arg(long)]
        root: Option<String>,

        /// Rows per INSERT statement (overrides the config file)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Assemble the record set but do not publish it
        #[arg(long)]
        dry_run: bool,

        /// Report format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Every record for a hierarchy identifier
    Lookup {
        id: String,
    },

    /// Records in the subtree of the first concept with this name
    Descendants {
        name: String,
    },

    /// Records whose interval contains the record at LEFT
    Ancestors {
        left: i64,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(kind = %err.kind, "{}", err.message);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> disease_tree::Result<()> {
    let mut config = match &cli.config {
        Some(path) => JobConfig::from_yaml(path)?,
        None => JobConfig::default(),
    };
    if let Some(database) = cli.database {
        config.database = database;
    }

    match cli.command {
        Commands::Build {
            root,
            batch_size,
            dry_run,
            format,
        } => {
            if let Some(root) = root {
                config.root_id = root;
            }
            if let Some(batch_size) = batch_size {
                config.batch_size = batch_size;
            }
            config.validate()?;

            let conn = open_database(&config.database)?;
            let source = SqliteSource::from_config(&conn, &config);
            let mut store = SqliteIndexStore::from_config(&conn, &config);
            let job = RebuildJob::new(config.clone());

            let report = if dry_run {
                job.dry_run(&source, &source)?
            } else {
                job.run(&source, &source, &mut store)?
            };
            print_report(&report, format)?;
        }
        Commands::Lookup { id } => {
            let conn = open_database(&config.database)?;
            let store = SqliteIndexStore::from_config(&conn, &config);
            print_records(&store.lookup(&id)?);
        }
        Commands::Descendants { name } => {
            let conn = open_database(&config.database)?;
            let store = SqliteIndexStore::from_config(&conn, &config);
            print_records(&store.descendants_of_name(&name)?);
        }
        Commands::Ancestors { left } => {
            let conn = open_database(&config.database)?;
            let store = SqliteIndexStore::from_config(&conn, &config);
            print_records(&store.ancestors_of(left)?);
        }
    }

    Ok(())
}

fn print_report(report: &RebuildReport, format: OutputFormat) -> disease_tree::Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(report).map_err(|e| {
                disease_tree::IndexError::new(disease_tree::ErrorKind::IO, e.to_string())
                    .with_source(e)
            })?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            println!("root:        {}", report.root_id);
            println!("canonical:   {}", report.canonical_records);
            println!("orphans:     {}", report.orphan_records);
            println!("checksum:    {}", report.checksum);
            match &report.generation {
                Some(generation) => println!(
                    "generation:  {} ({})",
                    generation.generation, generation.built_at
                ),
                None => println!("generation:  dry run, nothing published"),
            }
            println!("duration:    {} ms", report.duration_ms);
        }
    }
    Ok(())
}

fn print_records(records: &[IntervalRecord]) {
    for record in records {
        println!(
            "{:>8} {:>8}  {:<14} {}",
            record.left,
            record.right,
            record.external_id.as_deref().unwrap_or("-"),
            record.name
        );
    }
}
