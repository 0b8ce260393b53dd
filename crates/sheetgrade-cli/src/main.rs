//! sheetgrade CLI — the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "sheetgrade", version, about = "Answer-sheet evaluation pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an answer sheet against an answer key
    Evaluate {
        /// Answer sheet file (PNG, JPG, or PDF)
        #[arg(long)]
        sheet: PathBuf,

        /// Answer key document (PNG, JPG, or PDF)
        #[arg(long, conflicts_with = "key_manifest")]
        key: Option<PathBuf>,

        /// Answer key manifest (TOML) instead of a key document
        #[arg(long)]
        key_manifest: Option<PathBuf>,

        /// Scoring method: strict, partial, ai
        #[arg(long)]
        method: Option<String>,

        /// Total points available
        #[arg(long)]
        total_points: Option<f64>,

        /// Pass threshold percentage (0-100)
        #[arg(long)]
        pass_threshold: Option<f64>,

        /// Free-text grading instructions forwarded to strategies
        #[arg(long)]
        ai_instructions: Option<String>,

        /// Strategies to run (comma-separated, e.g. "pattern,visual,ocr")
        #[arg(long)]
        strategies: Option<String>,

        /// Per-strategy timeout in seconds
        #[arg(long, default_value = "120")]
        timeout_secs: u64,

        /// Keep per-strategy results separate instead of combining them
        #[arg(long)]
        no_combine: bool,

        /// History store directory
        #[arg(long)]
        store: Option<PathBuf>,

        /// Output format: table, json, markdown
        #[arg(long, default_value = "table")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List past evaluation sessions
    History {
        /// Maximum rows to show
        #[arg(long, default_value = "20")]
        limit: usize,

        /// Only sessions scoring at least this percentage
        #[arg(long)]
        min_score: Option<f64>,

        /// Only sessions from this strategy
        #[arg(long)]
        strategy: Option<String>,

        /// Case-insensitive sheet-name filter
        #[arg(long)]
        contains: Option<String>,

        /// History store directory
        #[arg(long)]
        store: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show one stored evaluation result
    Show {
        /// Result id
        #[arg(long)]
        id: uuid::Uuid,

        /// Output format: table, json, markdown
        #[arg(long, default_value = "table")]
        format: String,

        /// History store directory
        #[arg(long)]
        store: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate an answer-key manifest
    Validate {
        /// Key manifest path
        #[arg(long)]
        key_manifest: PathBuf,
    },

    /// Create a starter config and example key manifest
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sheetgrade=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Evaluate {
            sheet,
            key,
            key_manifest,
            method,
            total_points,
            pass_threshold,
            ai_instructions,
            strategies,
            timeout_secs,
            no_combine,
            store,
            format,
            config,
        } => {
            commands::evaluate::execute(commands::evaluate::EvaluateArgs {
                sheet,
                key,
                key_manifest,
                method,
                total_points,
                pass_threshold,
                ai_instructions,
                strategies,
                timeout_secs,
                no_combine,
                store,
                format,
                config,
            })
            .await
        }
        Commands::History {
            limit,
            min_score,
            strategy,
            contains,
            store,
            config,
        } => commands::history::execute(limit, min_score, strategy, contains, store, config),
        Commands::Show {
            id,
            format,
            store,
            config,
        } => commands::show::execute(id, format, store, config),
        Commands::Validate { key_manifest } => commands::validate::execute(key_manifest),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
