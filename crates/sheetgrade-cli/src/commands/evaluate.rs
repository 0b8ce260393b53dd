//! The `sheetgrade evaluate` command.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use sheetgrade_core::engine::{
    CancelSignal, EngineConfig, EvaluateRequest, EvaluationEngine, JobOutcome, KeySource,
    ProgressReporter,
};
use sheetgrade_core::keyparser::parse_answer_key;
use sheetgrade_core::model::{DocumentSource, MediaType};
use sheetgrade_core::results::EvaluationResult;
use sheetgrade_core::traits::{ExtractionStrategy, SessionStore};
use sheetgrade_ingest::LocalIngestor;
use sheetgrade_strategies::config::{create_strategy, load_config_from};
use sheetgrade_store::{export, JsonSessionStore};

/// Console progress reporter.
struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_progress(&self, percent: u8, stage: &str) {
        eprintln!("  [{percent:>3}%] {stage}");
    }

    fn on_strategy_complete(&self, result: &EvaluationResult) {
        eprintln!(
            "  Done: {} scored {:.1}% ({} correct, {} partial, {} incorrect) ({}ms)",
            result.strategy,
            result.overall_score,
            result.summary.correct,
            result.summary.partial,
            result.summary.incorrect,
            result.timing.extraction_ms,
        );
    }

    fn on_strategy_error(&self, strategy: &str, error: &str) {
        eprintln!("  ERROR: {strategy}: {error}");
    }

    fn on_job_complete(&self, outcome: &JobOutcome) {
        match &outcome.result {
            Some(result) => eprintln!(
                "\nComplete: {:.1}% overall from {} strategies ({}ms)",
                result.overall_score,
                outcome.per_strategy.len(),
                result.timing.total_ms,
            ),
            None => eprintln!(
                "\nFailed: {}",
                outcome.job.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

pub struct EvaluateArgs {
    pub sheet: PathBuf,
    pub key: Option<PathBuf>,
    pub key_manifest: Option<PathBuf>,
    pub method: Option<String>,
    pub total_points: Option<f64>,
    pub pass_threshold: Option<f64>,
    pub ai_instructions: Option<String>,
    pub strategies: Option<String>,
    pub timeout_secs: u64,
    pub no_combine: bool,
    pub store: Option<PathBuf>,
    pub format: String,
    pub config: Option<PathBuf>,
}

fn load_document(path: &Path) -> Result<DocumentSource> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document")
        .to_string();
    let media_type = MediaType::from_file_name(&name)
        .with_context(|| format!("cannot infer media type from file name '{name}'"))?;
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(DocumentSource::new(name, media_type, bytes))
}

pub async fn execute(args: EvaluateArgs) -> Result<()> {
    anyhow::ensure!(args.timeout_secs >= 1, "timeout must be at least 1 second");

    let config = load_config_from(args.config.as_deref())?;

    // Assemble the strategy set.
    let names: Vec<String> = match &args.strategies {
        Some(list) => list.split(',').map(|s| s.trim().to_string()).collect(),
        None => config.enabled_strategies.clone(),
    };
    anyhow::ensure!(!names.is_empty(), "at least one strategy is required");

    let mut strategies: Vec<Arc<dyn ExtractionStrategy>> = Vec::new();
    for name in &names {
        let strategy = create_strategy(name, config.strategies.get(name))?;
        strategies.push(Arc::from(strategy));
    }

    // Scoring config: file defaults overridden by flags.
    let mut scoring = config.scoring.clone();
    if let Some(method) = &args.method {
        scoring.method = method
            .parse()
            .map_err(|e: String| anyhow::anyhow!("{e}"))?;
    }
    if let Some(total_points) = args.total_points {
        scoring.total_points = total_points;
    }
    if let Some(pass_threshold) = args.pass_threshold {
        scoring.pass_threshold = pass_threshold;
    }
    if args.ai_instructions.is_some() {
        scoring.ai_instructions = args.ai_instructions.clone();
    }

    // Load the documents.
    let sheet = load_document(&args.sheet)?;
    let (key_name, key) = match (&args.key, &args.key_manifest) {
        (Some(path), None) => {
            let doc = load_document(path)?;
            (doc.name.clone(), KeySource::Document(doc))
        }
        (None, Some(path)) => {
            let manifest = parse_answer_key(path)?;
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("manifest")
                .to_string();
            (name, KeySource::Manifest(manifest))
        }
        _ => anyhow::bail!("provide exactly one of --key or --key-manifest"),
    };

    let store_dir = args.store.unwrap_or_else(|| config.store_dir.clone());
    let store = Arc::new(JsonSessionStore::new(store_dir));

    let ingestor = Arc::new(
        LocalIngestor::new()
            .with_max_file_size(config.max_file_size_bytes())
            .with_page_height(config.page_height),
    );

    let engine = EvaluationEngine::new(
        ingestor,
        strategies,
        Arc::clone(&store) as Arc<dyn SessionStore>,
        EngineConfig {
            parallelism: 4,
            strategy_timeout: Duration::from_secs(args.timeout_secs),
            combine_strategies: !args.no_combine,
        },
    );

    eprintln!(
        "sheetgrade — evaluating {} against {} with {} strategies",
        sheet.name,
        key_name,
        names.len()
    );
    eprintln!();

    let request = EvaluateRequest {
        sheet,
        key_name,
        key,
        config: scoring,
    };
    let outcome = engine
        .run(request, &ConsoleReporter, &CancelSignal::never())
        .await?;

    let Some(result) = &outcome.result else {
        anyhow::bail!(
            "evaluation failed: {}",
            outcome.job.error.as_deref().unwrap_or("unknown error")
        );
    };

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(result)?),
        "markdown" => println!("{}", export::render_markdown(result)),
        _ => print_summary(result),
    }

    eprintln!("Result saved to history with id {}", result.id);
    Ok(())
}

fn print_summary(result: &EvaluationResult) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["#", "Status", "Score", "Confidence", "Feedback"]);

    for v in &result.verdicts {
        table.add_row(vec![
            Cell::new(v.question_index),
            Cell::new(v.status.to_string()),
            Cell::new(format!("{:.1}/{:.1}", v.score, v.max_score)),
            Cell::new(format!("{:.0}%", v.confidence * 100.0)),
            Cell::new(&v.feedback),
        ]);
    }

    println!("{table}");
    println!(
        "\nOverall: {:.1}% — {}",
        result.overall_score,
        if result.summary.passed {
            "passed"
        } else {
            "failed"
        }
    );
    for warning in &result.warnings {
        println!("Warning: {warning}");
    }
    for rec in &result.recommendations {
        println!("Recommendation: {rec}");
    }
}
