//! Central evaluation pipeline orchestrator.
//!
//! Drives one job from uploaded documents to a stored result: ingest both
//! documents, fan extraction strategies out as parallel tasks, score each
//! extraction as soon as it lands, then aggregate, combine, and persist.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{watch, Semaphore};

use crate::aggregate::{aggregate, combine, recommendations, summarize};
use crate::error::EvalError;
use crate::keyparser::check_point_budget;
use crate::model::{AnswerKey, DocumentSource, EvaluationJob, JobStatus, PageImage, ScoringConfig};
use crate::results::{EvaluationResult, QuestionVerdict, TimingBreakdown};
use crate::scoring::score;
use crate::traits::{DocumentIngestor, ExtractionContext, ExtractionStrategy, SessionStore};

/// Configuration for the evaluation engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum strategies extracting concurrently.
    pub parallelism: usize,
    /// Per-strategy wall-clock budget; a slow strategy fails alone.
    pub strategy_timeout: Duration,
    /// Merge per-strategy results into one consolidated record when more
    /// than one strategy succeeds.
    pub combine_strategies: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallelism: 4,
            strategy_timeout: Duration::from_secs(120),
            combine_strategies: true,
        }
    }
}

/// Where the answer key comes from.
pub enum KeySource {
    /// A key document to ingest and read with the primary strategy.
    Document(DocumentSource),
    /// A pre-parsed key manifest.
    Manifest(AnswerKey),
}

/// One evaluation submission.
pub struct EvaluateRequest {
    pub sheet: DocumentSource,
    pub key_name: String,
    pub key: KeySource,
    pub config: ScoringConfig,
}

/// Progress reporting trait, consumed by the caller's progress surface.
pub trait ProgressReporter: Send + Sync {
    /// A pipeline stage completed. `percent` is monotone in [0, 100].
    fn on_progress(&self, percent: u8, stage: &str);
    fn on_strategy_complete(&self, result: &EvaluationResult);
    fn on_strategy_error(&self, strategy: &str, error: &str);
    fn on_job_complete(&self, outcome: &JobOutcome);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_progress(&self, _: u8, _: &str) {}
    fn on_strategy_complete(&self, _: &EvaluationResult) {}
    fn on_strategy_error(&self, _: &str, _: &str) {}
    fn on_job_complete(&self, _: &JobOutcome) {}
}

/// Keeps reported progress monotone regardless of strategy completion order.
struct ProgressTracker<'a> {
    reporter: &'a dyn ProgressReporter,
    current: AtomicU8,
}

impl<'a> ProgressTracker<'a> {
    fn new(reporter: &'a dyn ProgressReporter) -> Self {
        Self {
            reporter,
            current: AtomicU8::new(0),
        }
    }

    fn report(&self, percent: u8, stage: &str) {
        let percent = percent.min(100);
        let prev = self.current.fetch_max(percent, Ordering::SeqCst);
        if percent > prev {
            self.reporter.on_progress(percent, stage);
        }
    }
}

/// Cancels an in-flight job.
///
/// Cancelling signals every in-flight strategy task and discards partial
/// results; a job that already completed is unaffected.
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn new() -> (Self, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, CancelSignal { rx })
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// The receiving side of a [`CancelHandle`].
#[derive(Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// A signal that never fires, for callers without cancellation.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves when cancellation is requested.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender dropped without cancelling; stay pending.
                std::future::pending::<()>().await;
            }
        }
    }
}

/// A strategy that failed mid-job, with the reason it was dropped.
#[derive(Debug, Clone)]
pub struct StrategyFailure {
    pub strategy: String,
    pub reason: String,
}

/// Terminal record of one pipeline run.
///
/// Returned for every job that was actually created, success or failure, so
/// the terminal status and error reason stay retrievable.
#[derive(Debug)]
pub struct JobOutcome {
    /// The job with its terminal status and error reason.
    pub job: EvaluationJob,
    /// The stored record (combined or single-strategy); `None` on failure.
    pub result: Option<EvaluationResult>,
    /// Every per-strategy result that was scored, in completion order.
    pub per_strategy: Vec<EvaluationResult>,
    /// Strategies that failed without sinking the job.
    pub failures: Vec<StrategyFailure>,
    /// Non-fatal degradation notices.
    pub warnings: Vec<String>,
    /// Typed fatal error when `job.status` is `Failed`.
    pub error: Option<EvalError>,
}

impl JobOutcome {
    pub fn is_complete(&self) -> bool {
        self.job.status == JobStatus::Complete
    }
}

/// The central evaluation engine.
pub struct EvaluationEngine {
    ingestor: Arc<dyn DocumentIngestor>,
    strategies: Vec<Arc<dyn ExtractionStrategy>>,
    store: Arc<dyn SessionStore>,
    config: EngineConfig,
}

impl EvaluationEngine {
    pub fn new(
        ingestor: Arc<dyn DocumentIngestor>,
        strategies: Vec<Arc<dyn ExtractionStrategy>>,
        store: Arc<dyn SessionStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            ingestor,
            strategies,
            store,
            config,
        }
    }

    /// Run one evaluation job to its terminal state.
    ///
    /// Returns `Err` only when the request is rejected before a job exists
    /// (invalid configuration). Once a job is created the outcome is always
    /// returned, carrying the terminal status and any failure reason.
    pub async fn run(
        &self,
        request: EvaluateRequest,
        progress: &dyn ProgressReporter,
        cancel: &CancelSignal,
    ) -> Result<JobOutcome, EvalError> {
        request.config.validate()?;
        if self.strategies.is_empty() {
            return Err(EvalError::InvalidConfig(
                "no extraction strategies configured".to_string(),
            ));
        }
        if let KeySource::Manifest(key) = &request.key {
            check_point_budget(key, request.config.total_points)?;
        }

        let start = Instant::now();
        let tracker = ProgressTracker::new(progress);
        tracker.report(2, "validating configuration");

        let mut job = EvaluationJob::new(&request.sheet.name, &request.key_name, request.config);
        job.status = JobStatus::Extracting;

        let outcome = self
            .run_pipeline(&mut job, request.sheet, request.key, &tracker, cancel, start)
            .await;

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::error!(job_id = %job.id, "job failed: {error}");
                job.status = JobStatus::Failed;
                job.error = Some(error.to_string());
                JobOutcome {
                    job: job.clone(),
                    result: None,
                    per_strategy: Vec::new(),
                    failures: Vec::new(),
                    warnings: Vec::new(),
                    error: Some(error),
                }
            }
        };

        progress.on_job_complete(&outcome);
        Ok(outcome)
    }

    async fn run_pipeline(
        &self,
        job: &mut EvaluationJob,
        sheet: DocumentSource,
        key_source: KeySource,
        tracker: &ProgressTracker<'_>,
        cancel: &CancelSignal,
        start: Instant,
    ) -> Result<JobOutcome, EvalError> {
        // Ingest the answer sheet.
        tracker.report(5, "normalizing answer sheet");
        let ingest_start = Instant::now();
        let pages = Arc::new(self.ingestor.ingest(&sheet).await?);
        if cancel.is_cancelled() {
            return Err(EvalError::Cancelled);
        }

        // Resolve the answer key.
        tracker.report(15, "normalizing answer key");
        let key = match key_source {
            KeySource::Manifest(key) => key,
            KeySource::Document(doc) => {
                let key_pages = self.ingestor.ingest(&doc).await?;
                self.extract_key(job, &key_pages).await?
            }
        };
        let ingest_ms = ingest_start.elapsed().as_millis() as u64;
        if key.is_empty() {
            return Err(EvalError::KeyExtractionFailed(
                "answer key contains no questions".to_string(),
            ));
        }
        tracker.report(25, "reading answer key");
        if cancel.is_cancelled() {
            return Err(EvalError::Cancelled);
        }

        // Fan out extraction strategies; score each one as it completes.
        let ctx = Arc::new(ExtractionContext {
            job_id: job.id,
            expected_questions: Some(key.len()),
            ai_instructions: job.config.ai_instructions.clone(),
        });
        let semaphore = Arc::new(Semaphore::new(self.config.parallelism));
        let mut futures = FuturesUnordered::new();

        for strategy in &self.strategies {
            let strategy = Arc::clone(strategy);
            let semaphore = Arc::clone(&semaphore);
            let pages = Arc::clone(&pages);
            let ctx = Arc::clone(&ctx);
            let cancel = cancel.clone();
            let timeout = self.config.strategy_timeout;

            futures.push(async move {
                let name = strategy.name().to_string();
                let inner = async {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|_| anyhow::anyhow!("semaphore closed"))?;
                    match tokio::time::timeout(timeout, strategy.extract(&pages, &ctx)).await {
                        Ok(result) => result,
                        Err(_) => Err(anyhow::anyhow!(
                            "timed out after {}s",
                            timeout.as_secs()
                        )),
                    }
                };
                tokio::select! {
                    _ = cancel.cancelled() => (name, Err(anyhow::anyhow!("cancelled"))),
                    result = inner => (name, result),
                }
            });
        }

        let total = futures.len();
        let mut per_strategy: Vec<EvaluationResult> = Vec::new();
        let mut failures: Vec<StrategyFailure> = Vec::new();
        let mut done = 0usize;

        while let Some((name, result)) = futures.next().await {
            if cancel.is_cancelled() {
                return Err(EvalError::Cancelled);
            }
            done += 1;

            match result {
                Ok(extraction) => {
                    if job.status == JobStatus::Extracting {
                        job.status = JobStatus::Scoring;
                    }
                    let scoring_start = Instant::now();
                    // A key/extraction misalignment is fatal for the job.
                    let verdicts = score(&extraction, &key, &job.config)?;
                    let timing = TimingBreakdown {
                        ingest_ms,
                        extraction_ms: extraction.duration_ms,
                        scoring_ms: scoring_start.elapsed().as_millis() as u64,
                        total_ms: start.elapsed().as_millis() as u64,
                    };
                    let result = self.build_result(job, &name, verdicts, &key, timing);
                    tracker.report(
                        (25 + 60 * done / total) as u8,
                        &format!("scored {name} extraction"),
                    );
                    tracker.reporter.on_strategy_complete(&result);
                    per_strategy.push(result);
                }
                Err(e) => {
                    tracing::warn!(job_id = %job.id, strategy = %name, "strategy failed: {e:#}");
                    tracker.report(
                        (25 + 60 * done / total) as u8,
                        &format!("{name} extraction failed"),
                    );
                    tracker.reporter.on_strategy_error(&name, &format!("{e:#}"));
                    failures.push(StrategyFailure {
                        strategy: name,
                        reason: format!("{e:#}"),
                    });
                }
            }
        }

        if per_strategy.is_empty() {
            let reasons = failures
                .iter()
                .map(|f| format!("{}: {}", f.strategy, f.reason))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(EvalError::AllStrategiesFailed { reasons });
        }

        let mut warnings = Vec::new();
        if !failures.is_empty() {
            let names: Vec<&str> = failures.iter().map(|f| f.strategy.as_str()).collect();
            warnings.push(format!(
                "partial extraction failure: {} of {} strategies failed ({}); results use the remaining strategies",
                failures.len(),
                total,
                names.join(", ")
            ));
        }

        // Consolidate and persist exactly one record.
        tracker.report(90, "consolidating strategy results");
        let mut final_result = if per_strategy.len() > 1 && self.config.combine_strategies {
            let mut combined = combine(&per_strategy, job.config.pass_threshold)?;
            combined.recommendations =
                recommendations(&combined.verdicts, &key, job.config.partial_threshold);
            combined.timing = TimingBreakdown {
                ingest_ms,
                extraction_ms: per_strategy
                    .iter()
                    .map(|r| r.timing.extraction_ms)
                    .max()
                    .unwrap_or(0),
                scoring_ms: per_strategy.iter().map(|r| r.timing.scoring_ms).sum(),
                total_ms: start.elapsed().as_millis() as u64,
            };
            combined
        } else {
            per_strategy[0].clone()
        };
        final_result.warnings = warnings.clone();

        tracker.report(95, "saving evaluation result");
        self.store.save(&final_result).map_err(EvalError::Store)?;

        job.status = JobStatus::Complete;
        tracker.report(100, "evaluation complete");
        tracing::info!(
            job_id = %job.id,
            score = final_result.overall_score,
            strategies = per_strategy.len(),
            "evaluation complete"
        );

        Ok(JobOutcome {
            job: job.clone(),
            result: Some(final_result),
            per_strategy,
            failures,
            warnings,
            error: None,
        })
    }

    /// Read the answer key off its document using the primary strategy.
    async fn extract_key(
        &self,
        job: &EvaluationJob,
        key_pages: &[PageImage],
    ) -> Result<AnswerKey, EvalError> {
        let primary = &self.strategies[0];
        let ctx = ExtractionContext::new(job.id);

        let extraction =
            tokio::time::timeout(self.config.strategy_timeout, primary.extract(key_pages, &ctx))
                .await
                .map_err(|_| {
                    EvalError::KeyExtractionFailed(format!(
                        "{} timed out reading the key document",
                        primary.name()
                    ))
                })?
                .map_err(|e| EvalError::KeyExtractionFailed(format!("{e:#}")))?;

        let mut candidates = extraction.candidates;
        candidates.sort_by_key(|c| c.question_index);
        let answers: Vec<String> = candidates
            .into_iter()
            .filter(|c| c.confidence > 0.0)
            .map(|c| c.answer)
            .collect();

        if answers.is_empty() {
            return Err(EvalError::KeyExtractionFailed(format!(
                "{} found no readable answers on the key document",
                primary.name()
            )));
        }

        Ok(AnswerKey::from_answers(&answers, job.config.total_points))
    }

    fn build_result(
        &self,
        job: &EvaluationJob,
        strategy: &str,
        verdicts: Vec<QuestionVerdict>,
        key: &AnswerKey,
        timing: TimingBreakdown,
    ) -> EvaluationResult {
        let overall_score = aggregate(&verdicts);
        let summary = summarize(&verdicts, overall_score, job.config.pass_threshold);
        let recommendations = recommendations(&verdicts, key, job.config.partial_threshold);
        EvaluationResult {
            id: uuid::Uuid::new_v4(),
            job_id: job.id,
            sheet_name: job.sheet_name.clone(),
            strategy: strategy.to_string(),
            overall_score,
            verdicts,
            summary,
            recommendations,
            warnings: Vec::new(),
            timing,
            created_at: chrono::Utc::now(),
        }
    }
}
