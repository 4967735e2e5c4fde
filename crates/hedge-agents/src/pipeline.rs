use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use hedge_ledger::{Ledger, SharedLedger};
use hedge_models::{
    PerTickerResult, RenderedLedger, Role, RunConfig, RunRecord, RunStatus, TickerConcurrency,
};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::adapters::{Director, ExecutionAgent, QuantAnalyst, RiskManager};
use crate::error::{AdapterError, PipelineError, RunError};

/// The four stage adapters a pipeline drives. Injected, never global.
pub struct PipelineStages {
    pub director: Director,
    pub quant: QuantAnalyst,
    pub risk: RiskManager,
    pub execution: ExecutionAgent,
}

/// A successful run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub task: String,
    pub tickers: Vec<String>,
    /// One result per ticker, in input order.
    pub results: Vec<PerTickerResult>,
    pub ledger: Ledger,
    /// The ledger in the configured output mode.
    pub output: RenderedLedger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunOutcome {
    pub fn to_record(&self) -> RunRecord {
        RunRecord {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            task: self.task.clone(),
            tickers: self.tickers.clone(),
            status: RunStatus::Completed,
            error: None,
            started_at: self.started_at,
            finished_at: self.finished_at,
            results: self.results.clone(),
            entries: self.ledger.snapshot(),
        }
    }
}

impl RunError {
    pub fn to_record(&self, settings: &RunConfig) -> RunRecord {
        RunRecord {
            id: self.run_id,
            name: settings.name.clone(),
            description: settings.description.clone(),
            task: self.task.clone(),
            tickers: self.tickers.clone(),
            status: RunStatus::Failed,
            error: Some(self.error.to_string()),
            started_at: self.started_at,
            finished_at: self.finished_at,
            results: self.completed.clone(),
            entries: self.ledger.snapshot(),
        }
    }
}

/// Where a ticker's stage outputs are appended.
trait LedgerSink {
    fn record(&mut self, role: Role, ticker: &str, content: String);
}

impl LedgerSink for Ledger {
    fn record(&mut self, role: Role, _ticker: &str, content: String) {
        self.append(role, content);
    }
}

impl LedgerSink for SharedLedger {
    fn record(&mut self, role: Role, ticker: &str, content: String) {
        self.append_for(role, ticker, content);
    }
}

/// Drives tasks through director → quant → risk → execution → director, per ticker.
pub struct Pipeline {
    stages: Arc<PipelineStages>,
    settings: RunConfig,
    cancel: Mutex<CancellationToken>,
}

impl Pipeline {
    pub fn new(stages: PipelineStages, settings: RunConfig) -> Self {
        Self {
            stages: Arc::new(stages),
            settings,
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn settings(&self) -> &RunConfig {
        &self.settings
    }

    /// Cancelling stops the current run, or the next one to start, at its next
    /// stage boundary. The run that observes the cancellation consumes it, and
    /// later runs get a fresh token.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Swap in a fresh token once `used` has been cancelled.
    fn retire_token(&self, used: &CancellationToken) {
        if !used.is_cancelled() {
            return;
        }
        let mut current = self.cancel.lock().unwrap_or_else(|e| e.into_inner());
        if current.is_cancelled() {
            *current = CancellationToken::new();
        }
    }

    /// Run `task` over the configured tickers.
    pub async fn run(&self, task: &str) -> Result<RunOutcome, RunError> {
        self.run_with_tickers(task, &self.settings.tickers).await
    }

    /// Run `task` over `tickers`. An empty list lets the director choose.
    pub async fn run_with_tickers(
        &self,
        task: &str,
        tickers: &[String],
    ) -> Result<RunOutcome, RunError> {
        let cancel = self.cancel_token();
        let result = self.execute(task, tickers, &cancel).await;
        self.retire_token(&cancel);
        result
    }

    async fn execute(
        &self,
        task: &str,
        tickers: &[String],
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, RunError> {
        let run = RunContext {
            id: Uuid::new_v4(),
            task: task.to_string(),
            started_at: Utc::now(),
            clock: Instant::now(),
        };
        info!(run_id = %run.id, name = %self.settings.name, "Starting trading cycle");

        let mut ledger = Ledger::new();
        ledger.append(Role::User, format!("Task: {task}"));

        let tickers = if tickers.is_empty() {
            match self.discover(task, cancel, &mut ledger).await {
                Ok(found) => found,
                Err(e) => return Err(run.fail(e, Vec::new(), ledger, Vec::new())),
            }
        } else {
            tickers.to_vec()
        };

        let (results, ledger) = match self.settings.concurrency {
            TickerConcurrency::Sequential => {
                match self.run_sequential(&run, cancel, &tickers, &mut ledger).await {
                    Ok(results) => (results, ledger),
                    Err((e, completed)) => return Err(run.fail(e, tickers, ledger, completed)),
                }
            }
            TickerConcurrency::PerTicker => {
                let shared = SharedLedger::new(ledger);
                let outcome = self.run_per_ticker(&run, cancel, &tickers, &shared).await;
                let ledger = shared.snapshot();
                match outcome {
                    Ok(results) => (results, ledger),
                    Err((e, completed)) => return Err(run.fail(e, tickers, ledger, completed)),
                }
            }
        };

        let output = ledger.render(self.settings.output_mode);
        info!(
            run_id = %run.id,
            tickers = tickers.len(),
            entries = ledger.len(),
            elapsed_ms = run.clock.elapsed().as_millis(),
            "Trading cycle complete"
        );

        Ok(RunOutcome {
            id: run.id,
            name: self.settings.name.clone(),
            description: self.settings.description.clone(),
            task: run.task,
            tickers,
            results,
            ledger,
            output,
            started_at: run.started_at,
            finished_at: Utc::now(),
        })
    }

    async fn discover(
        &self,
        task: &str,
        cancel: &CancellationToken,
        ledger: &mut Ledger,
    ) -> Result<Vec<String>, PipelineError> {
        check_cancelled(cancel)?;
        let tickers = self
            .stages
            .director
            .discover_tickers(task)
            .await
            .map_err(PipelineError::Discovery)?;
        if tickers.is_empty() {
            return Err(PipelineError::NoTickers);
        }
        ledger.append(
            Role::Director,
            format!("Tickers selected: {}", tickers.join(", ")),
        );
        Ok(tickers)
    }

    async fn run_sequential(
        &self,
        run: &RunContext,
        cancel: &CancellationToken,
        tickers: &[String],
        ledger: &mut Ledger,
    ) -> Result<Vec<PerTickerResult>, (PipelineError, Vec<PerTickerResult>)> {
        let mut results = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            match process_ticker(&self.stages, cancel, &run.task, ticker, ledger).await {
                Ok(result) => results.push(result),
                Err(e) => return Err((e, results)),
            }
        }
        Ok(results)
    }

    async fn run_per_ticker(
        &self,
        run: &RunContext,
        cancel: &CancellationToken,
        tickers: &[String],
        ledger: &SharedLedger,
    ) -> Result<Vec<PerTickerResult>, (PipelineError, Vec<PerTickerResult>)> {
        // Siblings stop at their next stage boundary once any ticker fails.
        let abort = cancel.child_token();
        let mut set = JoinSet::new();
        for (idx, ticker) in tickers.iter().enumerate() {
            let stages = Arc::clone(&self.stages);
            let abort = abort.clone();
            let task = run.task.clone();
            let ticker = ticker.clone();
            let mut sink = ledger.clone();
            set.spawn(async move {
                let result = process_ticker(&stages, &abort, &task, &ticker, &mut sink).await;
                (idx, result)
            });
        }

        let mut finished: Vec<(usize, PerTickerResult)> = Vec::new();
        let mut failure: Option<PipelineError> = None;
        while let Some(joined) = set.join_next().await {
            let err = match joined {
                Ok((idx, Ok(result))) => {
                    finished.push((idx, result));
                    continue;
                }
                Ok((_, Err(e))) => e,
                Err(e) => PipelineError::Join(e.to_string()),
            };
            abort.cancel();
            // Keep the first real failure over the cancellations it caused.
            let replace = match &failure {
                None => true,
                Some(PipelineError::Cancelled) => !matches!(err, PipelineError::Cancelled),
                Some(_) => false,
            };
            if replace {
                failure = Some(err);
            }
        }

        finished.sort_by_key(|(idx, _)| *idx);
        let results = finished.into_iter().map(|(_, r)| r).collect();
        match failure {
            Some(e) => Err((e, results)),
            None => Ok(results),
        }
    }
}

struct RunContext {
    id: Uuid,
    task: String,
    started_at: DateTime<Utc>,
    clock: Instant,
}

impl RunContext {
    fn fail(
        &self,
        error: PipelineError,
        tickers: Vec<String>,
        ledger: Ledger,
        completed: Vec<PerTickerResult>,
    ) -> RunError {
        match &error {
            PipelineError::Cancelled => {
                warn!(run_id = %self.id, entries = ledger.len(), "Trading cycle cancelled")
            }
            _ => error!(
                run_id = %self.id,
                ticker = error.ticker().unwrap_or("-"),
                error = %error,
                entries = ledger.len(),
                "Error in trading cycle"
            ),
        }
        RunError {
            run_id: self.id,
            task: self.task.clone(),
            tickers,
            started_at: self.started_at,
            finished_at: Utc::now(),
            error,
            ledger,
            completed,
        }
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        Err(PipelineError::Cancelled)
    } else {
        Ok(())
    }
}

fn stage_done(ticker: &str, role: Role, started: Instant) {
    info!(ticker, role = %role, elapsed_ms = started.elapsed().as_millis(), "Stage complete");
}

/// One ticker's five stages. Each output is appended before the next stage starts.
async fn process_ticker<S: LedgerSink>(
    stages: &PipelineStages,
    cancel: &CancellationToken,
    task: &str,
    ticker: &str,
    ledger: &mut S,
) -> Result<PerTickerResult, PipelineError> {
    let fail = |role: Role| move |e: AdapterError| PipelineError::from_adapter(role, ticker, e);
    info!(ticker, "Processing ticker");

    check_cancelled(cancel)?;
    let started = Instant::now();
    let (thesis, market_data) = stages
        .director
        .generate_thesis(task, ticker)
        .await
        .map_err(fail(Role::Director))?;
    ledger.record(
        Role::Director,
        ticker,
        format!("Ticker: {ticker}\nMarket Data: {market_data}\nThesis: {thesis}"),
    );
    stage_done(ticker, Role::Director, started);

    let stock = format!("{ticker}\n{market_data}");

    check_cancelled(cancel)?;
    let started = Instant::now();
    let quant_analysis = stages
        .quant
        .analyze(&stock, &thesis, Some(task))
        .await
        .map_err(fail(Role::Quant))?;
    ledger.record(Role::Quant, ticker, quant_analysis.clone());
    stage_done(ticker, Role::Quant, started);

    check_cancelled(cancel)?;
    let started = Instant::now();
    let risk_assessment = stages
        .risk
        .assess_risk(&stock, &thesis, &quant_analysis, Some(task))
        .await
        .map_err(fail(Role::Risk))?;
    ledger.record(Role::Risk, ticker, risk_assessment.clone());
    stage_done(ticker, Role::Risk, started);

    check_cancelled(cancel)?;
    let started = Instant::now();
    let order = stages
        .execution
        .generate_order(ticker, &thesis, &risk_assessment, Some(task))
        .await
        .map_err(fail(Role::Execution))?;
    ledger.record(Role::Execution, ticker, order.clone());
    stage_done(ticker, Role::Execution, started);

    // Lossy text merge: the decision prompt sees order, data and risk as one blob.
    let combined = format!("{order}\n{market_data}\n{risk_assessment}");

    check_cancelled(cancel)?;
    let started = Instant::now();
    let decision = stages
        .director
        .make_decision(&combined, &thesis, Some(task))
        .await
        .map_err(fail(Role::Director))?;
    ledger.record(Role::Director, ticker, decision.clone());
    stage_done(ticker, Role::Director, started);

    Ok(PerTickerResult {
        ticker: ticker.to_string(),
        market_data,
        thesis,
        quant_analysis,
        risk_assessment,
        order,
        decision,
        completed_at: Utc::now(),
    })
}
