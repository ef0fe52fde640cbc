//! Single-symbol, batch and full-universe scans.
//!
//! Batch scans run a fixed pool of named worker threads over a pre-loaded
//! [`TaskQueue`]. Every task a worker pops produces exactly one
//! [`ScanResult`] on the result channel before it is marked done, so once
//! the queue joins the orchestrator knows how many results to collect.
//! Per-symbol failures never abort the batch: the symbol is reported as
//! skipped and the rest carry on.

use crate::domain::condition::ConditionTrace;
use crate::domain::error::{DataError, OrchestrationError, ScanError};
use crate::domain::preprocess;
use crate::domain::scanner::Scanner;
use crate::domain::series::{MIN_HISTORY_BARS, SymbolSeries};
use crate::domain::signal::{Signal, sort_signals};
use crate::domain::task_queue::{Pop, ScanTask, TaskQueue};
use crate::logging::worker_dispatch;
use crate::ports::data_port::SeriesSource;
use chrono::NaiveDate;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ScanOptions {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// How long an idle worker waits on the queue before exiting.
    pub pop_timeout: Duration,
    /// Safety net while collecting results after the queue has joined.
    pub result_grace: Duration,
    /// How long stopped workers get to exit before they are abandoned.
    pub shutdown_grace: Duration,
    pub log_dir: Option<PathBuf>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            pop_timeout: Duration::from_millis(1000),
            result_grace: Duration::from_millis(5000),
            shutdown_grace: Duration::from_millis(5000),
            log_dir: None,
        }
    }
}

/// Why a symbol produced no signals.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SkipReason {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error("scan panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: SkipReason,
}

/// Output of one task: its whole signal list, or why there is none.
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub task: ScanTask,
    pub signals: Vec<Signal>,
    pub error: Option<SkipReason>,
    pub worker_id: usize,
}

#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Sorted by `(date, symbol)`.
    pub signals: Vec<Signal>,
    pub requested: usize,
    pub scanned: usize,
    pub skipped: Vec<SkippedSymbol>,
    pub cancelled: bool,
    pub missing_results: usize,
    pub abandoned_workers: usize,
    pub elapsed: Duration,
}

impl BatchOutcome {
    pub fn symbols_with_signals(&self) -> usize {
        let mut symbols: Vec<&str> = self.signals.iter().map(|s| s.symbol.as_str()).collect();
        symbols.sort_unstable();
        symbols.dedup();
        symbols.len()
    }
}

/// Stops dispatch of new symbols. Symbols already being scanned finish and
/// deliver their results.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Orchestrator {
    source: Arc<dyn SeriesSource>,
    scanner: Scanner,
    options: ScanOptions,
    cancel: CancelHandle,
}

impl Orchestrator {
    pub fn new(source: Arc<dyn SeriesSource>, scanner: Scanner, options: ScanOptions) -> Self {
        Self {
            source,
            scanner,
            options,
            cancel: CancelHandle::default(),
        }
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Load, validate and preprocess one symbol.
    pub fn prepare(&self, symbol: &str) -> Result<SymbolSeries, DataError> {
        prepare_series(self.source.as_ref(), symbol, &self.options)
    }

    /// Scans one symbol inline.
    pub fn test_single(&self, symbol: &str) -> Result<Vec<Signal>, DataError> {
        let series = self.prepare(symbol)?;
        let signals = self.scanner.scan(&series);
        info!(symbol, bars = series.len(), signals = signals.len(), "single scan complete");
        Ok(signals)
    }

    /// Evaluates every condition at `date`, or at the latest bar.
    pub fn trace_single(
        &self,
        symbol: &str,
        date: Option<NaiveDate>,
    ) -> Result<ConditionTrace, ScanError> {
        let series = self.prepare(symbol)?;
        let index = match date {
            Some(d) => series.index_of(d).ok_or_else(|| ScanError::DateNotFound {
                symbol: symbol.to_string(),
                date: d.to_string(),
            })?,
            None => series.len() - 1,
        };
        Ok(self.scanner.conditions().trace(&series, index))
    }

    /// Scans every symbol the source lists, up to `limit`.
    pub fn test_all(&self, workers: usize, limit: Option<usize>) -> Result<BatchOutcome, ScanError> {
        if workers == 0 {
            return Err(OrchestrationError::NoWorkers.into());
        }
        let mut symbols = self.source.list_symbols()?;
        if let Some(limit) = limit {
            symbols.truncate(limit);
        }
        if symbols.is_empty() {
            warn!("no symbols found in data source");
        }
        Ok(self.test_batch(&symbols, workers)?)
    }

    /// Scans `symbols` on a pool of `workers` threads.
    pub fn test_batch(
        &self,
        symbols: &[String],
        workers: usize,
    ) -> Result<BatchOutcome, OrchestrationError> {
        if workers == 0 {
            return Err(OrchestrationError::NoWorkers);
        }
        let started = Instant::now();
        info!(symbols = symbols.len(), workers, "starting batch scan");

        // Open every worker log before any thread starts.
        let dispatches = (0..workers)
            .map(|id| worker_dispatch(id, self.options.log_dir.as_deref()))
            .collect::<Result<Vec<_>, _>>()?;

        let queue = Arc::new(TaskQueue::preload(symbols.iter().cloned()));
        let stop = Arc::new(AtomicBool::new(false));
        let dispatched = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel::<ScanResult>();

        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(workers);
        for (id, dispatch) in dispatches.into_iter().enumerate() {
            let ctx = WorkerContext {
                id,
                queue: Arc::clone(&queue),
                results: tx.clone(),
                stop: Arc::clone(&stop),
                cancel: self.cancel.clone(),
                dispatched: Arc::clone(&dispatched),
                source: Arc::clone(&self.source),
                scanner: self.scanner.clone(),
                options: self.options.clone(),
            };
            let spawned = thread::Builder::new()
                .name(format!("sigscan-worker-{id}"))
                .spawn(move || {
                    let _guard = tracing::dispatcher::set_default(&dispatch);
                    worker_loop(ctx);
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    error!(worker = id, error = %e, "failed to spawn worker");
                    stop.store(true, Ordering::SeqCst);
                    queue.cancel();
                    return Err(OrchestrationError::WorkerSpawn {
                        reason: e.to_string(),
                    });
                }
            }
        }
        drop(tx);

        wait_for_queue(&queue, &handles, self.options.pop_timeout);

        let expected = dispatched.load(Ordering::SeqCst);
        let results = collect_results(&rx, expected, self.options.result_grace);
        let missing_results = expected.saturating_sub(results.len());
        if missing_results > 0 {
            warn!(expected, received = results.len(), "results missing after grace period");
        }

        stop.store(true, Ordering::SeqCst);
        let abandoned_workers = shutdown_workers(handles, self.options.shutdown_grace);
        if abandoned_workers > 0 {
            warn!(abandoned_workers, "workers still running after shutdown grace, detached");
        }

        let mut outcome = aggregate(results, symbols.len());
        outcome.cancelled = self.cancel.is_cancelled();
        outcome.missing_results = missing_results;
        outcome.abandoned_workers = abandoned_workers;
        outcome.elapsed = started.elapsed();

        info!(
            requested = outcome.requested,
            scanned = outcome.scanned,
            skipped = outcome.skipped.len(),
            signals = outcome.signals.len(),
            cancelled = outcome.cancelled,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "batch scan complete"
        );
        Ok(outcome)
    }
}

fn prepare_series(
    source: &dyn SeriesSource,
    symbol: &str,
    options: &ScanOptions,
) -> Result<SymbolSeries, DataError> {
    let raw = source.load(symbol)?;
    preprocess::validate_quality(&raw)?;
    let cleaned = preprocess::clean(&raw);
    let filtered = preprocess::filter_by_date_range(&cleaned, options.start_date, options.end_date);
    let series = preprocess::add_derived(&filtered);

    if !series.has_min_history() {
        return Err(DataError::InsufficientHistory {
            bars: series.len(),
            minimum: MIN_HISTORY_BARS,
        });
    }
    Ok(series)
}

struct WorkerContext {
    id: usize,
    queue: Arc<TaskQueue>,
    results: Sender<ScanResult>,
    stop: Arc<AtomicBool>,
    cancel: CancelHandle,
    dispatched: Arc<AtomicUsize>,
    source: Arc<dyn SeriesSource>,
    scanner: Scanner,
    options: ScanOptions,
}

fn worker_loop(ctx: WorkerContext) {
    debug!(worker = ctx.id, "worker started");
    let mut completed = 0usize;

    loop {
        if ctx.stop.load(Ordering::SeqCst) {
            break;
        }
        if ctx.cancel.is_cancelled() {
            let dropped = ctx.queue.cancel();
            if dropped > 0 {
                info!(worker = ctx.id, dropped, "cancelled, dropped undispatched symbols");
            }
            break;
        }

        match ctx.queue.pop(ctx.options.pop_timeout) {
            Pop::Task(task) => {
                ctx.dispatched.fetch_add(1, Ordering::SeqCst);
                let result = run_task(&ctx, task);
                if ctx.results.send(result).is_err() {
                    warn!(worker = ctx.id, "result channel closed");
                }
                ctx.queue.task_done();
                completed += 1;
            }
            Pop::Timeout => {
                debug!(worker = ctx.id, "queue pop timed out");
                break;
            }
            Pop::Empty => break,
        }
    }

    debug!(worker = ctx.id, completed, "worker exiting");
}

fn run_task(ctx: &WorkerContext, task: ScanTask) -> ScanResult {
    let started = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        prepare_series(ctx.source.as_ref(), &task.symbol, &ctx.options)
            .map(|series| ctx.scanner.scan(&series))
    }));

    let (signals, error) = match outcome {
        Ok(Ok(signals)) => {
            info!(
                worker = ctx.id,
                symbol = %task.symbol,
                signals = signals.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "scanned"
            );
            (signals, None)
        }
        Ok(Err(e)) => {
            warn!(worker = ctx.id, symbol = %task.symbol, error = %e, "skipping symbol");
            (Vec::new(), Some(SkipReason::Data(e)))
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(worker = ctx.id, symbol = %task.symbol, panic = %message, "scan panicked");
            (Vec::new(), Some(SkipReason::Panicked(message)))
        }
    };

    ScanResult {
        task,
        signals,
        error,
        worker_id: ctx.id,
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Blocks until the queue joins, or until no worker is left to finish it.
fn wait_for_queue(queue: &TaskQueue, handles: &[JoinHandle<()>], poll: Duration) {
    let poll = poll.max(Duration::from_millis(10));
    while !queue.join_timeout(poll) {
        if handles.iter().all(|h| h.is_finished()) {
            error!(pending = queue.pending(), "all workers exited with tasks pending");
            break;
        }
    }
}

fn collect_results(rx: &Receiver<ScanResult>, expected: usize, grace: Duration) -> Vec<ScanResult> {
    let mut results = Vec::with_capacity(expected);
    while results.len() < expected {
        match rx.recv_timeout(grace) {
            Ok(result) => results.push(result),
            Err(_) => break,
        }
    }
    results.extend(rx.try_iter());
    results
}

/// Joins workers that exit within `grace`; detaches the rest and returns
/// how many were left behind.
fn shutdown_workers(handles: Vec<JoinHandle<()>>, grace: Duration) -> usize {
    let deadline = Instant::now() + grace;
    let mut running = handles;

    loop {
        let (finished, still): (Vec<_>, Vec<_>) =
            running.into_iter().partition(|h| h.is_finished());
        for handle in finished {
            if handle.join().is_err() {
                error!("worker thread panicked outside a scan");
            }
        }
        running = still;
        if running.is_empty() || Instant::now() >= deadline {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }

    running.len()
}

fn aggregate(mut results: Vec<ScanResult>, requested: usize) -> BatchOutcome {
    results.sort_by_key(|r| r.task.seq);

    let mut signals = Vec::new();
    let mut skipped = Vec::new();
    let mut scanned = 0usize;
    for result in results {
        match result.error {
            Some(reason) => {
                warn!(symbol = %result.task.symbol, reason = %reason, "symbol skipped");
                skipped.push(SkippedSymbol {
                    symbol: result.task.symbol,
                    reason,
                });
            }
            None => {
                scanned += 1;
                signals.extend(result.signals);
            }
        }
    }
    sort_signals(&mut signals);

    BatchOutcome {
        signals,
        requested,
        scanned,
        skipped,
        ..BatchOutcome::default()
    }
}
