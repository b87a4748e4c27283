//! Batch orchestration: scan, extract, validate, write.
//!
//! A run walks the input folder once, hands the discovered units to a
//! bounded worker pool, validates the extracted lines against the reference
//! store, and writes one export file. Per-unit faults are isolated and
//! tallied; only faults that make any output impossible fail the run.
//! Output ordering is deterministic: results are merged back in scan order
//! regardless of which worker finished first.

pub mod filter;

pub use filter::ValidationFilter;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, mpsc};
use std::thread;

use crate::core::{ExchangeRates, InvoiceLine, PartyRole, ReggisError, RejectReason};
use crate::export;
use crate::extract::{self, ExtractConfig, ExtractOutcome};
use crate::store::ReferenceStore;
use crate::walk::{self, SourceUnit};

/// Settings for one batch run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Reject lines whose (code, entity) pair is not a registered material.
    pub validate_materials: bool,
    /// Reject lines whose buyer tax ID is not a registered client.
    pub validate_clients: bool,
    /// Worker thread count; at least 1.
    pub workers: usize,
    pub role: PartyRole,
    pub rates: ExchangeRates,
}

impl RunOptions {
    /// Options with validations off and a worker count derived from the
    /// machine, capped at 8.
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        let workers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
            .min(8);
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            validate_materials: false,
            validate_clients: false,
            workers,
            role: PartyRole::default(),
            rates: ExchangeRates::default(),
        }
    }
}

/// Phase of a run, reported on the progress channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Scanning,
    Extracting,
    Validating,
    Writing,
    Done,
    Failed,
}

/// Progress notifications emitted during a run.
///
/// Delivery is best effort: a dropped or slow receiver never stalls or
/// fails the run.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    State(RunState),
    /// One input unit finished, with the number of lines it yielded.
    UnitDone {
        index: usize,
        total: usize,
        origin: String,
        lines: usize,
    },
    /// One input unit or document was skipped with an error.
    UnitError { origin: String, message: String },
    /// Validation finished.
    LinesValidated { accepted: usize, rejected: usize },
    /// The run is over; the report is also returned from [`run_batch`].
    Finished(RunReport),
}

/// Cooperative cancellation handle, checked between units.
#[derive(Debug, Default)]
pub struct CancelFlag(AtomicBool);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Tallies of one run. Counts are always populated, also on failure and
/// cancellation.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Units discovered by the scan.
    pub units_total: usize,
    /// Units a worker actually picked up.
    pub units_processed: usize,
    /// Units or documents skipped with an error, as (origin, message).
    pub unit_errors: Vec<(String, String)>,
    /// Documents skipped for not being invoices.
    pub documents_skipped: usize,
    /// Lines extracted before validation.
    pub lines_extracted: usize,
    /// Source lines dropped for non-positive quantity or price.
    pub lines_dropped: usize,
    /// Lines that passed validation and were written (or would have been,
    /// under cancellation).
    pub lines_accepted: usize,
    pub rejected_materials: usize,
    pub rejected_clients: usize,
    /// Each rejection with the invoice it came from.
    pub rejections: Vec<(String, RejectReason)>,
    pub cancelled: bool,
    /// The written export file; `None` on cancellation.
    pub output: Option<PathBuf>,
}

/// What one worker produced for one unit.
struct UnitResult {
    index: usize,
    lines: Vec<InvoiceLine>,
    dropped: usize,
    skipped_documents: usize,
    errors: Vec<(String, String)>,
}

fn emit(progress: Option<&mpsc::Sender<ProgressEvent>>, event: ProgressEvent) {
    if let Some(tx) = progress {
        let _ = tx.send(event);
    }
}

/// Run one batch.
///
/// Fatal conditions (unscannable input folder, unwritable output, an empty
/// result) return an error after a `Finished` event carrying the partial
/// tallies. Cancellation is not an error: the report comes back with
/// `cancelled` set and no output file.
pub fn run_batch(
    options: &RunOptions,
    store: &RwLock<ReferenceStore>,
    progress: Option<&mpsc::Sender<ProgressEvent>>,
    cancel: &CancelFlag,
) -> Result<RunReport, ReggisError> {
    let mut report = RunReport::default();
    match run_inner(options, store, progress, cancel, &mut report) {
        Ok(()) => {
            emit(progress, ProgressEvent::State(RunState::Done));
            emit(progress, ProgressEvent::Finished(report.clone()));
            Ok(report)
        }
        Err(e) => {
            tracing::error!(error = %e, "batch run failed");
            emit(progress, ProgressEvent::State(RunState::Failed));
            emit(progress, ProgressEvent::Finished(report.clone()));
            Err(e)
        }
    }
}

fn run_inner(
    options: &RunOptions,
    store: &RwLock<ReferenceStore>,
    progress: Option<&mpsc::Sender<ProgressEvent>>,
    cancel: &CancelFlag,
    report: &mut RunReport,
) -> Result<(), ReggisError> {
    emit(progress, ProgressEvent::State(RunState::Scanning));
    let units = walk::scan(&options.input_dir)?;
    report.units_total = units.len();
    tracing::info!(units = units.len(), input = %options.input_dir.display(), "scan finished");

    emit(progress, ProgressEvent::State(RunState::Extracting));
    let config = ExtractConfig {
        rates: options.rates.clone(),
        role: options.role,
    };
    let mut results = extract_units(&units, &config, options.workers.max(1), progress, cancel);

    // Workers finish in arbitrary order; scan order decides the output.
    results.sort_by_key(|r| r.index);

    let mut extracted: Vec<InvoiceLine> = Vec::new();
    for result in results {
        report.units_processed += 1;
        report.lines_dropped += result.dropped;
        report.documents_skipped += result.skipped_documents;
        report.lines_extracted += result.lines.len();
        report.unit_errors.extend(result.errors);
        extracted.extend(result.lines);
    }

    if cancel.is_cancelled() {
        tracing::info!(
            processed = report.units_processed,
            total = report.units_total,
            "run cancelled"
        );
        report.cancelled = true;
        return Ok(());
    }

    emit(progress, ProgressEvent::State(RunState::Validating));
    let accepted = {
        let guard = store.read().unwrap_or_else(PoisonError::into_inner);
        let filter =
            ValidationFilter::new(&guard, options.validate_materials, options.validate_clients);
        let mut accepted = Vec::with_capacity(extracted.len());
        for line in extracted {
            match filter.check(&line) {
                Ok(()) => accepted.push(line),
                Err(reason) => {
                    match reason {
                        RejectReason::UnknownMaterial { .. } => report.rejected_materials += 1,
                        RejectReason::UnknownClient { .. } => report.rejected_clients += 1,
                    }
                    report.rejections.push((line.invoice_number.clone(), reason));
                }
            }
        }
        accepted
    };
    report.lines_accepted = accepted.len();
    emit(
        progress,
        ProgressEvent::LinesValidated {
            accepted: report.lines_accepted,
            rejected: report.rejections.len(),
        },
    );
    tracing::info!(
        accepted = report.lines_accepted,
        rejected = report.rejections.len(),
        "validation finished"
    );

    if cancel.is_cancelled() {
        report.cancelled = true;
        return Ok(());
    }

    if accepted.is_empty() {
        return Err(ReggisError::EmptyRun {
            units: report.units_total,
        });
    }

    emit(progress, ProgressEvent::State(RunState::Writing));
    let path = export::write_reggis(&accepted, &options.output_dir)?;
    report.output = Some(path);
    Ok(())
}

/// Fan the units out to a bounded pool and collect each unit's result.
fn extract_units(
    units: &[SourceUnit],
    config: &ExtractConfig,
    workers: usize,
    progress: Option<&mpsc::Sender<ProgressEvent>>,
    cancel: &CancelFlag,
) -> Vec<UnitResult> {
    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel::<UnitResult>();

    thread::scope(|s| {
        for _ in 0..workers.min(units.len().max(1)) {
            let tx = tx.clone();
            let progress = progress.cloned();
            let next = &next;
            s.spawn(move || {
                loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let i = next.fetch_add(1, Ordering::Relaxed);
                    let Some(unit) = units.get(i) else { break };
                    let result = process_unit(unit, config, progress.as_ref());
                    emit(
                        progress.as_ref(),
                        ProgressEvent::UnitDone {
                            index: unit.index,
                            total: units.len(),
                            origin: unit.path.display().to_string(),
                            lines: result.lines.len(),
                        },
                    );
                    if tx.send(result).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);
        rx.into_iter().collect()
    })
}

/// Read and extract every document of one unit. All faults stay local to
/// the unit.
fn process_unit(
    unit: &SourceUnit,
    config: &ExtractConfig,
    progress: Option<&mpsc::Sender<ProgressEvent>>,
) -> UnitResult {
    let mut result = UnitResult {
        index: unit.index,
        lines: Vec::new(),
        dropped: 0,
        skipped_documents: 0,
        errors: Vec::new(),
    };

    let documents = match walk::read_unit(unit) {
        Ok(docs) => docs,
        Err(e) => {
            let origin = unit.path.display().to_string();
            tracing::warn!(origin = %origin, error = %e, "input unit unreadable");
            emit(
                progress,
                ProgressEvent::UnitError {
                    origin: origin.clone(),
                    message: e.to_string(),
                },
            );
            result.errors.push((origin, e.to_string()));
            return result;
        }
    };

    for doc in documents {
        match extract::extract_document(&doc.text, &doc.origin, config) {
            Ok(ExtractOutcome::Lines { lines, dropped }) => {
                result.dropped += dropped;
                result.lines.extend(lines);
            }
            Ok(ExtractOutcome::Skipped(_)) => result.skipped_documents += 1,
            Err(e) => {
                tracing::warn!(origin = %doc.origin, error = %e, "document skipped");
                emit(
                    progress,
                    ProgressEvent::UnitError {
                        origin: doc.origin.clone(),
                        message: e.to_string(),
                    },
                );
                result.errors.push((doc.origin, e.to_string()));
            }
        }
    }
    result
}
