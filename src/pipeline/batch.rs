//! # Batch Runner
//!
//! Scans many artifacts with a fixed worker pool fed by a bounded job channel.
//! Requests are independent; results come back in input order.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Instant;

use crossbeam_channel::{bounded, unbounded};
use tracing::{info, warn};

use crate::record::{RiskLevel, ScanRecord};

use super::{Orchestrator, ScanError};

const JOBS_PER_WORKER: usize = 2;

struct BatchJob {
    index: usize,
    path: PathBuf,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchStats {
    pub scanned: u64,
    pub high_risk: u64,
    pub degraded: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    scanned: AtomicU64,
    high_risk: AtomicU64,
    degraded: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn record(&self, result: &Result<ScanRecord, ScanError>) {
        match result {
            Ok(record) => {
                self.scanned.fetch_add(1, Ordering::Relaxed);
                if record.risk_level == RiskLevel::High {
                    self.high_risk.fetch_add(1, Ordering::Relaxed);
                }
                if record.is_degraded() {
                    self.degraded.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(_) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn snapshot(&self) -> BatchStats {
        BatchStats {
            scanned: self.scanned.load(Ordering::Relaxed),
            high_risk: self.high_risk.load(Ordering::Relaxed),
            degraded: self.degraded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

pub struct BatchOutput {
    pub results: Vec<Result<ScanRecord, ScanError>>,
    pub stats: BatchStats,
}

pub fn run_batch(orchestrator: Arc<Orchestrator>, inputs: Vec<PathBuf>, workers: usize) -> BatchOutput {
    let started = Instant::now();
    let total = inputs.len();
    let worker_count = workers.max(1).min(total.max(1));
    let (job_tx, job_rx) = bounded::<BatchJob>(worker_count * JOBS_PER_WORKER);
    let (result_tx, result_rx) = unbounded::<(usize, Result<ScanRecord, ScanError>)>();
    let counters = Arc::new(Counters::default());

    let mut handles = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        let orchestrator = orchestrator.clone();
        let job_rx = job_rx.clone();
        let result_tx = result_tx.clone();
        let counters = counters.clone();
        handles.push(thread::spawn(move || {
            for job in job_rx {
                let result = orchestrator.scan_path(&job.path);
                if let Err(err) = &result {
                    warn!("scan of {} failed: {err}", job.path.display());
                }
                counters.record(&result);
                if result_tx.send((job.index, result)).is_err() {
                    break;
                }
            }
        }));
    }
    drop(job_rx);
    drop(result_tx);

    for (index, path) in inputs.into_iter().enumerate() {
        if job_tx.send(BatchJob { index, path }).is_err() {
            warn!("batch workers exited early; remaining inputs not scanned");
            break;
        }
    }
    drop(job_tx);

    let mut slots: Vec<Option<Result<ScanRecord, ScanError>>> = (0..total).map(|_| None).collect();
    for (index, result) in result_rx {
        slots[index] = Some(result);
    }
    for handle in handles {
        if handle.join().is_err() {
            warn!("batch worker panicked");
        }
    }

    let results: Vec<_> = slots
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| Err(ScanError::Internal("scan did not complete".into()))))
        .collect();
    let mut stats = counters.snapshot();
    stats.failed = results.iter().filter(|r| r.is_err()).count() as u64;

    info!(
        "batch finished: inputs={} scanned={} high_risk={} degraded={} failed={} elapsed={:.2}s",
        total,
        stats.scanned,
        stats.high_risk,
        stats.degraded,
        stats.failed,
        started.elapsed().as_secs_f64()
    );
    BatchOutput { results, stats }
}
