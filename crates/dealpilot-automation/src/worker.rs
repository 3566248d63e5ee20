//! Bounded worker pool feeding signals into the engine.
//!
//! Signals from many calls are processed concurrently by a fixed number of
//! workers sharing one bounded queue. Two signals for the same (rule, deal)
//! pair may land on different workers; the engine's cooldown slots keep
//! them from both firing.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use dealpilot_core::types::{ExecutionStatus, Signal};

use crate::engine::{AutomationEngine, SignalReport};
use crate::error::AutomationError;

/// Totals across everything the pool processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub signals_processed: u64,
    /// Signals the engine refused or could not finish (invalid signal, rule
    /// store down, aborted evaluation).
    pub signals_rejected: u64,
    pub success: u64,
    pub failed: u64,
    pub skipped: u64,
    /// Log entries that could not be persisted.
    pub unlogged: u64,
}

impl PoolStats {
    fn record(&mut self, report: &SignalReport) {
        self.signals_processed += 1;
        for outcome in &report.outcomes {
            match outcome.status {
                ExecutionStatus::Success => self.success += 1,
                ExecutionStatus::Failed => self.failed += 1,
                ExecutionStatus::Skipped => self.skipped += 1,
            }
            if !outcome.logged {
                self.unlogged += 1;
            }
        }
    }
}

pub struct SignalWorkerPool {
    sender: Mutex<Option<mpsc::Sender<Signal>>>,
    workers: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
    stats: Arc<Mutex<PoolStats>>,
}

impl SignalWorkerPool {
    /// Spawn `workers` tasks reading from a queue of `capacity` signals.
    pub fn spawn(engine: Arc<AutomationEngine>, workers: usize, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let stats = Arc::new(Mutex::new(PoolStats::default()));

        let handles = (0..workers.max(1))
            .map(|worker| {
                tokio::spawn(run_worker(
                    worker,
                    Arc::clone(&engine),
                    Arc::clone(&receiver),
                    Arc::clone(&stats),
                ))
            })
            .collect();

        tracing::info!(workers = workers.max(1), capacity = capacity.max(1), "Signal workers started");

        Self {
            sender: Mutex::new(Some(sender)),
            workers: tokio::sync::Mutex::new(handles),
            stats,
        }
    }

    /// Queue a signal, waiting while the queue is full.
    pub async fn submit(&self, signal: Signal) -> Result<(), AutomationError> {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(AutomationError::QueueClosed)?;
        sender
            .send(signal)
            .await
            .map_err(|_| AutomationError::QueueClosed)
    }

    pub fn stats(&self) -> PoolStats {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stop accepting signals, let the workers drain the queue, and wait
    /// for them to finish.
    pub async fn shutdown(&self) -> PoolStats {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let handles = std::mem::take(&mut *self.workers.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Signal worker panicked");
            }
        }

        let stats = self.stats();
        tracing::info!(
            processed = stats.signals_processed,
            rejected = stats.signals_rejected,
            "Signal workers stopped"
        );
        stats
    }
}

async fn run_worker(
    worker: usize,
    engine: Arc<AutomationEngine>,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<Signal>>>,
    stats: Arc<Mutex<PoolStats>>,
) {
    loop {
        // Hold the receiver only while waiting, not while processing.
        let next = receiver.lock().await.recv().await;
        let Some(signal) = next else {
            tracing::debug!(worker, "Signal queue closed, worker exiting");
            return;
        };

        match engine.process_signal(&signal).await {
            Ok(report) => {
                stats
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .record(&report);
            }
            Err(e) => {
                tracing::warn!(
                    worker,
                    deal_id = %signal.deal_id,
                    error = %e,
                    "Signal rejected"
                );
                stats
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .signals_rejected += 1;
            }
        }
    }
}
