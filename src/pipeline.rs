//! Bounded-concurrency batch fetching.
//!
//! Every batch gets its own scoped thread up front; a fixed slot pool gates
//! how many of them are inside the fetch/retry loop at once. Each worker
//! signals completion exactly once when it terminates, whatever the outcome,
//! and successful package sets land in a sink sized to hold one per batch.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, warn};

use crate::config::FetchConfig;
use crate::domain::Batch;
use crate::ncbi::ArchiveClient;
use crate::package::PackageSet;
use crate::progress::{ProgressSink, report_progress};

#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub package_sets: Vec<PackageSet>,
    pub total_batches: usize,
    /// Batches that reached a terminal state, succeeded or not.
    pub completed: usize,
}

impl FetchOutcome {
    pub fn fetched_batches(&self) -> usize {
        self.package_sets.len()
    }

    pub fn dropped_batches(&self) -> usize {
        self.total_batches.saturating_sub(self.package_sets.len())
    }
}

/// Fetches one batch, retrying any failure with exponential backoff.
///
/// Returns `None` once `max_attempts` attempts have failed; the batch is then
/// abandoned and only a warning is left behind.
pub fn fetch_with_retry<C>(client: &C, batch: &Batch, config: &FetchConfig) -> Option<PackageSet>
where
    C: ArchiveClient + ?Sized,
{
    let mut last_error = None;
    for attempt in 0..config.max_attempts {
        match client.fetch_packages(batch) {
            Ok(set) => {
                debug!(
                    batch = batch.index(),
                    attempt,
                    packages = set.len(),
                    "batch fetched"
                );
                return Some(set);
            }
            Err(err) => {
                if attempt + 1 < config.max_attempts {
                    let delay = config.backoff_delay(attempt);
                    debug!(
                        batch = batch.index(),
                        attempt,
                        "fetch failed ({err}); retrying in {delay:?}"
                    );
                    thread::sleep(delay);
                }
                last_error = Some(err);
            }
        }
    }

    let reason = last_error
        .map(|err| err.to_string())
        .unwrap_or_else(|| "no attempts made".to_string());
    warn!(
        batch = batch.index(),
        ids = batch.len(),
        attempts = config.max_attempts,
        "dropping batch after retries: {reason}"
    );
    None
}

/// Fixed-capacity admission gate for batch workers.
///
/// A slot is a token in a bounded channel: acquiring blocks while the channel
/// is full, and releasing takes one token back out.
pub struct SlotPool {
    tokens: Sender<()>,
    returned: Receiver<()>,
}

impl SlotPool {
    pub fn new(capacity: usize) -> Self {
        let (tokens, returned) = crossbeam_channel::bounded(capacity.max(1));
        Self { tokens, returned }
    }

    pub fn acquire(&self) -> Slot<'_> {
        // The pool owns both ends, so the channel never disconnects.
        let _ = self.tokens.send(());
        Slot { pool: self }
    }

    pub fn in_use(&self) -> usize {
        self.tokens.len()
    }
}

/// Held while a worker runs; the slot goes back on drop, unwinding included.
pub struct Slot<'a> {
    pool: &'a SlotPool,
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        let _ = self.pool.returned.recv();
    }
}

/// Unordered collection of successful package sets.
pub struct Aggregator {
    deposit: Sender<PackageSet>,
    drain: Receiver<PackageSet>,
}

impl Aggregator {
    /// Sized so that every batch can deposit without blocking.
    pub fn with_capacity(batches: usize) -> Self {
        let (deposit, drain) = crossbeam_channel::bounded(batches.max(1));
        Self { deposit, drain }
    }

    pub fn depositor(&self) -> Sender<PackageSet> {
        self.deposit.clone()
    }

    /// Closes the sink and hands back everything deposited.
    ///
    /// Callers must have dropped every depositor first, otherwise this blocks.
    pub fn close_and_drain(self) -> Vec<PackageSet> {
        let Aggregator { deposit, drain } = self;
        drop(deposit);
        drain.iter().collect()
    }
}

/// Marks one batch terminal when dropped.
struct Completion<'a> {
    counter: &'a AtomicUsize,
    signal: Sender<()>,
}

impl Drop for Completion<'_> {
    fn drop(&mut self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
        let _ = self.signal.send(());
    }
}

/// Runs every batch through [`fetch_with_retry`] with at most
/// `config.max_workers` in flight, and blocks until all are terminal.
///
/// Progress goes to `sink` from a separate reporter thread fed by completion
/// signals, so a slow display never holds up a worker.
pub fn fetch_batches<C>(
    client: &C,
    batches: &[Batch],
    config: &FetchConfig,
    sink: &dyn ProgressSink,
) -> FetchOutcome
where
    C: ArchiveClient + ?Sized,
{
    let total = batches.len();
    let pool = SlotPool::new(config.max_workers);
    let aggregator = Aggregator::with_capacity(total);
    let completed = AtomicUsize::new(0);
    let (signal, completions) = crossbeam_channel::unbounded::<()>();

    thread::scope(|scope| {
        let reporter = scope.spawn(move || report_progress(completions, total, sink));

        let workers = batches
            .iter()
            .map(|batch| {
                let deposit = aggregator.depositor();
                let completion = Completion {
                    counter: &completed,
                    signal: signal.clone(),
                };
                let pool = &pool;
                scope.spawn(move || {
                    let _completion = completion;
                    let _slot = pool.acquire();
                    let result = panic::catch_unwind(AssertUnwindSafe(|| {
                        fetch_with_retry(client, batch, config)
                    }));
                    match result {
                        Ok(Some(set)) => {
                            let _ = deposit.send(set);
                        }
                        Ok(None) => {}
                        Err(_) => warn!(batch = batch.index(), "batch worker panicked"),
                    }
                })
            })
            .collect::<Vec<_>>();
        drop(signal);

        for worker in workers {
            let _ = worker.join();
        }
        if reporter.join().is_err() {
            warn!("progress reporter panicked");
        }
    });

    FetchOutcome {
        package_sets: aggregator.close_and_drain(),
        total_batches: total,
        completed: completed.load(Ordering::SeqCst),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_pool_counts_in_use() {
        let pool = SlotPool::new(2);
        let first = pool.acquire();
        let second = pool.acquire();
        assert_eq!(pool.in_use(), 2);
        drop(first);
        assert_eq!(pool.in_use(), 1);
        drop(second);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn aggregator_drains_deposits() {
        let aggregator = Aggregator::with_capacity(2);
        let deposit = aggregator.depositor();
        deposit.send(PackageSet::default()).unwrap();
        deposit.send(PackageSet::default()).unwrap();
        drop(deposit);
        assert_eq!(aggregator.close_and_drain().len(), 2);
    }
}
