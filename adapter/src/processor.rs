//! One scheduling pass: pick what may be sent and send it.

use chaind_store::{Dispatcher, QueueStore, StoreError};
use chaind_utils::StatsCounter;

use crate::{AdapterError, ChaindAdapter};

const STAT_PASSES: &str = "passes";
const STAT_SENT: &str = "sent";
const STAT_NOT_SENT: &str = "not_sent";
const STAT_SKIPPED: &str = "skipped";

/// Outcome of one [`DispatchProcessor::process`] pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Hashes returned by `upcoming`.
    pub selected: usize,
    /// Accepted by the node.
    pub sent: usize,
    /// Rejected or deferred.
    pub not_sent: usize,
    /// Left alone: busy past the retry bound or taken by another scheduler.
    pub skipped: usize,
}

pub struct DispatchProcessor {
    limit: usize,
    stats: StatsCounter,
}

impl DispatchProcessor {
    /// `limit` caps records in flight; 0 means no cap.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            stats: StatsCounter::new(&[STAT_PASSES, STAT_SENT, STAT_NOT_SENT, STAT_SKIPPED]),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Totals across all passes.
    pub fn stats(&self) -> &StatsCounter {
        &self.stats
    }

    pub fn process<S: QueueStore, D: Dispatcher>(
        &self,
        adapter: &ChaindAdapter<S, D>,
    ) -> Result<DispatchReport, AdapterError> {
        let hashes = adapter.upcoming(self.limit)?;
        let mut report = DispatchReport {
            selected: hashes.len(),
            ..DispatchReport::default()
        };

        for hash in hashes {
            match adapter.dispatch(&hash) {
                Ok(true) => report.sent += 1,
                Ok(false) => report.not_sent += 1,
                Err(e @ AdapterError::RetryExhausted { .. }) => {
                    tracing::warn!(hash = %hash, error = %e, "skipping busy record");
                    report.skipped += 1;
                }
                // Another scheduler reserved it between selection and send.
                Err(AdapterError::Store(StoreError::Transition { from, .. })) => {
                    tracing::debug!(hash = %hash, from = ?from, "record taken elsewhere");
                    report.skipped += 1;
                }
                // Settled or purged elsewhere since selection.
                Err(e) if e.is_not_found() => {
                    tracing::debug!(hash = %hash, "record left the queue");
                    report.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        self.stats.increment(STAT_PASSES);
        self.stats.add(STAT_SENT, report.sent as u64);
        self.stats.add(STAT_NOT_SENT, report.not_sent as u64);
        self.stats.add(STAT_SKIPPED, report.skipped as u64);
        if report.selected > 0 {
            tracing::info!(
                selected = report.selected,
                sent = report.sent,
                not_sent = report.not_sent,
                skipped = report.skipped,
                "dispatch pass"
            );
        }
        Ok(report)
    }
}
