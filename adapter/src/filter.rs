//! Retire queue records that appear in a new block.

use chaind_store::{Dispatcher, QueueStore};
use chaind_types::{BlockRef, ObservedTx, Status, TxHash};

use crate::{AdapterError, ChaindAdapter};

/// What a block did to the queue.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SettleReport {
    pub succeeded: Vec<TxHash>,
    pub failed: Vec<TxHash>,
    /// Records that had already failed to send. The block retired them and
    /// they keep that status.
    pub send_failed: Vec<TxHash>,
    /// Reserved by an in-flight dispatch; feed the block again later.
    pub locked: Vec<TxHash>,
    /// Transactions in the block the queue does not know.
    pub unknown: usize,
}

impl SettleReport {
    pub fn settled(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.send_failed.len()
    }
}

/// Matches the transactions of a block against the queue.
#[derive(Clone, Copy, Debug, Default)]
pub struct BlockFilter;

impl BlockFilter {
    pub fn filter<S: QueueStore, D: Dispatcher>(
        &self,
        adapter: &ChaindAdapter<S, D>,
        block: BlockRef,
        txs: &[ObservedTx],
    ) -> Result<SettleReport, AdapterError> {
        let mut report = SettleReport::default();
        for tx in txs {
            if !adapter.contains(&tx.hash)? {
                report.unknown += 1;
                continue;
            }
            let settled = if tx.success {
                adapter.succeed(block, tx)
            } else {
                adapter.fail(block, tx)
            };
            match settled {
                Ok(record) => match record.state() {
                    Some(Status::Success) => report.succeeded.push(tx.hash),
                    Some(Status::Reverted) => report.failed.push(tx.hash),
                    _ => report.send_failed.push(tx.hash),
                },
                Err(AdapterError::QueueLocked(hash)) => {
                    tracing::debug!(hash = %hash, block = block.number, "record reserved, settle later");
                    report.locked.push(hash);
                }
                // Settled or reaped by another process since `contains`.
                Err(e) if e.is_not_found() => {
                    tracing::debug!(hash = %tx.hash, block = block.number, "record left the queue");
                    report.unknown += 1;
                }
                Err(e) => return Err(e),
            }
        }
        tracing::debug!(
            block = block.number,
            txs = txs.len(),
            settled = report.settled(),
            locked = report.locked.len(),
            "block filtered"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AdapterBuilder, RetryPolicy};
    use chaind_nullables::{NullDispatcher, NullQueueStore};
    use chaind_types::ChainSpec;

    fn adapter() -> ChaindAdapter<NullQueueStore, NullDispatcher> {
        AdapterBuilder::new(ChainSpec::default(), NullDispatcher::new())
            .retry(RetryPolicy::immediate(3))
            .open(|| Ok(NullQueueStore::new()))
            .unwrap()
    }

    #[test]
    fn settles_known_transactions() {
        let adapter = adapter();
        let ok = adapter.put(b"ok").unwrap();
        let reverted = adapter.put(b"reverted").unwrap();
        for h in [ok, reverted] {
            adapter.enqueue(&h).unwrap();
            assert!(adapter.dispatch(&h).unwrap());
        }
        let txs = [
            ObservedTx::new(TxHash::of(b"someone else"), 0, true),
            ObservedTx::new(ok, 1, true),
            ObservedTx::new(reverted, 2, false),
        ];

        let report = BlockFilter.filter(&adapter, BlockRef::new(9), &txs).unwrap();

        assert_eq!(report.succeeded, vec![ok]);
        assert_eq!(report.failed, vec![reverted]);
        assert_eq!(report.unknown, 1);
        assert_eq!(report.settled(), 2);
        assert_eq!(adapter.in_flight().unwrap(), 0);
        assert!(adapter.store().is_empty());
    }

    #[test]
    fn reserved_records_are_reported_locked() {
        let adapter = adapter();
        let hash = adapter.put(b"tx").unwrap();
        adapter.store().force_status(&hash, Status::Reserved.bits());

        let report = BlockFilter
            .filter(&adapter, BlockRef::new(1), &[ObservedTx::new(hash, 0, true)])
            .unwrap();

        assert_eq!(report.locked, vec![hash]);
        assert_eq!(report.settled(), 0);
        assert!(adapter.contains(&hash).unwrap());
    }

    #[test]
    fn refeeding_a_block_is_harmless() {
        let adapter = adapter();
        let hash = adapter.put(b"tx").unwrap();
        let txs = [ObservedTx::new(hash, 0, true)];

        let first = BlockFilter.filter(&adapter, BlockRef::new(5), &txs).unwrap();
        let second = BlockFilter.filter(&adapter, BlockRef::new(5), &txs).unwrap();

        assert_eq!(first.succeeded, vec![hash]);
        assert_eq!(second.unknown, 1);
    }

    #[test]
    fn record_gone_before_settle_counts_as_unknown() {
        let adapter = adapter();
        let gone = adapter.put(b"gone").unwrap();
        let kept = adapter.put(b"kept").unwrap();
        adapter.store().vanish_on_next_use(gone);
        let txs = [ObservedTx::new(gone, 0, true), ObservedTx::new(kept, 1, true)];

        let report = BlockFilter.filter(&adapter, BlockRef::new(2), &txs).unwrap();

        assert_eq!(report.unknown, 1);
        assert_eq!(report.succeeded, vec![kept]);
        assert!(adapter.store().is_empty());
    }

    #[test]
    fn already_failed_sends_are_reported_apart() {
        let adapter = AdapterBuilder::new(
            ChainSpec::default(),
            NullDispatcher::rejecting(-32000, "nonce too low"),
        )
        .retry(RetryPolicy::immediate(3))
        .open(|| Ok(NullQueueStore::new()))
        .unwrap();
        let hash = adapter.put(b"tx").unwrap();
        adapter.enqueue(&hash).unwrap();
        assert!(!adapter.dispatch(&hash).unwrap());

        let report = BlockFilter
            .filter(&adapter, BlockRef::new(4), &[ObservedTx::new(hash, 0, true)])
            .unwrap();

        assert!(report.succeeded.is_empty());
        assert_eq!(report.send_failed, vec![hash]);
        assert_eq!(report.settled(), 1);
        assert!(!adapter.contains(&hash).unwrap());
    }
}
