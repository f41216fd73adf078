//! Shared per-subscriber anomaly aggregate.
//!
//! Workers merge candidates into one map keyed by subscriber id; each
//! subscriber keeps only its winning candidate. The merge is commutative and
//! idempotent, so the final map does not depend on worker scheduling.

use std::collections::HashMap;
use std::sync::Mutex;

use audit_core::models::AnomalyCandidate;
use tracing::debug;

/// The cross-worker anomaly map, one winning candidate per subscriber.
#[derive(Debug, Default)]
pub struct AnomalyAggregate {
    latest: Mutex<HashMap<String, AnomalyCandidate>>,
}

impl AnomalyAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one candidate, keeping whichever of the incumbent and the
    /// newcomer wins under [`AnomalyCandidate::outranks`].
    ///
    /// The lock is held per candidate, not per file, so workers interleave
    /// freely on large batches.
    pub fn merge(&self, candidate: AnomalyCandidate) {
        // A poisoned lock only means another worker panicked mid-merge; the
        // map itself is still a valid aggregate, so keep going.
        let mut latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());

        match latest.entry(candidate.subscriber_id().to_string()) {
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(candidate);
            }
            std::collections::hash_map::Entry::Occupied(mut slot) => {
                if candidate.outranks(slot.get()) {
                    debug!(
                        "Subscriber {}: session {} supersedes {}",
                        candidate.subscriber_id(),
                        candidate.record.session_id,
                        slot.get().record.session_id,
                    );
                    slot.insert(candidate);
                }
            }
        }
    }

    /// Number of subscribers currently holding an anomaly.
    pub fn len(&self) -> usize {
        self.latest.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consume the aggregate into report rows, sorted by subscriber id.
    pub fn into_rows(self) -> Vec<AnomalyCandidate> {
        let latest = self.latest.into_inner().unwrap_or_else(|e| e.into_inner());
        Self::sorted(latest.into_values().collect())
    }

    /// Clone the current winners into sorted report rows without consuming
    /// the aggregate.
    pub fn rows_snapshot(&self) -> Vec<AnomalyCandidate> {
        let latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        Self::sorted(latest.values().cloned().collect())
    }

    fn sorted(mut rows: Vec<AnomalyCandidate>) -> Vec<AnomalyCandidate> {
        rows.sort_by(|a, b| a.subscriber_id().cmp(b.subscriber_id()));
        rows
    }
}
