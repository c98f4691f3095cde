//! Running totals for one worker process.

use std::fmt;

use crate::CycleOutcome;

/// Counts of cycle outcomes since the worker started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Cycles started.
    pub cycles: u64,
    /// Polls that found nothing pending.
    pub empty_polls: u64,
    /// Tiles that were already resolved and were skipped.
    pub skipped: u64,
    /// Tiles geocoded and persisted.
    pub resolved: u64,
    /// Geocoding attempts deferred to a later delivery.
    pub deferred: u64,
    /// Deferrals caused by an exhausted (or suspected exhausted) quota.
    pub quota_signals: u64,
    /// Tile ids dropped because they could not be parsed.
    pub invalid: u64,
    /// Queue or tile store failures.
    pub errors: u64,
    /// Items processed but whose acknowledgment failed.
    pub unacknowledged: u64,
    /// Items from a queue that does not redeliver that were still waiting
    /// for a retry when the run ended.
    pub lost: u64,
}

impl WorkerStats {
    /// Folds one cycle outcome into the totals.
    pub fn record(&mut self, outcome: &CycleOutcome) {
        self.cycles += 1;
        match outcome {
            CycleOutcome::Empty => self.empty_polls += 1,
            CycleOutcome::QueueUnavailable | CycleOutcome::CheckFailed { .. } => {
                self.errors += 1;
            }
            CycleOutcome::PersistFailed { .. } => self.errors += 1,
            CycleOutcome::AlreadyResolved { acknowledged, .. } => {
                self.skipped += 1;
                if !*acknowledged {
                    self.unacknowledged += 1;
                }
            }
            CycleOutcome::InvalidTile { acknowledged, .. } => {
                self.invalid += 1;
                if !*acknowledged {
                    self.unacknowledged += 1;
                }
            }
            CycleOutcome::Deferred { cause, .. } => {
                self.deferred += 1;
                if cause.is_quota_signal() {
                    self.quota_signals += 1;
                }
            }
            CycleOutcome::Resolved { acknowledged, .. } => {
                self.resolved += 1;
                if !*acknowledged {
                    self.unacknowledged += 1;
                }
            }
        }
    }
}

impl fmt::Display for WorkerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cycles: {} resolved, {} skipped, {} deferred ({} quota), {} empty, {} invalid, {} errors, {} unacknowledged, {} lost",
            self.cycles,
            self.resolved,
            self.skipped,
            self.deferred,
            self.quota_signals,
            self.empty_polls,
            self.invalid,
            self.errors,
            self.unacknowledged,
            self.lost,
        )
    }
}
