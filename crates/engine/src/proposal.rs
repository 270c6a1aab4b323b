//! Block proposal and publication outcome types.

use meshsim_types::{PeerId, Transaction};

/// The candidate block currently under quorum evaluation.
///
/// Assembled by `prepare_request` from transactions the chosen proposer
/// knows; cleared when the block is published, normally or forced.
#[derive(Debug, Clone, Default)]
pub struct ProposedBlock {
    /// Transactions in proposal order.
    pub transactions: Vec<Transaction>,

    /// Cumulative size of the block in KB.
    pub size_kb: u64,
}

impl ProposedBlock {
    /// Number of transactions in the block.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Whether the block holds no transactions.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

/// Outcome of a single publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Quorum met; the block was published.
    Published {
        /// Transactions published.
        count: usize,
        /// Published volume in KB.
        size_kb: u64,
    },

    /// Quorum failed for a full blocktime; the block was published anyway
    /// at a latency penalty.
    Forced {
        /// Transactions published.
        count: usize,
        /// Published volume in KB.
        size_kb: u64,
        /// Penalty to charge to the simulated clock.
        penalty_ms: u64,
    },

    /// Quorum not met; the block stays outstanding.
    Retry,

    /// No block outstanding.
    NoBlock,
}

impl PublishOutcome {
    /// Number of transactions published by this attempt.
    pub fn published(&self) -> usize {
        match self {
            Self::Published { count, .. } | Self::Forced { count, .. } => *count,
            Self::Retry | Self::NoBlock => 0,
        }
    }

    /// Whether this attempt force-published.
    pub fn is_forced(&self) -> bool {
        matches!(self, Self::Forced { .. })
    }
}

/// Per-validator view of an outstanding proposal.
///
/// Diagnostic value: how much of the proposed block each validator
/// currently knows, and the average across validators.
#[derive(Debug, Clone)]
pub struct ProposalSummary {
    /// Percentage of the proposed block each validator knows.
    pub per_validator: Vec<(PeerId, f64)>,

    /// Average percentage across validators.
    pub average_pct: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_published_counts() {
        assert_eq!(
            PublishOutcome::Published {
                count: 3,
                size_kb: 9
            }
            .published(),
            3
        );
        assert_eq!(
            PublishOutcome::Forced {
                count: 2,
                size_kb: 4,
                penalty_ms: 6000
            }
            .published(),
            2
        );
        assert_eq!(PublishOutcome::Retry.published(), 0);
        assert_eq!(PublishOutcome::NoBlock.published(), 0);
        assert!(PublishOutcome::Forced {
            count: 2,
            size_kb: 4,
            penalty_ms: 6000
        }
        .is_forced());
    }
}
