//! Pending-gossip set and the broadcast engine.
//!
//! Each transaction still propagating owns a list of outstanding
//! [`DeliveryAttempt`]s. An attempt is a scheduled one-hop transmission
//! with its own elapsed-time counter; it delivers once the counter reaches
//! the edge latency *and* the sender still has bandwidth left in the
//! current step. Fan-out happens only when a new recipient learns a
//! transaction: the recipient schedules attempts toward its own unknowing
//! neighbours, which gives correct epidemic spread on arbitrary graphs
//! without pre-computing routes.
//!
//! Per-edge timers (rather than one clock per transaction) keep hops
//! independent: bandwidth exhaustion on a hot sender defers that sender's
//! deliveries without touching other senders of the same transaction.

use crate::knowledge::KnowledgeStore;
use crate::topology::Topology;
use meshsim_types::{PeerId, Transaction, TxId};
use std::collections::HashSet;
use tracing::trace;

/// A scheduled one-hop transmission of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryAttempt {
    /// Peer the transmission originates from.
    pub sender: PeerId,

    /// Peer the transmission is addressed to.
    pub receiver: PeerId,

    /// Time this attempt has been in flight, in milliseconds.
    pub elapsed_ms: u64,
}

impl DeliveryAttempt {
    fn new(sender: PeerId, receiver: PeerId) -> Self {
        Self {
            sender,
            receiver,
            elapsed_ms: 0,
        }
    }
}

/// A transaction still propagating, with its outstanding delivery attempts.
#[derive(Debug, Clone)]
pub struct PendingTx {
    /// The transaction being propagated.
    pub tx: Transaction,

    /// Outstanding delivery attempts, in scheduling order.
    pub attempts: Vec<DeliveryAttempt>,
}

/// Counters for one broadcast step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    /// Deliveries committed this step.
    pub delivered: u64,

    /// Attempts dropped because the receiver already knew the transaction.
    pub dropped_redundant: u64,

    /// Due attempts deferred because the sender's budget was exhausted.
    pub deferred_bandwidth: u64,
}

/// The set of transactions still propagating.
#[derive(Debug, Clone, Default)]
pub struct PendingSet {
    entries: Vec<PendingTx>,
}

impl PendingSet {
    /// Create an empty pending set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of transactions still propagating.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no transaction is propagating.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The pending entries, in processing order.
    pub fn entries(&self) -> &[PendingTx] {
        &self.entries
    }

    /// Enter a freshly injected transaction.
    ///
    /// The seed peer is assumed to already know the transaction; one attempt
    /// is scheduled from the seed to each of its neighbours.
    pub fn inject(&mut self, tx: Transaction, seed: PeerId, topology: &Topology) {
        let attempts = topology
            .neighbours(seed)
            .iter()
            .map(|link| DeliveryAttempt::new(seed, link.peer))
            .collect();
        self.entries.push(PendingTx { tx, attempts });
    }

    /// Advance every attempt by `step_ms` and deliver those that are due.
    ///
    /// `cap = bandwidth_kb_per_ms × step_ms` bounds the KB any single
    /// sender may originate this step; attempts from the same sender
    /// compete for the budget in traversal order. Attempts spawned by a
    /// delivery join the pending list but are not walked until the next
    /// call. A pending entry whose attempt list drains is dropped.
    pub fn broadcast(
        &mut self,
        step_ms: u64,
        bandwidth_kb_per_ms: f64,
        topology: &Topology,
        knowledge: &mut KnowledgeStore,
    ) -> BroadcastStats {
        let cap_kb = bandwidth_kb_per_ms * step_ms as f64;
        let mut transmitted = vec![0.0f64; topology.num_peers() as usize + 1];
        let mut stats = BroadcastStats::default();

        let mut remaining = Vec::with_capacity(self.entries.len());
        for mut pending in self.entries.drain(..) {
            let tx = pending.tx;
            // Attempts retained for the next step, plus any fan-out spawned
            // below. Only the drained attempts are walked this call.
            let mut retained = Vec::with_capacity(pending.attempts.len());
            for mut attempt in pending.attempts.drain(..) {
                attempt.elapsed_ms += step_ms;

                if knowledge.knows(attempt.receiver, tx.id) {
                    stats.dropped_redundant += 1;
                    continue;
                }

                let latency_ms = topology
                    .latency(attempt.sender, attempt.receiver)
                    .expect("attempt endpoints are adjacent")
                    as u64;
                if attempt.elapsed_ms < latency_ms {
                    retained.push(attempt);
                    continue;
                }

                let budget = &mut transmitted[attempt.sender.0 as usize];
                if *budget + tx.size_kb as f64 > cap_kb {
                    stats.deferred_bandwidth += 1;
                    retained.push(attempt);
                    continue;
                }
                *budget += tx.size_kb as f64;

                knowledge.mark(attempt.receiver, tx.id);
                stats.delivered += 1;
                for link in topology.neighbours(attempt.receiver) {
                    if link.peer != attempt.sender && !knowledge.knows(link.peer, tx.id) {
                        retained.push(DeliveryAttempt::new(attempt.receiver, link.peer));
                    }
                }
            }
            pending.attempts = retained;
            if !pending.attempts.is_empty() {
                remaining.push(pending);
            }
        }
        self.entries = remaining;

        trace!(
            step_ms,
            delivered = stats.delivered,
            deferred = stats.deferred_bandwidth,
            pending = self.entries.len(),
            "Broadcast step"
        );
        stats
    }

    /// Drop every pending entry whose transaction was just published.
    pub fn remove_published(&mut self, published: &HashSet<TxId>) {
        self.entries.retain(|pending| !published.contains(&pending.tx.id));
    }

    /// Drop all pending entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
