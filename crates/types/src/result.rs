//! Experiment result record.

/// Aggregate metrics returned by a single experiment run.
///
/// Two clocks are reported: `total_simulated_time_ms` includes the latency
/// penalties charged for forced publications and is the denominator for the
/// throughput figures; `official_time_ms` counts only the stepped
/// injection/broadcast time.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentResult {
    /// Total simulated time in milliseconds, including forced-publish
    /// penalties.
    pub total_simulated_time_ms: u64,

    /// Simulated time excluding forced-publish penalties.
    pub official_time_ms: u64,

    /// Transactions published, normally or forced.
    pub total_published: u64,

    /// Published transactions per simulated second.
    pub tps: f64,

    /// Total published volume in megabytes.
    pub published_mb: f64,

    /// Published volume per simulated second.
    pub mb_per_sec: f64,

    /// Number of forced publications.
    pub forced_publish_count: u64,

    /// Transactions injected but never published.
    pub final_pending_count: u64,
}
