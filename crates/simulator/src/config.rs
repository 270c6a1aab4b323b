//! Experiment record configuration.

use meshsim_engine::{ExperimentParams, TopologyConfig};

/// One experiment to run: engine setup plus run parameters.
///
/// A record fully determines an experiment: the engine is built fresh from
/// it, so records are independent and reproducible from their seed.
#[derive(Debug, Clone)]
pub struct ExperimentRecord {
    /// Identifier written to the result CSV.
    pub id: u64,

    /// Engine PRNG seed.
    pub seed: u64,

    /// Overlay generation parameters.
    pub topology: TopologyConfig,

    /// Number of validators to select.
    pub validator_count: u32,

    /// Knowledge-bitmap rows. Together with the columns this bounds every
    /// transaction id the run may produce.
    pub known_rows: u64,

    /// Knowledge-bitmap columns.
    pub known_cols: u64,

    /// Minimum injected transaction size in KB.
    pub tx_size_min: u32,

    /// Maximum injected transaction size in KB.
    pub tx_size_max: u32,

    /// Run parameters.
    pub params: ExperimentParams,
}

impl Default for ExperimentRecord {
    fn default() -> Self {
        Self {
            id: 0,
            seed: 42,
            topology: TopologyConfig::default(),
            validator_count: 7,
            known_rows: 1_000_000,
            known_cols: 20,
            tx_size_min: 1,
            tx_size_max: 5,
            params: ExperimentParams::default(),
        }
    }
}

impl ExperimentRecord {
    /// Create a record with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the experiment id.
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }

    /// Set the engine seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the topology configuration.
    pub fn with_topology(mut self, topology: TopologyConfig) -> Self {
        self.topology = topology;
        self
    }

    /// Set the validator count.
    pub fn with_validators(mut self, validator_count: u32) -> Self {
        self.validator_count = validator_count;
        self
    }

    /// Set the knowledge-bitmap shape.
    pub fn with_known_shape(mut self, rows: u64, cols: u64) -> Self {
        self.known_rows = rows;
        self.known_cols = cols;
        self
    }

    /// Set the injected transaction size range, inclusive, in KB.
    pub fn with_tx_size_range(mut self, min_kb: u32, max_kb: u32) -> Self {
        self.tx_size_min = min_kb;
        self.tx_size_max = max_kb;
        self
    }

    /// Set the run parameters.
    pub fn with_params(mut self, params: ExperimentParams) -> Self {
        self.params = params;
        self
    }
}
