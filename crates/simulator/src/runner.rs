//! Batch runner: one engine per record, CSV serialisation.

use crate::config::ExperimentRecord;
use meshsim_engine::{EngineError, SimulationEngine};
use meshsim_types::ExperimentResult;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Header of the result CSV. All fields are numeric or boolean, so no
/// quoting is needed.
const CSV_HEADER: &str = "experiment_id,seed,num_peers,full_mesh,min_connections,\
max_connections,delay_min_ms,delay_max_ms,delay_multiplier,validators,\
total_sim_ms,injection_count,step_ms,threshold_pct,blocktime_ms,\
bandwidth_kb_per_ms,max_tx_per_block,max_block_kb,\
total_simulated_time_ms,official_time_ms,total_published,tps,published_mb,\
mb_per_sec,forced_publish_count,final_pending_count";

/// Runs a batch of experiment records and serialises their results.
#[derive(Debug, Default)]
pub struct BatchRunner {
    completed: Vec<(ExperimentRecord, ExperimentResult)>,
}

impl BatchRunner {
    /// Create an empty runner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an engine from `record` and run its experiment.
    pub fn run(&mut self, record: ExperimentRecord) -> Result<ExperimentResult, EngineError> {
        let mut engine = SimulationEngine::new(record.seed);
        engine.set_known_shape(record.known_rows, record.known_cols);
        engine.set_tx_size_range(record.tx_size_min, record.tx_size_max);
        engine.build_topology(&record.topology);
        engine.select_validators(record.validator_count)?;

        let result = engine.run_experiment(&record.params)?;
        info!(
            id = record.id,
            seed = record.seed,
            tps = result.tps,
            published = result.total_published,
            forced = result.forced_publish_count,
            "Experiment finished"
        );
        self.completed.push((record, result.clone()));
        Ok(result)
    }

    /// The completed experiments, in run order.
    pub fn results(&self) -> &[(ExperimentRecord, ExperimentResult)] {
        &self.completed
    }

    /// Write all completed experiments to a CSV file, header row included.
    pub fn write_csv(&self, path: &Path) -> io::Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_csv_to(&mut writer)?;
        writer.flush()
    }

    /// Write the CSV to any writer.
    pub fn write_csv_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writeln!(writer, "{CSV_HEADER}")?;
        for (record, result) in &self.completed {
            let t = &record.topology;
            let p = &record.params;
            writeln!(
                writer,
                "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
                record.id,
                record.seed,
                t.num_peers,
                t.full_mesh,
                t.min_connections,
                t.max_connections,
                t.delay_min_ms,
                t.delay_max_ms,
                t.delay_multiplier,
                record.validator_count,
                p.total_sim_ms,
                p.injection_count,
                p.step_ms,
                p.threshold_pct,
                p.blocktime_ms,
                p.bandwidth_kb_per_ms,
                p.max_tx_per_block,
                p.max_block_kb,
                result.total_simulated_time_ms,
                result.official_time_ms,
                result.total_published,
                result.tps,
                result.published_mb,
                result.mb_per_sec,
                result.forced_publish_count,
                result.final_pending_count,
            )?;
        }
        Ok(())
    }

    /// Print a human-readable summary of all completed experiments.
    pub fn print_summary(&self) {
        println!();
        println!("==================== EXPERIMENT RESULTS ====================");
        println!(
            "{:>4} {:>12} {:>12} {:>10} {:>10} {:>8} {:>10}",
            "id", "sim ms", "published", "tps", "MB/s", "forced", "pending"
        );
        println!("{}", "-".repeat(72));
        for (record, result) in &self.completed {
            println!(
                "{:>4} {:>12} {:>12} {:>10.2} {:>10.3} {:>8} {:>10}",
                record.id,
                result.total_simulated_time_ms,
                result.total_published,
                result.tps,
                result.mb_per_sec,
                result.forced_publish_count,
                result.final_pending_count,
            );
        }
        println!("============================================================");
    }
}
