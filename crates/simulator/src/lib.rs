//! meshsim batch driver.
//!
//! Builds experiment parameter records, runs the simulation engine once per
//! record, and serialises one CSV row per experiment.
//!
//! # Example
//!
//! ```ignore
//! use meshsim_simulator::{BatchRunner, ExperimentRecord};
//!
//! let mut runner = BatchRunner::new();
//! runner.run(ExperimentRecord::new().with_seed(42))?;
//! runner.write_csv("results.csv".as_ref())?;
//! runner.print_summary();
//! ```

mod config;
mod runner;

pub use config::ExperimentRecord;
pub use runner::BatchRunner;
