//! Discrete-event simulation engine for transaction gossip and block
//! publication on a partially-connected peer-to-peer overlay.
//!
//! The engine models an epidemic gossip layer under per-sender bandwidth
//! budgets, together with a BFT-style publication rule: a randomly chosen
//! validator proposes a block of transactions it knows, and the block is
//! published once a quorum of validators each know enough of it. Proposals
//! that fail the quorum for a full blocktime are published anyway at a
//! latency penalty ("forced" publication).
//!
//! # Architecture
//!
//! - **[`Topology`]**: immutable weighted overlay graph
//! - **[`Roles`]**: validator/seed partition and the quorum size
//! - **[`KnowledgeStore`]**: packed per-peer knowledge bitmaps
//! - **[`PendingSet`]**: outstanding delivery attempts and the broadcast step
//! - **[`SimulationEngine`]**: proposal/publication state machine and the
//!   experiment orchestrator
//!
//! Everything is single-threaded: simulated time is an integer millisecond
//! counter advanced explicitly by the orchestrator, and all randomness flows
//! through one seeded [`rand_chacha::ChaCha8Rng`], so a run is fully
//! reproducible from its seed.
//!
//! # Example
//!
//! ```ignore
//! use meshsim_engine::{ExperimentParams, SimulationEngine, TopologyConfig};
//!
//! let mut engine = SimulationEngine::new(42);
//! engine.build_topology(&TopologyConfig::default());
//! engine.select_validators(7)?;
//!
//! let result = engine.run_experiment(&ExperimentParams::default())?;
//! println!("TPS: {:.2}", result.tps);
//! ```

mod engine;
mod error;
mod gossip;
mod knowledge;
mod proposal;
mod roles;
mod topology;

pub use engine::{ExperimentParams, SimulationEngine};
pub use error::EngineError;
pub use gossip::{BroadcastStats, DeliveryAttempt, PendingSet, PendingTx};
pub use knowledge::{Bitmap, KnowledgeStore};
pub use proposal::{ProposalSummary, ProposedBlock, PublishOutcome};
pub use roles::Roles;
pub use topology::{Link, Topology, TopologyConfig};
