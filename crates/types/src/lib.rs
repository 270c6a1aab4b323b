//! Core types for the meshsim gossip simulator.
//!
//! This crate provides the foundational types shared by the simulation
//! engine and the batch driver:
//!
//! - **Identifiers**: [`PeerId`], [`TxId`]
//! - **Value types**: [`Transaction`]
//! - **Quorum arithmetic**: [`bft_quorum`]
//! - **Results**: [`ExperimentResult`]
//!
//! # Design Philosophy
//!
//! This crate is self-contained with no dependencies. It does not depend on
//! any other workspace crates, making it the foundation layer.

mod identifiers;
mod quorum;
mod result;
mod transaction;

pub use identifiers::{PeerId, TxId};
pub use quorum::bft_quorum;
pub use result::ExperimentResult;
pub use transaction::Transaction;
