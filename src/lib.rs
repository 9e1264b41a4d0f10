//! flow-ledger - derived accounting ledger for continuous flows and
//! distribution pools, with reconciliation against on-chain state
//!
//! ## Components
//!
//! - **Ledger**: event-sourced pool/member/account accounting with exact
//!   integer accumulators
//! - **Indexer**: paginated, block-pinned reads of the derived dataset
//! - **Chain**: point-in-time reads of the authoritative agreements
//! - **Verify**: bounded-concurrency record checks and the global net-flow
//!   invariant

pub mod chain;
pub mod config;
pub mod error;
pub mod indexer;
pub mod ledger;
pub mod math;
pub mod types;
pub mod verify;

pub use config::Config;
pub use error::{ChainError, ConfigError, IndexerError, LedgerError, VerifyError};
pub use ledger::LedgerEngine;
pub use types::{Address, Amount, FlowRate, Units};
pub use verify::{VerificationReport, Verifier};
