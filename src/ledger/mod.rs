//! Derived accounting ledger
//!
//! - `events`: protocol events with their chain position
//! - `entities`: pools, members, account snapshots, streams, indexes
//! - `store`: keyed entity persistence (memory, SQLite)
//! - `engine`: applies events to the store in chain order
//! - `audit`: per-event audit trail
//! - `invariants`: local conservation checks

pub mod audit;
pub mod engine;
pub mod entities;
pub mod events;
pub mod invariants;
pub mod store;

pub use audit::{AuditEntry, AuditLog, AuditSink, TracingAudit};
pub use engine::LedgerEngine;
pub use entities::{
    AccountTokenSnapshot, Entity, EntityKind, Index, LedgerCheckpoint, Pool, PoolMember, Stream,
    Subscription, TokenStatistic,
};
pub use events::{EventMeta, EventPosition, ProtocolEvent, SequencedEvent};
pub use invariants::Violation;
pub use store::{LedgerStore, MemoryStore, SqliteStore};
