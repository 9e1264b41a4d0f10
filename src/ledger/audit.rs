//! Audit trail emitted alongside ledger mutations
//!
//! The engine hands one entry per recorded fact to an [`AuditSink`] after the
//! event's entity writes have landed. What the sink does with them (index
//! them as event entities, ship them elsewhere) is up to the caller.

use serde::Serialize;
use tracing::debug;

use super::events::EventMeta;
use crate::types::{Address, Amount, Units};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AuditEntry {
    MemberUnitsUpdated {
        meta: EventMeta,
        token: Address,
        pool: Address,
        pool_member: String,
        old_units: Units,
        units: Units,
        total_units: Units,
    },
    DistributionClaimed {
        meta: EventMeta,
        token: Address,
        pool: Address,
        pool_member: String,
        claimed_amount: Amount,
        total_claimed: Amount,
    },
    /// Snapshot log of an account-token aggregate after an event
    AccountTokenSnapshotLog {
        meta: EventMeta,
        event_name: &'static str,
        account: Address,
        token: Address,
    },
    /// Snapshot log of a token statistic after an event
    TokenStatisticLog {
        meta: EventMeta,
        event_name: &'static str,
        token: Address,
    },
}

/// Receives audit entries from the engine.
pub trait AuditSink {
    fn record(&mut self, entry: AuditEntry);
}

/// Keeps every entry in memory.
#[derive(Debug, Default)]
pub struct AuditLog {
    entries: Vec<AuditEntry>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }
}

impl AuditSink for AuditLog {
    fn record(&mut self, entry: AuditEntry) {
        debug!(?entry, "Audit entry");
        self.entries.push(entry);
    }
}

/// Discards entries after logging them at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAudit;

impl AuditSink for TracingAudit {
    fn record(&mut self, entry: AuditEntry) {
        debug!(?entry, "Audit entry");
    }
}
