//! Derived ledger entities
//!
//! Every entity carries its own string id so it can be persisted as a keyed
//! JSON document. Relations (member to pool, subscription to index) are
//! stored as ids and resolved through the store; no entity owns another.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::events::{EventMeta, EventPosition};
use crate::types::{Address, Amount, FlowRate, Units};

/// Discriminates entity tables in a [`LedgerStore`](super::store::LedgerStore).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Pool,
    PoolMember,
    AccountTokenSnapshot,
    TokenStatistic,
    Stream,
    Index,
    Subscription,
    Checkpoint,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pool => "pool",
            Self::PoolMember => "pool_member",
            Self::AccountTokenSnapshot => "account_token_snapshot",
            Self::TokenStatistic => "token_statistic",
            Self::Stream => "stream",
            Self::Index => "index",
            Self::Subscription => "subscription",
            Self::Checkpoint => "checkpoint",
        }
    }
}

/// A persistable ledger record.
pub trait Entity: Serialize + DeserializeOwned + Clone {
    const KIND: EntityKind;

    fn id(&self) -> String;
}

// ============================================================================
// Distribution pools
// ============================================================================

/// Proportional distribution pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub id: Address,
    pub token: Address,
    pub created_at_timestamp: u64,
    pub updated_at_timestamp: u64,
    pub updated_at_block_number: u64,

    pub total_units: Units,
    pub total_connected_units: Units,
    pub total_disconnected_units: Units,
    pub total_members: u64,
    pub total_connected_members: u64,
    pub total_disconnected_members: u64,

    /// Current value accrual rate per unit
    pub per_unit_flow_rate: FlowRate,
    /// Value accrued per unit since creation, settled at `updated_at_timestamp`
    pub per_unit_settled_value: Amount,
    pub flow_rate: FlowRate,
    pub adjustment_flow_rate: FlowRate,

    pub total_amount_flowed_distributed_until_updated_at: Amount,
    pub total_amount_instantly_distributed_until_updated_at: Amount,
    pub total_amount_distributed_until_updated_at: Amount,
}

impl Pool {
    pub fn new(id: Address, token: Address, meta: &EventMeta) -> Self {
        Self {
            id,
            token,
            created_at_timestamp: meta.timestamp,
            updated_at_timestamp: meta.timestamp,
            updated_at_block_number: meta.block_number,
            total_units: 0,
            total_connected_units: 0,
            total_disconnected_units: 0,
            total_members: 0,
            total_connected_members: 0,
            total_disconnected_members: 0,
            per_unit_flow_rate: 0,
            per_unit_settled_value: 0,
            flow_rate: 0,
            adjustment_flow_rate: 0,
            total_amount_flowed_distributed_until_updated_at: 0,
            total_amount_instantly_distributed_until_updated_at: 0,
            total_amount_distributed_until_updated_at: 0,
        }
    }
}

impl Entity for Pool {
    const KIND: EntityKind = EntityKind::Pool;

    fn id(&self) -> String {
        self.id.to_string()
    }
}

/// Unit holder in a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolMember {
    pub id: String,
    /// Owning pool, resolved through the store
    pub pool: Address,
    pub account: Address,
    pub created_at_timestamp: u64,
    pub updated_at_timestamp: u64,

    pub units: Units,
    pub is_connected: bool,
    /// Pool per-unit flow rate at last settlement, plus any remainder
    /// attributed to this member
    pub synced_per_unit_flow_rate: FlowRate,
    pub synced_per_unit_settled_value: Amount,
    pub total_amount_received_until_updated_at: Amount,
    pub total_amount_claimed: Amount,
}

impl PoolMember {
    pub fn id_for(pool: &Address, account: &Address) -> String {
        format!("{}-{}", pool, account)
    }

    pub fn new(pool: Address, account: Address, meta: &EventMeta) -> Self {
        Self {
            id: Self::id_for(&pool, &account),
            pool,
            account,
            created_at_timestamp: meta.timestamp,
            updated_at_timestamp: meta.timestamp,
            units: 0,
            is_connected: false,
            synced_per_unit_flow_rate: 0,
            synced_per_unit_settled_value: 0,
            total_amount_received_until_updated_at: 0,
            total_amount_claimed: 0,
        }
    }
}

impl Entity for PoolMember {
    const KIND: EntityKind = EntityKind::PoolMember;

    fn id(&self) -> String {
        self.id.clone()
    }
}

// ============================================================================
// Accounts, tokens and streams
// ============================================================================

/// Per (account, token) aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountTokenSnapshot {
    pub id: String,
    pub account: Address,
    pub token: Address,
    pub updated_at_timestamp: u64,
    pub updated_at_block_number: u64,

    /// Inflows minus outflows, across streams and pool distributions
    pub total_net_flow_rate: FlowRate,
    pub total_inflow_rate: FlowRate,
    pub total_outflow_rate: FlowRate,
    pub active_incoming_stream_count: u64,
    pub active_outgoing_stream_count: u64,
    pub total_memberships_with_units: u64,
    pub total_connected_memberships: u64,

    pub balance_until_updated_at: Amount,
    pub total_amount_streamed_out_until_updated_at: Amount,
}

impl AccountTokenSnapshot {
    pub fn id_for(account: &Address, token: &Address) -> String {
        format!("{}-{}", account, token)
    }

    pub fn new(account: Address, token: Address, meta: &EventMeta) -> Self {
        Self {
            id: Self::id_for(&account, &token),
            account,
            token,
            updated_at_timestamp: meta.timestamp,
            updated_at_block_number: meta.block_number,
            total_net_flow_rate: 0,
            total_inflow_rate: 0,
            total_outflow_rate: 0,
            active_incoming_stream_count: 0,
            active_outgoing_stream_count: 0,
            total_memberships_with_units: 0,
            total_connected_memberships: 0,
            balance_until_updated_at: 0,
            total_amount_streamed_out_until_updated_at: 0,
        }
    }
}

impl Entity for AccountTokenSnapshot {
    const KIND: EntityKind = EntityKind::AccountTokenSnapshot;

    fn id(&self) -> String {
        self.id.clone()
    }
}

/// Network-wide aggregate for one token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenStatistic {
    pub id: Address,
    pub updated_at_timestamp: u64,
    pub total_outflow_rate: FlowRate,
    pub total_number_of_active_streams: u64,
    pub total_amount_streamed_until_updated_at: Amount,
    pub total_amount_distributed_until_updated_at: Amount,
}

impl TokenStatistic {
    pub fn new(token: Address, meta: &EventMeta) -> Self {
        Self {
            id: token,
            updated_at_timestamp: meta.timestamp,
            total_outflow_rate: 0,
            total_number_of_active_streams: 0,
            total_amount_streamed_until_updated_at: 0,
            total_amount_distributed_until_updated_at: 0,
        }
    }
}

impl Entity for TokenStatistic {
    const KIND: EntityKind = EntityKind::TokenStatistic;

    fn id(&self) -> String {
        self.id.to_string()
    }
}

/// Constant flow from sender to receiver. A zero rate marks it deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    pub id: String,
    pub token: Address,
    pub sender: Address,
    pub receiver: Address,
    pub current_flow_rate: FlowRate,
    pub created_at_timestamp: u64,
    pub updated_at_timestamp: u64,
    pub streamed_until_updated_at: Amount,
}

impl Stream {
    pub fn id_for(token: &Address, sender: &Address, receiver: &Address) -> String {
        format!("{}-{}-{}", sender, receiver, token)
    }

    pub fn new(token: Address, sender: Address, receiver: Address, meta: &EventMeta) -> Self {
        Self {
            id: Self::id_for(&token, &sender, &receiver),
            token,
            sender,
            receiver,
            current_flow_rate: 0,
            created_at_timestamp: meta.timestamp,
            updated_at_timestamp: meta.timestamp,
            streamed_until_updated_at: 0,
        }
    }

    pub fn is_current(&self) -> bool {
        self.current_flow_rate != 0
    }
}

impl Entity for Stream {
    const KIND: EntityKind = EntityKind::Stream;

    fn id(&self) -> String {
        self.id.clone()
    }
}

// ============================================================================
// Legacy index distribution
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub id: String,
    pub token: Address,
    pub publisher: Address,
    pub index_id: u32,
    pub created_at_timestamp: u64,
    pub updated_at_timestamp: u64,
    pub index_value: Amount,
    pub total_units_approved: Units,
    pub total_units_pending: Units,
    pub total_amount_distributed_until_updated_at: Amount,
}

impl Index {
    pub fn id_for(token: &Address, publisher: &Address, index_id: u32) -> String {
        format!("{}-{}-{}", publisher, token, index_id)
    }

    pub fn new(token: Address, publisher: Address, index_id: u32, meta: &EventMeta) -> Self {
        Self {
            id: Self::id_for(&token, &publisher, index_id),
            token,
            publisher,
            index_id,
            created_at_timestamp: meta.timestamp,
            updated_at_timestamp: meta.timestamp,
            index_value: 0,
            total_units_approved: 0,
            total_units_pending: 0,
            total_amount_distributed_until_updated_at: 0,
        }
    }

    pub fn total_units(&self) -> Units {
        self.total_units_approved + self.total_units_pending
    }
}

impl Entity for Index {
    const KIND: EntityKind = EntityKind::Index;

    fn id(&self) -> String {
        self.id.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    /// Owning index id
    pub index: String,
    pub subscriber: Address,
    pub created_at_timestamp: u64,
    pub updated_at_timestamp: u64,
    pub approved: bool,
    pub units: Units,
    /// Index value at which this subscription was last paid out
    pub index_value_until_updated_at: Amount,
    pub total_amount_received_until_updated_at: Amount,
}

impl Subscription {
    pub fn id_for(index_id: &str, subscriber: &Address) -> String {
        format!("{}-{}", subscriber, index_id)
    }

    pub fn new(index: &Index, subscriber: Address, meta: &EventMeta) -> Self {
        Self {
            id: Self::id_for(&index.id, &subscriber),
            index: index.id.clone(),
            subscriber,
            created_at_timestamp: meta.timestamp,
            updated_at_timestamp: meta.timestamp,
            approved: false,
            units: 0,
            index_value_until_updated_at: index.index_value,
            total_amount_received_until_updated_at: 0,
        }
    }
}

impl Entity for Subscription {
    const KIND: EntityKind = EntityKind::Subscription;

    fn id(&self) -> String {
        self.id.clone()
    }
}

/// Last event applied by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerCheckpoint {
    pub position: EventPosition,
    pub timestamp: u64,
    pub events_applied: u64,
}

impl LedgerCheckpoint {
    pub const ID: &'static str = "engine";
}

impl Entity for LedgerCheckpoint {
    const KIND: EntityKind = EntityKind::Checkpoint;

    fn id(&self) -> String {
        Self::ID.to_string()
    }
}
