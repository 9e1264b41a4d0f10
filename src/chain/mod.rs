//! Authoritative on-chain state
//!
//! Point-in-time reads of the flow and index agreements. Every read takes
//! the block it is pinned to so a verification run compares against one
//! consistent snapshot.

pub mod abi;
pub mod rpc;

use async_trait::async_trait;

use crate::error::ChainResult;
use crate::types::{Address, Amount, FlowRate, Units};

pub use rpc::RpcSource;

/// Constant flow between two accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowState {
    pub updated_at_timestamp: u64,
    pub flow_rate: FlowRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexState {
    pub exists: bool,
    pub index_value: Amount,
    pub total_units_approved: Units,
    pub total_units_pending: Units,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionState {
    pub exists: bool,
    pub approved: bool,
    pub units: Units,
    pub pending_distribution: Amount,
}

/// Read-only canonical state.
#[async_trait]
pub trait AuthoritativeSource: Send + Sync {
    /// Net flow rate of `account` for `token`.
    async fn get_net_flow(
        &self,
        token: Address,
        account: Address,
        at_block: u64,
    ) -> ChainResult<FlowRate>;

    async fn get_flow(
        &self,
        token: Address,
        sender: Address,
        receiver: Address,
        at_block: u64,
    ) -> ChainResult<FlowState>;

    async fn get_index(
        &self,
        token: Address,
        publisher: Address,
        index_id: u32,
        at_block: u64,
    ) -> ChainResult<IndexState>;

    async fn get_subscription(
        &self,
        token: Address,
        publisher: Address,
        index_id: u32,
        subscriber: Address,
        at_block: u64,
    ) -> ChainResult<SubscriptionState>;
}
