//! Protocol events consumed by the ledger engine

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{bigint, Address, Amount, FlowRate, Units};

/// Position of an event in the chain: block, then log index within the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventPosition {
    pub block_number: u64,
    pub log_index: u32,
}

impl fmt::Display for EventPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block_number, self.log_index)
    }
}

/// Where and when an event was emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMeta {
    pub block_number: u64,
    /// Block timestamp (Unix seconds)
    pub timestamp: u64,
    pub log_index: u32,
    #[serde(default)]
    pub transaction_hash: String,
}

impl EventMeta {
    pub fn new(block_number: u64, timestamp: u64, log_index: u32) -> Self {
        Self {
            block_number,
            timestamp,
            log_index,
            transaction_hash: String::new(),
        }
    }

    pub fn position(&self) -> EventPosition {
        EventPosition {
            block_number: self.block_number,
            log_index: self.log_index,
        }
    }
}

/// Flow-affecting protocol events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum ProtocolEvent {
    /// A constant flow between two accounts was created, updated or deleted.
    FlowUpdated {
        token: Address,
        sender: Address,
        receiver: Address,
        #[serde(with = "bigint")]
        flow_rate: FlowRate,
    },

    /// A pool member's units changed.
    MemberUnitsUpdated {
        pool: Address,
        token: Address,
        member: Address,
        #[serde(with = "bigint")]
        old_units: Units,
        #[serde(with = "bigint")]
        new_units: Units,
    },

    /// A pool member claimed accrued value.
    DistributionClaimed {
        pool: Address,
        token: Address,
        member: Address,
        #[serde(with = "bigint")]
        claimed_amount: Amount,
        #[serde(with = "bigint")]
        total_claimed: Amount,
    },

    /// An account connected to or disconnected from a pool.
    PoolConnectionUpdated {
        pool: Address,
        token: Address,
        account: Address,
        connected: bool,
    },

    /// A distributor changed its flow into a pool.
    FlowDistributionUpdated {
        pool: Address,
        token: Address,
        distributor: Address,
        #[serde(with = "bigint")]
        old_flow_rate: FlowRate,
        #[serde(with = "bigint")]
        new_distributor_to_pool_flow_rate: FlowRate,
        #[serde(with = "bigint")]
        new_total_distribution_flow_rate: FlowRate,
        #[serde(with = "bigint")]
        adjustment_flow_rate: FlowRate,
    },

    /// A distributor made a one-off distribution to a pool.
    InstantDistributionUpdated {
        pool: Address,
        token: Address,
        distributor: Address,
        #[serde(with = "bigint")]
        actual_amount: Amount,
    },

    /// A publisher moved its index value (legacy distribution primitive).
    IndexUpdated {
        token: Address,
        publisher: Address,
        index_id: u32,
        #[serde(with = "bigint")]
        new_index_value: Amount,
        #[serde(with = "bigint")]
        total_units_pending: Units,
        #[serde(with = "bigint")]
        total_units_approved: Units,
    },

    /// A subscriber's units on an index changed.
    SubscriptionUnitsUpdated {
        token: Address,
        publisher: Address,
        index_id: u32,
        subscriber: Address,
        #[serde(with = "bigint")]
        units: Units,
    },

    /// A subscriber approved its subscription.
    SubscriptionApproved {
        token: Address,
        publisher: Address,
        index_id: u32,
        subscriber: Address,
    },
}

impl ProtocolEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FlowUpdated { .. } => "FlowUpdated",
            Self::MemberUnitsUpdated { .. } => "MemberUnitsUpdated",
            Self::DistributionClaimed { .. } => "DistributionClaimed",
            Self::PoolConnectionUpdated { .. } => "PoolConnectionUpdated",
            Self::FlowDistributionUpdated { .. } => "FlowDistributionUpdated",
            Self::InstantDistributionUpdated { .. } => "InstantDistributionUpdated",
            Self::IndexUpdated { .. } => "IndexUpdated",
            Self::SubscriptionUnitsUpdated { .. } => "SubscriptionUnitsUpdated",
            Self::SubscriptionApproved { .. } => "SubscriptionApproved",
        }
    }
}

/// An event together with its chain position. One line of a replay file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencedEvent {
    pub meta: EventMeta,
    #[serde(flatten)]
    pub event: ProtocolEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_orders_by_block_then_log() {
        let a = EventMeta::new(10, 100, 5).position();
        let b = EventMeta::new(10, 100, 6).position();
        let c = EventMeta::new(11, 100, 0).position();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_sequenced_event_from_json_line() {
        let line = r#"{"meta":{"blockNumber":5,"timestamp":1000,"logIndex":2},"event":"MemberUnitsUpdated","pool":"0x1111111111111111111111111111111111111111","token":"0x2222222222222222222222222222222222222222","member":"0x3333333333333333333333333333333333333333","oldUnits":"0","newUnits":"25"}"#;
        let parsed: SequencedEvent = serde_json::from_str(line).unwrap();
        assert_eq!(parsed.meta.position(), EventPosition { block_number: 5, log_index: 2 });
        match parsed.event {
            ProtocolEvent::MemberUnitsUpdated { old_units, new_units, .. } => {
                assert_eq!(old_units, 0);
                assert_eq!(new_units, 25);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
