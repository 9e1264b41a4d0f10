//! Rows returned by the indexed store

use serde::Deserialize;

use super::IndexedRecord;
use crate::types::{bigint, Address, Amount, FlowRate, Units};

/// `{ id }` relation to an account or token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AddressRef {
    pub id: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRecord {
    pub id: String,
    #[serde(with = "bigint")]
    pub created_at_timestamp: u64,
    #[serde(with = "bigint")]
    pub updated_at_timestamp: u64,
    #[serde(with = "bigint")]
    pub current_flow_rate: FlowRate,
    pub token: AddressRef,
    pub sender: AddressRef,
    pub receiver: AddressRef,
}

impl IndexedRecord for StreamRecord {
    fn created_at_timestamp(&self) -> u64 {
        self.created_at_timestamp
    }

    /// Stream ids are reused when a deleted stream restarts, so the creation
    /// time is part of the key.
    fn natural_key(&self) -> String {
        format!(
            "{}{}{}{}",
            self.created_at_timestamp, self.sender.id, self.receiver.id, self.token.id
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountTokenSnapshotRecord {
    pub id: String,
    #[serde(with = "bigint")]
    pub created_at_timestamp: u64,
    #[serde(with = "bigint")]
    pub total_net_flow_rate: FlowRate,
    pub account: AddressRef,
    pub token: AddressRef,
}

impl IndexedRecord for AccountTokenSnapshotRecord {
    fn created_at_timestamp(&self) -> u64 {
        self.created_at_timestamp
    }

    fn natural_key(&self) -> String {
        self.id.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexRecord {
    pub id: String,
    #[serde(with = "bigint")]
    pub created_at_timestamp: u64,
    #[serde(with = "bigint")]
    pub index_id: u32,
    #[serde(with = "bigint")]
    pub index_value: Amount,
    #[serde(with = "bigint")]
    pub total_units_approved: Units,
    #[serde(with = "bigint")]
    pub total_units_pending: Units,
    pub token: AddressRef,
    pub publisher: AddressRef,
}

impl IndexedRecord for IndexRecord {
    fn created_at_timestamp(&self) -> u64 {
        self.created_at_timestamp
    }

    fn natural_key(&self) -> String {
        self.id.clone()
    }
}

/// Index fields embedded in a subscription row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionIndexRef {
    pub id: String,
    #[serde(with = "bigint")]
    pub index_id: u32,
    #[serde(with = "bigint")]
    pub index_value: Amount,
    pub token: AddressRef,
    pub publisher: AddressRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    pub id: String,
    #[serde(with = "bigint")]
    pub created_at_timestamp: u64,
    pub approved: bool,
    #[serde(with = "bigint")]
    pub units: Units,
    #[serde(with = "bigint")]
    pub index_value_until_updated_at: Amount,
    pub subscriber: AddressRef,
    pub index: SubscriptionIndexRef,
}

impl IndexedRecord for SubscriptionRecord {
    fn created_at_timestamp(&self) -> u64 {
        self.created_at_timestamp
    }

    fn natural_key(&self) -> String {
        self.id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_row_parses() {
        let row = serde_json::json!({
            "id": "0x33-0x11-0x22-0",
            "createdAtTimestamp": "1650000000",
            "approved": false,
            "units": "100",
            "indexValueUntilUpdatedAt": "30",
            "subscriber": { "id": "0x3333333333333333333333333333333333333333" },
            "index": {
                "id": "0x11-0x22-0",
                "indexId": "0",
                "indexValue": "50",
                "token": { "id": "0x2222222222222222222222222222222222222222" },
                "publisher": { "id": "0x1111111111111111111111111111111111111111" }
            }
        });
        let parsed: SubscriptionRecord = serde_json::from_value(row).unwrap();
        assert_eq!(parsed.units, 100);
        assert_eq!(parsed.index.index_value, 50);
        assert_eq!(parsed.index.publisher.id, Address::new([0x11; 20]));
    }

    #[test]
    fn test_stream_key_includes_creation_time() {
        let stream = |created: u64| StreamRecord {
            id: "s".into(),
            created_at_timestamp: created,
            updated_at_timestamp: created,
            current_flow_rate: 1,
            token: AddressRef { id: Address::new([1; 20]) },
            sender: AddressRef { id: Address::new([2; 20]) },
            receiver: AddressRef { id: Address::new([3; 20]) },
        };
        assert_ne!(stream(10).natural_key(), stream(11).natural_key());
        assert_eq!(stream(10).natural_key(), stream(10).natural_key());
    }
}
