//! Record-level comparisons between derived and authoritative values

use std::collections::HashMap;
use std::fmt;

use crate::chain::{FlowState, IndexState, SubscriptionState};
use crate::indexer::{AccountTokenSnapshotRecord, IndexRecord, StreamRecord, SubscriptionRecord};
use crate::types::{Amount, FlowRate, Units};

/// One field that differs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMismatch {
    pub field: &'static str,
    pub derived: String,
    pub authoritative: String,
}

impl fmt::Display for FieldMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: derived {} != authoritative {}",
            self.field, self.derived, self.authoritative
        )
    }
}

fn compare<T: PartialEq + fmt::Display>(
    out: &mut Vec<FieldMismatch>,
    field: &'static str,
    derived: T,
    authoritative: T,
) {
    if derived != authoritative {
        out.push(FieldMismatch {
            field,
            derived: derived.to_string(),
            authoritative: authoritative.to_string(),
        });
    }
}

pub fn check_stream(record: &StreamRecord, state: &FlowState) -> Vec<FieldMismatch> {
    let mut out = Vec::new();
    compare(&mut out, "updatedAtTimestamp", record.updated_at_timestamp, state.updated_at_timestamp);
    compare(&mut out, "currentFlowRate", record.current_flow_rate, state.flow_rate);
    out
}

pub fn check_account(record: &AccountTokenSnapshotRecord, net_flow: FlowRate) -> Vec<FieldMismatch> {
    let mut out = Vec::new();
    compare(&mut out, "totalNetFlowRate", record.total_net_flow_rate, net_flow);
    out
}

/// Compare an index and check that its subscriptions hold exactly the
/// authoritative unit total.
pub fn check_index(
    record: &IndexRecord,
    state: &IndexState,
    subscription_units: Units,
) -> Vec<FieldMismatch> {
    let mut out = Vec::new();
    compare(&mut out, "indexValue", record.index_value, state.index_value);
    compare(&mut out, "totalUnitsApproved", record.total_units_approved, state.total_units_approved);
    compare(&mut out, "totalUnitsPending", record.total_units_pending, state.total_units_pending);
    compare(
        &mut out,
        "subscriptionUnitsSum",
        subscription_units,
        state.total_units_approved + state.total_units_pending,
    );
    out
}

/// Distribution a subscriber has not yet received. Approved subscriptions
/// are paid on every index update, so nothing is pending for them.
pub fn expected_pending_distribution(
    approved: bool,
    units: Units,
    index_value: Amount,
    index_value_until_updated_at: Amount,
) -> Amount {
    if approved {
        0
    } else {
        units * (index_value - index_value_until_updated_at)
    }
}

pub fn check_subscription(record: &SubscriptionRecord, state: &SubscriptionState) -> Vec<FieldMismatch> {
    let pending = expected_pending_distribution(
        record.approved,
        record.units,
        record.index.index_value,
        record.index_value_until_updated_at,
    );
    let mut out = Vec::new();
    compare(&mut out, "approved", record.approved, state.approved);
    compare(&mut out, "units", record.units, state.units);
    compare(&mut out, "pendingDistribution", pending, state.pending_distribution);
    out
}

/// Sum of subscription units per index id.
pub fn subscription_units_by_index(subscriptions: &[SubscriptionRecord]) -> HashMap<String, Units> {
    let mut sums = HashMap::new();
    for s in subscriptions {
        *sums.entry(s.index.id.clone()).or_insert(0) += s.units;
    }
    sums
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::AddressRef;
    use crate::types::Address;

    fn addr(byte: u8) -> AddressRef {
        AddressRef { id: Address::new([byte; 20]) }
    }

    fn index_record() -> IndexRecord {
        IndexRecord {
            id: "idx".into(),
            created_at_timestamp: 1,
            index_id: 0,
            index_value: 50,
            total_units_approved: 7,
            total_units_pending: 3,
            token: addr(1),
            publisher: addr(2),
        }
    }

    #[test]
    fn test_pending_distribution_formula() {
        assert_eq!(expected_pending_distribution(false, 100, 50, 30), 2000);
        assert_eq!(expected_pending_distribution(true, 100, 50, 30), 0);
        assert_eq!(expected_pending_distribution(true, 100, 9_999, 0), 0);
    }

    #[test]
    fn test_index_units_sum_mismatch_is_reported() {
        let state = IndexState {
            exists: true,
            index_value: 50,
            total_units_approved: 7,
            total_units_pending: 3,
        };
        assert!(check_index(&index_record(), &state, 10).is_empty());

        let mismatches = check_index(&index_record(), &state, 9);
        assert_eq!(
            mismatches,
            vec![FieldMismatch {
                field: "subscriptionUnitsSum",
                derived: "9".into(),
                authoritative: "10".into(),
            }]
        );
    }

    #[test]
    fn test_stream_compares_both_fields() {
        let record = StreamRecord {
            id: "s".into(),
            created_at_timestamp: 10,
            updated_at_timestamp: 20,
            current_flow_rate: 385_802_469_135,
            token: addr(1),
            sender: addr(2),
            receiver: addr(3),
        };
        let exact = FlowState {
            updated_at_timestamp: 20,
            flow_rate: 385_802_469_135,
        };
        assert!(check_stream(&record, &exact).is_empty());

        let off_by_one = FlowState {
            updated_at_timestamp: 21,
            flow_rate: 385_802_469_136,
        };
        let fields: Vec<_> = check_stream(&record, &off_by_one).iter().map(|m| m.field).collect();
        assert_eq!(fields, vec!["updatedAtTimestamp", "currentFlowRate"]);
    }

    #[test]
    fn test_subscription_pending_compared_against_chain() {
        let record = SubscriptionRecord {
            id: "sub".into(),
            created_at_timestamp: 1,
            approved: false,
            units: 100,
            index_value_until_updated_at: 30,
            subscriber: addr(3),
            index: crate::indexer::SubscriptionIndexRef {
                id: "idx".into(),
                index_id: 0,
                index_value: 50,
                token: addr(1),
                publisher: addr(2),
            },
        };
        let state = SubscriptionState {
            exists: true,
            approved: false,
            units: 100,
            pending_distribution: 2000,
        };
        assert!(check_subscription(&record, &state).is_empty());

        let paid = SubscriptionState {
            pending_distribution: 0,
            ..state
        };
        assert_eq!(check_subscription(&record, &paid)[0].field, "pendingDistribution");

        let sums = subscription_units_by_index(&[record.clone(), record]);
        assert_eq!(sums["idx"], 200);
    }
}
