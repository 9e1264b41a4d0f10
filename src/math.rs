//! Accumulator math for proportional distribution pools
//!
//! A pool distributes `perUnitFlowRate * totalUnits` per second. Whenever the
//! unit total changes the per-unit rate is recomputed by integer division and
//! the part that does not divide evenly is handed back as a remainder. The
//! caller attributes the remainder to the member that caused the change so
//! nothing drifts between the pool aggregate and the sum of its members.

use crate::types::{Amount, FlowRate, Units};

/// New per-unit flow rate after a unit total change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redistribution {
    pub per_unit_flow_rate: FlowRate,
    /// Portion of the pool rate that could not be spread over the units.
    pub remainder: FlowRate,
}

/// Spread `existing_pool_flow_rate` over `new_total_units`.
///
/// With zero units nothing can be distributed and the entire rate becomes
/// remainder. Division truncates toward zero, so the remainder is
/// non-negative whenever the pool rate is.
pub fn redistribute(existing_pool_flow_rate: FlowRate, new_total_units: Units) -> Redistribution {
    if new_total_units == 0 {
        return Redistribution {
            per_unit_flow_rate: 0,
            remainder: existing_pool_flow_rate,
        };
    }
    let per_unit_flow_rate = existing_pool_flow_rate / new_total_units;
    Redistribution {
        per_unit_flow_rate,
        remainder: existing_pool_flow_rate - per_unit_flow_rate * new_total_units,
    }
}

/// Value owed to a holder of `units` since its accumulator snapshot was
/// taken: `(current - synced) * units`.
///
/// The pool accumulator must already be settled to the event time, otherwise
/// the holder is paid against a stale value.
pub fn settlement_delta(current: Amount, synced: Amount, units: Units) -> Amount {
    (current - synced) * units
}

/// Growth of a per-unit accumulator advancing at `per_unit_rate` for
/// `elapsed` seconds.
pub fn accrue(per_unit_rate: FlowRate, elapsed: u64) -> Amount {
    per_unit_rate * Amount::from(elapsed)
}
