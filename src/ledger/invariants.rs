//! Local invariant sweep over a derived ledger
//!
//! Checks the conservation rules the engine is supposed to maintain without
//! consulting any outside source. A clean replay produces no violations.

use std::collections::BTreeMap;

use tracing::{info, warn};

use super::entities::{AccountTokenSnapshot, Index, Pool, PoolMember, Subscription};
use super::store::LedgerStore;
use crate::error::LedgerResult;
use crate::types::{Address, FlowRate, Units};

/// A broken conservation rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error("pool {pool}: total units {total_units} but members hold {member_units}")]
    PoolUnits {
        pool: Address,
        total_units: Units,
        member_units: Units,
    },

    #[error("pool {pool}: {connected} connected + {disconnected} disconnected units != {total} total")]
    PoolUnitSplit {
        pool: Address,
        total: Units,
        connected: Units,
        disconnected: Units,
    },

    #[error("pool {pool}: {connected} connected + {disconnected} disconnected members != {total} total")]
    PoolMemberSplit {
        pool: Address,
        total: u64,
        connected: u64,
        disconnected: u64,
    },

    #[error("pool {pool}: {total_members} members recorded but {members_with_units} hold units")]
    PoolMembers {
        pool: Address,
        total_members: u64,
        members_with_units: u64,
    },

    #[error("token {token}: net flow rates sum to {sum}")]
    NetFlow { token: Address, sum: FlowRate },

    #[error("index {index}: {approved} approved + {pending} pending units but subscriptions hold {subscribed}")]
    IndexUnits {
        index: String,
        approved: Units,
        pending: Units,
        subscribed: Units,
    },
}

/// Evaluate every conservation rule and return all violations found.
pub fn check<S: LedgerStore>(store: &S) -> LedgerResult<Vec<Violation>> {
    let mut violations = Vec::new();
    check_pools(store, &mut violations)?;
    check_net_flow(store, &mut violations)?;
    check_indexes(store, &mut violations)?;

    if violations.is_empty() {
        info!("Ledger invariants hold");
    } else {
        for v in &violations {
            warn!(violation = %v, "Ledger invariant violated");
        }
    }
    Ok(violations)
}

fn check_pools<S: LedgerStore>(store: &S, out: &mut Vec<Violation>) -> LedgerResult<()> {
    #[derive(Default)]
    struct Tally {
        units: Units,
        with_units: u64,
    }

    let mut tallies: BTreeMap<Address, Tally> = BTreeMap::new();
    for member in store.all::<PoolMember>()? {
        let tally = tallies.entry(member.pool).or_default();
        tally.units += member.units;
        if member.units > 0 {
            tally.with_units += 1;
        }
    }

    for pool in store.all::<Pool>()? {
        let tally = tallies.remove(&pool.id).unwrap_or_default();
        if tally.units != pool.total_units {
            out.push(Violation::PoolUnits {
                pool: pool.id,
                total_units: pool.total_units,
                member_units: tally.units,
            });
        }
        if pool.total_connected_units + pool.total_disconnected_units != pool.total_units {
            out.push(Violation::PoolUnitSplit {
                pool: pool.id,
                total: pool.total_units,
                connected: pool.total_connected_units,
                disconnected: pool.total_disconnected_units,
            });
        }
        if pool.total_connected_members + pool.total_disconnected_members != pool.total_members {
            out.push(Violation::PoolMemberSplit {
                pool: pool.id,
                total: pool.total_members,
                connected: pool.total_connected_members,
                disconnected: pool.total_disconnected_members,
            });
        }
        if tally.with_units != pool.total_members {
            out.push(Violation::PoolMembers {
                pool: pool.id,
                total_members: pool.total_members,
                members_with_units: tally.with_units,
            });
        }
    }
    Ok(())
}

fn check_net_flow<S: LedgerStore>(store: &S, out: &mut Vec<Violation>) -> LedgerResult<()> {
    let mut sums: BTreeMap<Address, FlowRate> = BTreeMap::new();
    for ats in store.all::<AccountTokenSnapshot>()? {
        *sums.entry(ats.token).or_default() += ats.total_net_flow_rate;
    }
    out.extend(
        sums.into_iter()
            .filter(|(_, sum)| *sum != 0)
            .map(|(token, sum)| Violation::NetFlow { token, sum }),
    );
    Ok(())
}

fn check_indexes<S: LedgerStore>(store: &S, out: &mut Vec<Violation>) -> LedgerResult<()> {
    let mut subscribed: BTreeMap<String, Units> = BTreeMap::new();
    for subscription in store.all::<Subscription>()? {
        *subscribed.entry(subscription.index).or_default() += subscription.units;
    }
    for index in store.all::<Index>()? {
        let held = subscribed.get(&index.id).copied().unwrap_or_default();
        if held != index.total_units() {
            out.push(Violation::IndexUnits {
                index: index.id,
                approved: index.total_units_approved,
                pending: index.total_units_pending,
                subscribed: held,
            });
        }
    }
    Ok(())
}
