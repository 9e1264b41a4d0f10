//! Ledger update engine
//!
//! Applies protocol events, strictly in chain order, to the derived ledger.
//! Every handler settles the pool to the event time before touching any
//! member, because a member settled against a stale pool accumulator is
//! underpaid. All writes for one event land atomically together with the
//! engine checkpoint; audit entries are only emitted once they have.

use tracing::{debug, info, warn};

use super::audit::{AuditEntry, AuditSink};
use super::entities::{
    AccountTokenSnapshot, Index, LedgerCheckpoint, Pool, PoolMember, Stream, Subscription,
    TokenStatistic,
};
use super::events::{EventMeta, ProtocolEvent, SequencedEvent};
use super::store::LedgerStore;
use crate::error::{LedgerError, LedgerResult};
use crate::math::{accrue, redistribute, settlement_delta};
use crate::types::{Address, Amount, FlowRate, Units};

/// Event-driven producer of the derived ledger.
pub struct LedgerEngine<S, A> {
    store: S,
    audit: A,
    checkpoint: Option<LedgerCheckpoint>,
}

impl<S: LedgerStore, A: AuditSink> LedgerEngine<S, A> {
    /// Create an engine over `store`, resuming from its checkpoint if any.
    pub fn new(store: S, audit: A) -> LedgerResult<Self> {
        let checkpoint: Option<LedgerCheckpoint> = store.load(LedgerCheckpoint::ID)?;
        if let Some(cp) = &checkpoint {
            info!(
                position = %cp.position,
                events_applied = cp.events_applied,
                "Resuming ledger from checkpoint"
            );
        }
        Ok(Self {
            store,
            audit,
            checkpoint,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn audit(&self) -> &A {
        &self.audit
    }

    pub fn checkpoint(&self) -> Option<&LedgerCheckpoint> {
        self.checkpoint.as_ref()
    }

    pub fn into_parts(self) -> (S, A) {
        (self.store, self.audit)
    }

    /// Apply one event. Events must arrive in strictly increasing chain
    /// position with non-decreasing timestamps; anything else is rejected
    /// and leaves the ledger untouched.
    pub fn apply(&mut self, event: &SequencedEvent) -> LedgerResult<()> {
        let meta = &event.meta;
        self.check_order(meta)?;

        let checkpoint = LedgerCheckpoint {
            position: meta.position(),
            timestamp: meta.timestamp,
            events_applied: self.checkpoint.as_ref().map_or(0, |cp| cp.events_applied) + 1,
        };

        let entries = self.store.atomically(|store| {
            let mut tx = Transition {
                store,
                meta,
                audit: Vec::new(),
            };
            tx.apply(&event.event)?;
            tx.store.save(&checkpoint)?;
            Ok(tx.audit)
        })?;

        debug!(
            event = event.event.name(),
            position = %meta.position(),
            audit_entries = entries.len(),
            "Applied event"
        );
        for entry in entries {
            self.audit.record(entry);
        }
        self.checkpoint = Some(checkpoint);
        Ok(())
    }

    /// Apply a sequence of events, stopping at the first failure.
    pub fn apply_all<'e>(
        &mut self,
        events: impl IntoIterator<Item = &'e SequencedEvent>,
    ) -> LedgerResult<u64> {
        let mut applied = 0;
        for event in events {
            self.apply(event)?;
            applied += 1;
        }
        Ok(applied)
    }

    fn check_order(&self, meta: &EventMeta) -> LedgerResult<()> {
        let Some(last) = &self.checkpoint else {
            return Ok(());
        };
        if meta.position() <= last.position {
            return Err(LedgerError::OutOfOrder {
                last: last.position,
                incoming: meta.position(),
            });
        }
        if meta.timestamp < last.timestamp {
            return Err(LedgerError::TimestampRegression {
                last: last.timestamp,
                incoming: meta.timestamp,
            });
        }
        Ok(())
    }
}

/// Mutations for a single event.
struct Transition<'a, S> {
    store: &'a mut S,
    meta: &'a EventMeta,
    audit: Vec<AuditEntry>,
}

impl<S: LedgerStore> Transition<'_, S> {
    fn apply(&mut self, event: &ProtocolEvent) -> LedgerResult<()> {
        let name = event.name();
        match *event {
            ProtocolEvent::FlowUpdated {
                token,
                sender,
                receiver,
                flow_rate,
            } => self.flow_updated(token, sender, receiver, flow_rate),
            ProtocolEvent::MemberUnitsUpdated {
                pool,
                token,
                member,
                old_units,
                new_units,
            } => self.member_units_updated(pool, token, member, old_units, new_units),
            ProtocolEvent::DistributionClaimed {
                pool,
                token,
                member,
                claimed_amount,
                total_claimed,
            } => self.distribution_claimed(pool, token, member, claimed_amount, total_claimed),
            ProtocolEvent::PoolConnectionUpdated {
                pool,
                token,
                account,
                connected,
            } => self.pool_connection_updated(pool, token, account, connected),
            ProtocolEvent::FlowDistributionUpdated {
                pool,
                token,
                distributor,
                old_flow_rate,
                new_distributor_to_pool_flow_rate,
                new_total_distribution_flow_rate,
                adjustment_flow_rate,
            } => self.flow_distribution_updated(
                pool,
                token,
                distributor,
                old_flow_rate,
                new_distributor_to_pool_flow_rate,
                new_total_distribution_flow_rate,
                adjustment_flow_rate,
            ),
            ProtocolEvent::InstantDistributionUpdated {
                pool,
                token,
                distributor,
                actual_amount,
            } => self.instant_distribution_updated(pool, token, distributor, actual_amount),
            ProtocolEvent::IndexUpdated {
                token,
                publisher,
                index_id,
                new_index_value,
                total_units_pending,
                total_units_approved,
            } => self.index_updated(
                token,
                publisher,
                index_id,
                new_index_value,
                total_units_pending,
                total_units_approved,
            ),
            ProtocolEvent::SubscriptionUnitsUpdated {
                token,
                publisher,
                index_id,
                subscriber,
                units,
            } => self.subscription_units_updated(token, publisher, index_id, subscriber, units),
            ProtocolEvent::SubscriptionApproved {
                token,
                publisher,
                index_id,
                subscriber,
            } => self.subscription_approved(token, publisher, index_id, subscriber),
        }
        .map_err(|e| {
            debug!(event = name, error = %e, "Event rejected");
            e
        })
    }

    // ------------------------------------------------------------------------
    // Constant flows
    // ------------------------------------------------------------------------

    fn flow_updated(
        &mut self,
        token: Address,
        sender: Address,
        receiver: Address,
        flow_rate: FlowRate,
    ) -> LedgerResult<()> {
        const EVENT: &str = "FlowUpdated";
        if flow_rate < 0 {
            return Err(malformed(EVENT, format!("negative flow rate {}", flow_rate)));
        }
        if sender == receiver {
            return Err(malformed(EVENT, format!("sender and receiver are both {}", sender)));
        }

        let stream_id = Stream::id_for(&token, &sender, &receiver);
        let mut stream = match self.store.load::<Stream>(&stream_id)? {
            // a deleted stream that restarts is a new stream
            Some(existing) if existing.is_current() || flow_rate == 0 => existing,
            _ => Stream::new(token, sender, receiver, self.meta),
        };
        let old_flow_rate = stream.current_flow_rate;
        let elapsed = self.elapsed_since(stream.updated_at_timestamp);
        stream.streamed_until_updated_at += accrue(old_flow_rate, elapsed);
        stream.current_flow_rate = flow_rate;
        stream.updated_at_timestamp = self.meta.timestamp;
        self.store.save(&stream)?;

        let delta = flow_rate - old_flow_rate;
        let started = old_flow_rate == 0 && flow_rate > 0;
        let stopped = old_flow_rate > 0 && flow_rate == 0;

        let mut outgoing = self.settled_ats(sender, token, 0)?;
        outgoing.total_net_flow_rate -= delta;
        outgoing.total_outflow_rate += delta;
        let mut incoming = self.settled_ats(receiver, token, 0)?;
        incoming.total_net_flow_rate += delta;
        incoming.total_inflow_rate += delta;
        let mut stats = self.settled_token_stats(token)?;
        stats.total_outflow_rate += delta;

        if started {
            outgoing.active_outgoing_stream_count += 1;
            incoming.active_incoming_stream_count += 1;
            stats.total_number_of_active_streams += 1;
        } else if stopped {
            outgoing.active_outgoing_stream_count -= 1;
            incoming.active_incoming_stream_count -= 1;
            stats.total_number_of_active_streams -= 1;
        }

        self.finish_ats(&outgoing, EVENT)?;
        self.finish_ats(&incoming, EVENT)?;
        self.finish_token_stats(&stats, EVENT)
    }

    // ------------------------------------------------------------------------
    // Distribution pools
    // ------------------------------------------------------------------------

    fn member_units_updated(
        &mut self,
        pool_id: Address,
        token: Address,
        account: Address,
        old_units: Units,
        new_units: Units,
    ) -> LedgerResult<()> {
        const EVENT: &str = "MemberUnitsUpdated";
        if new_units < 0 || old_units < 0 {
            return Err(malformed(EVENT, format!("negative units {} -> {}", old_units, new_units)));
        }

        let mut pool = self.pool(pool_id, token)?;
        let mut member = self.member(pool_id, account)?;

        let previous_units = member.units;
        if previous_units != old_units {
            warn!(
                pool = %pool_id,
                member = %account,
                ledger_units = previous_units,
                event_old_units = old_units,
                "Member units diverge from event; using ledger value"
            );
        }
        let units_delta = new_units - previous_units;
        let new_total_units = pool.total_units + units_delta;
        if new_total_units < 0 {
            return Err(malformed(
                EVENT,
                format!("pool {} total units would become {}", pool_id, new_total_units),
            ));
        }

        // pool first, then the member against the settled pool
        self.settle_pool(&mut pool);
        self.settle_member(&pool, &mut member);

        let existing_pool_flow_rate = pool.per_unit_flow_rate * pool.total_units;
        let redistribution = redistribute(existing_pool_flow_rate, new_total_units);
        pool.per_unit_flow_rate = redistribution.per_unit_flow_rate;
        pool.total_units = new_total_units;
        member.synced_per_unit_flow_rate += redistribution.remainder;
        member.units = new_units;

        if member.is_connected {
            pool.total_connected_units += units_delta;
        } else {
            pool.total_disconnected_units += units_delta;
        }

        let mut ats = self.settled_ats(account, token, 0)?;
        if previous_units == 0 && new_units > 0 {
            pool.total_members += 1;
            if member.is_connected {
                pool.total_connected_members += 1;
            } else {
                pool.total_disconnected_members += 1;
            }
            ats.total_memberships_with_units += 1;
        } else if previous_units > 0 && new_units == 0 {
            pool.total_members -= 1;
            if member.is_connected {
                pool.total_connected_members -= 1;
            } else {
                pool.total_disconnected_members -= 1;
            }
            ats.total_memberships_with_units -= 1;
        }

        self.store.save(&member)?;
        self.store.save(&pool)?;
        self.audit.push(AuditEntry::MemberUnitsUpdated {
            meta: self.meta.clone(),
            token,
            pool: pool_id,
            pool_member: member.id.clone(),
            old_units: previous_units,
            units: new_units,
            total_units: pool.total_units,
        });

        let stats = self.settled_token_stats(token)?;
        self.finish_token_stats(&stats, EVENT)?;
        self.finish_ats(&ats, EVENT)
    }

    fn distribution_claimed(
        &mut self,
        pool_id: Address,
        token: Address,
        account: Address,
        claimed_amount: Amount,
        total_claimed: Amount,
    ) -> LedgerResult<()> {
        const EVENT: &str = "DistributionClaimed";
        if claimed_amount < 0 || total_claimed < claimed_amount {
            return Err(malformed(
                EVENT,
                format!("claimed {} with total {}", claimed_amount, total_claimed),
            ));
        }

        let mut pool = self.pool(pool_id, token)?;
        let mut member = self.member(pool_id, account)?;
        self.settle_pool(&mut pool);
        self.settle_member(&pool, &mut member);
        member.total_amount_claimed = total_claimed;

        self.store.save(&pool)?;
        self.store.save(&member)?;

        let stats = self.settled_token_stats(token)?;
        self.finish_token_stats(&stats, EVENT)?;
        let ats = self.settled_ats(account, token, claimed_amount)?;
        self.finish_ats(&ats, EVENT)?;

        self.audit.push(AuditEntry::DistributionClaimed {
            meta: self.meta.clone(),
            token,
            pool: pool_id,
            pool_member: member.id,
            claimed_amount,
            total_claimed,
        });
        Ok(())
    }

    fn pool_connection_updated(
        &mut self,
        pool_id: Address,
        token: Address,
        account: Address,
        connected: bool,
    ) -> LedgerResult<()> {
        const EVENT: &str = "PoolConnectionUpdated";
        let mut pool = self.pool(pool_id, token)?;
        let mut member = self.member(pool_id, account)?;
        self.settle_pool(&mut pool);
        self.settle_member(&pool, &mut member);

        let mut ats = self.settled_ats(account, token, 0)?;
        if member.is_connected != connected {
            let units = member.units;
            let has_units = units > 0;
            if connected {
                pool.total_disconnected_units -= units;
                pool.total_connected_units += units;
                if has_units {
                    pool.total_disconnected_members -= 1;
                    pool.total_connected_members += 1;
                }
                ats.total_connected_memberships += 1;
            } else {
                pool.total_connected_units -= units;
                pool.total_disconnected_units += units;
                if has_units {
                    pool.total_connected_members -= 1;
                    pool.total_disconnected_members += 1;
                }
                ats.total_connected_memberships -= 1;
            }
            member.is_connected = connected;
        }

        self.store.save(&pool)?;
        self.store.save(&member)?;
        self.finish_ats(&ats, EVENT)
    }

    #[allow(clippy::too_many_arguments)]
    fn flow_distribution_updated(
        &mut self,
        pool_id: Address,
        token: Address,
        distributor: Address,
        old_flow_rate: FlowRate,
        new_distributor_to_pool_flow_rate: FlowRate,
        new_total_distribution_flow_rate: FlowRate,
        adjustment_flow_rate: FlowRate,
    ) -> LedgerResult<()> {
        const EVENT: &str = "FlowDistributionUpdated";
        if new_total_distribution_flow_rate < 0 || new_distributor_to_pool_flow_rate < 0 {
            return Err(malformed(EVENT, "negative distribution flow rate".to_string()));
        }

        let mut pool = self.pool(pool_id, token)?;
        self.settle_pool(&mut pool);
        pool.flow_rate = new_total_distribution_flow_rate;
        pool.adjustment_flow_rate = adjustment_flow_rate;
        pool.per_unit_flow_rate =
            redistribute(new_total_distribution_flow_rate, pool.total_units).per_unit_flow_rate;
        self.store.save(&pool)?;

        let delta = new_distributor_to_pool_flow_rate - old_flow_rate;
        let mut outgoing = self.settled_ats(distributor, token, 0)?;
        outgoing.total_net_flow_rate -= delta;
        outgoing.total_outflow_rate += delta;
        // the pool holds the distributed flow as an account of its own
        let mut incoming = self.settled_ats(pool_id, token, 0)?;
        incoming.total_net_flow_rate += delta;
        incoming.total_inflow_rate += delta;
        let mut stats = self.settled_token_stats(token)?;
        stats.total_outflow_rate += delta;

        self.finish_ats(&outgoing, EVENT)?;
        self.finish_ats(&incoming, EVENT)?;
        self.finish_token_stats(&stats, EVENT)
    }

    fn instant_distribution_updated(
        &mut self,
        pool_id: Address,
        token: Address,
        distributor: Address,
        actual_amount: Amount,
    ) -> LedgerResult<()> {
        const EVENT: &str = "InstantDistributionUpdated";
        if actual_amount < 0 {
            return Err(malformed(EVENT, format!("negative amount {}", actual_amount)));
        }

        let mut pool = self.pool(pool_id, token)?;
        // the protocol only distributes whole multiples of the pool's units
        let per_unit = match pool.total_units {
            0 if actual_amount == 0 => 0,
            0 => {
                return Err(malformed(
                    EVENT,
                    format!("amount {} distributed to pool {} without units", actual_amount, pool_id),
                ))
            }
            units if actual_amount % units != 0 => {
                return Err(malformed(
                    EVENT,
                    format!("amount {} is not a multiple of {} pool units", actual_amount, units),
                ))
            }
            units => actual_amount / units,
        };
        self.settle_pool(&mut pool);
        pool.total_amount_instantly_distributed_until_updated_at += actual_amount;
        pool.per_unit_settled_value += per_unit;
        pool.total_amount_distributed_until_updated_at = pool
            .total_amount_flowed_distributed_until_updated_at
            + pool.total_amount_instantly_distributed_until_updated_at;
        self.store.save(&pool)?;

        let mut stats = self.settled_token_stats(token)?;
        stats.total_amount_distributed_until_updated_at += actual_amount;
        self.finish_token_stats(&stats, EVENT)?;
        let ats = self.settled_ats(distributor, token, -actual_amount)?;
        self.finish_ats(&ats, EVENT)
    }

    // ------------------------------------------------------------------------
    // Legacy indexes
    // ------------------------------------------------------------------------

    fn index_updated(
        &mut self,
        token: Address,
        publisher: Address,
        index_id: u32,
        new_index_value: Amount,
        total_units_pending: Units,
        total_units_approved: Units,
    ) -> LedgerResult<()> {
        const EVENT: &str = "IndexUpdated";
        let mut index = self.index(token, publisher, index_id)?;
        if new_index_value < index.index_value {
            return Err(malformed(
                EVENT,
                format!("index value decreased {} -> {}", index.index_value, new_index_value),
            ));
        }
        if index.total_units_approved != total_units_approved
            || index.total_units_pending != total_units_pending
        {
            warn!(
                index = %index.id,
                ledger_approved = index.total_units_approved,
                ledger_pending = index.total_units_pending,
                event_approved = total_units_approved,
                event_pending = total_units_pending,
                "Index units diverge from event"
            );
        }

        let distributed = (new_index_value - index.index_value) * index.total_units();
        index.index_value = new_index_value;
        index.total_units_approved = total_units_approved;
        index.total_units_pending = total_units_pending;
        index.total_amount_distributed_until_updated_at += distributed;
        index.updated_at_timestamp = self.meta.timestamp;
        self.store.save(&index)?;

        let mut stats = self.settled_token_stats(token)?;
        stats.total_amount_distributed_until_updated_at += distributed;
        self.finish_token_stats(&stats, EVENT)?;
        let ats = self.settled_ats(publisher, token, -distributed)?;
        self.finish_ats(&ats, EVENT)
    }

    fn subscription_units_updated(
        &mut self,
        token: Address,
        publisher: Address,
        index_id: u32,
        subscriber: Address,
        units: Units,
    ) -> LedgerResult<()> {
        const EVENT: &str = "SubscriptionUnitsUpdated";
        if units < 0 {
            return Err(malformed(EVENT, format!("negative units {}", units)));
        }

        let mut index = self.index(token, publisher, index_id)?;
        let mut subscription = self.subscription(&index, subscriber)?;
        let delta = units - subscription.units;

        let mut paid = 0;
        if subscription.approved {
            paid = settlement_delta(
                index.index_value,
                subscription.index_value_until_updated_at,
                subscription.units,
            );
            subscription.total_amount_received_until_updated_at += paid;
            subscription.index_value_until_updated_at = index.index_value;
            index.total_units_approved += delta;
        } else {
            index.total_units_pending += delta;
        }
        subscription.units = units;
        subscription.updated_at_timestamp = self.meta.timestamp;
        index.updated_at_timestamp = self.meta.timestamp;

        self.store.save(&index)?;
        self.store.save(&subscription)?;
        let ats = self.settled_ats(subscriber, token, paid)?;
        self.finish_ats(&ats, EVENT)
    }

    fn subscription_approved(
        &mut self,
        token: Address,
        publisher: Address,
        index_id: u32,
        subscriber: Address,
    ) -> LedgerResult<()> {
        const EVENT: &str = "SubscriptionApproved";
        let mut index = self.index(token, publisher, index_id)?;
        let mut subscription = self.subscription(&index, subscriber)?;
        if subscription.approved {
            return Ok(());
        }

        let pending = settlement_delta(
            index.index_value,
            subscription.index_value_until_updated_at,
            subscription.units,
        );
        subscription.total_amount_received_until_updated_at += pending;
        subscription.index_value_until_updated_at = index.index_value;
        subscription.approved = true;
        subscription.updated_at_timestamp = self.meta.timestamp;
        index.total_units_pending -= subscription.units;
        index.total_units_approved += subscription.units;
        index.updated_at_timestamp = self.meta.timestamp;

        self.store.save(&index)?;
        self.store.save(&subscription)?;
        let ats = self.settled_ats(subscriber, token, pending)?;
        self.finish_ats(&ats, EVENT)
    }

    // ------------------------------------------------------------------------
    // Get-or-create
    // ------------------------------------------------------------------------

    fn pool(&mut self, id: Address, token: Address) -> LedgerResult<Pool> {
        Ok(self
            .store
            .load(&id.to_string())?
            .unwrap_or_else(|| Pool::new(id, token, self.meta)))
    }

    fn member(&mut self, pool: Address, account: Address) -> LedgerResult<PoolMember> {
        Ok(self
            .store
            .load(&PoolMember::id_for(&pool, &account))?
            .unwrap_or_else(|| PoolMember::new(pool, account, self.meta)))
    }

    fn index(&mut self, token: Address, publisher: Address, index_id: u32) -> LedgerResult<Index> {
        Ok(self
            .store
            .load(&Index::id_for(&token, &publisher, index_id))?
            .unwrap_or_else(|| Index::new(token, publisher, index_id, self.meta)))
    }

    fn subscription(&mut self, index: &Index, subscriber: Address) -> LedgerResult<Subscription> {
        Ok(self
            .store
            .load(&Subscription::id_for(&index.id, &subscriber))?
            .unwrap_or_else(|| Subscription::new(index, subscriber, self.meta)))
    }

    // ------------------------------------------------------------------------
    // Settlement
    // ------------------------------------------------------------------------

    fn elapsed_since(&self, timestamp: u64) -> u64 {
        self.meta.timestamp.saturating_sub(timestamp)
    }

    /// Advance the pool's accumulators to the event time.
    fn settle_pool(&self, pool: &mut Pool) {
        let elapsed = self.elapsed_since(pool.updated_at_timestamp);
        pool.per_unit_settled_value += accrue(pool.per_unit_flow_rate, elapsed);
        pool.total_amount_flowed_distributed_until_updated_at += accrue(pool.flow_rate, elapsed);
        pool.total_amount_distributed_until_updated_at = pool
            .total_amount_flowed_distributed_until_updated_at
            + pool.total_amount_instantly_distributed_until_updated_at;
        pool.updated_at_timestamp = self.meta.timestamp;
        pool.updated_at_block_number = self.meta.block_number;
    }

    /// Pay the member what accrued since its last sync. `pool` must already
    /// be settled.
    fn settle_member(&self, pool: &Pool, member: &mut PoolMember) {
        member.total_amount_received_until_updated_at += settlement_delta(
            pool.per_unit_settled_value,
            member.synced_per_unit_settled_value,
            member.units,
        );
        member.synced_per_unit_settled_value = pool.per_unit_settled_value;
        member.synced_per_unit_flow_rate = pool.per_unit_flow_rate;
        member.updated_at_timestamp = self.meta.timestamp;
    }

    /// Load the account snapshot and roll its balance forward to the event
    /// time, adding `balance_delta` on top.
    fn settled_ats(
        &mut self,
        account: Address,
        token: Address,
        balance_delta: Amount,
    ) -> LedgerResult<AccountTokenSnapshot> {
        let mut ats = self
            .store
            .load(&AccountTokenSnapshot::id_for(&account, &token))?
            .unwrap_or_else(|| AccountTokenSnapshot::new(account, token, self.meta));
        let elapsed = self.elapsed_since(ats.updated_at_timestamp);
        ats.balance_until_updated_at += accrue(ats.total_net_flow_rate, elapsed) + balance_delta;
        ats.total_amount_streamed_out_until_updated_at += accrue(ats.total_outflow_rate, elapsed);
        ats.updated_at_timestamp = self.meta.timestamp;
        ats.updated_at_block_number = self.meta.block_number;
        Ok(ats)
    }

    fn settled_token_stats(&mut self, token: Address) -> LedgerResult<TokenStatistic> {
        let mut stats = self
            .store
            .load(&token.to_string())?
            .unwrap_or_else(|| TokenStatistic::new(token, self.meta));
        let elapsed = self.elapsed_since(stats.updated_at_timestamp);
        stats.total_amount_streamed_until_updated_at += accrue(stats.total_outflow_rate, elapsed);
        stats.updated_at_timestamp = self.meta.timestamp;
        Ok(stats)
    }

    fn finish_ats(&mut self, ats: &AccountTokenSnapshot, event_name: &'static str) -> LedgerResult<()> {
        self.store.save(ats)?;
        self.audit.push(AuditEntry::AccountTokenSnapshotLog {
            meta: self.meta.clone(),
            event_name,
            account: ats.account,
            token: ats.token,
        });
        Ok(())
    }

    fn finish_token_stats(&mut self, stats: &TokenStatistic, event_name: &'static str) -> LedgerResult<()> {
        self.store.save(stats)?;
        self.audit.push(AuditEntry::TokenStatisticLog {
            meta: self.meta.clone(),
            event_name,
            token: stats.id,
        });
        Ok(())
    }
}

fn malformed(event: &'static str, reason: String) -> LedgerError {
    LedgerError::Malformed { event, reason }
}
