//! Invariant verifier
//!
//! Reads the full derived dataset at one block, re-reads every record from
//! the authoritative source at the same block and compares them. Record
//! mismatches are reported and counted; a non-zero network-wide net flow is
//! fatal.
//!
//! Kinds are verified in a fixed order (streams, indexes, subscriptions,
//! account snapshots), each to completion before the next.

pub mod checks;
pub mod chunked;

use std::collections::HashMap;

use serde::Serialize;
use tracing::{error, info};

use crate::chain::AuthoritativeSource;
use crate::config::VerifyConfig;
use crate::error::VerifyError;
use crate::indexer::{
    dedupe_by_key, fetch_all, queries, AccountTokenSnapshotRecord, IndexRecord, IndexedRecord,
    IndexedStore, StreamRecord, SubscriptionRecord,
};
use crate::types::FlowRate;

use checks::FieldMismatch;
use chunked::{run_chunked, ChunkOutcome};

/// Counts for one entity kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KindReport {
    /// Rows returned by the indexed store, duplicates included
    pub fetched: usize,
    pub unique: usize,
    /// Records compared against the authoritative source
    pub checked: usize,
    pub mismatches: usize,
    /// Records whose authoritative read failed, timed out or reported missing
    pub failures: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub block_number: u64,
    pub streams: KindReport,
    pub indexes: KindReport,
    pub subscriptions: KindReport,
    pub account_token_snapshots: KindReport,
    /// Sum of authoritative net flow rates over every checked snapshot
    pub net_flow_sum: FlowRate,
    /// Snapshots whose authoritative net flow could not be read; the sum
    /// only covers the whole network when this is zero
    pub net_flow_unchecked: usize,
}

impl VerificationReport {
    fn kinds(&self) -> [&KindReport; 4] {
        [
            &self.streams,
            &self.indexes,
            &self.subscriptions,
            &self.account_token_snapshots,
        ]
    }

    pub fn mismatches(&self) -> usize {
        self.kinds().iter().map(|k| k.mismatches).sum()
    }

    pub fn failures(&self) -> usize {
        self.kinds().iter().map(|k| k.failures).sum()
    }

    /// Whether the run passes. The global invariant always counts, and it
    /// cannot hold over accounts that were never read; record-level
    /// problems only when `strict`.
    pub fn verdict(&self, strict: bool) -> Result<(), VerifyError> {
        if self.net_flow_unchecked > 0 {
            return Err(VerifyError::NetFlowIncomplete {
                unchecked: self.net_flow_unchecked,
            });
        }
        if self.net_flow_sum != 0 {
            return Err(VerifyError::NetFlowSum {
                sum: self.net_flow_sum,
            });
        }
        let (mismatches, failures) = (self.mismatches(), self.failures());
        if strict && (mismatches > 0 || failures > 0) {
            return Err(VerifyError::RecordFailures {
                mismatches,
                failures,
            });
        }
        Ok(())
    }
}

/// Compares the indexed store against the authoritative source.
pub struct Verifier<I, A> {
    indexed: I,
    chain: A,
    settings: VerifyConfig,
}

struct Collection<R> {
    records: Vec<R>,
    report: KindReport,
}

impl<I: IndexedStore, A: AuthoritativeSource> Verifier<I, A> {
    pub fn new(indexed: I, chain: A, settings: VerifyConfig) -> Self {
        Self {
            indexed,
            chain,
            settings,
        }
    }

    /// Verify at `block`, or at the indexed store's latest block.
    ///
    /// Only indexed-store failures abort the run; inspect the report's
    /// [`verdict`](VerificationReport::verdict) for the outcome.
    pub async fn run(&self, block: Option<u64>) -> Result<VerificationReport, VerifyError> {
        let block = match block {
            Some(b) => b,
            None => self.indexed.latest_indexed_block().await?,
        };
        info!(block, "Verifying derived ledger");

        let streams: Collection<StreamRecord> = self
            .fetch_collection("streams", &queries::CURRENT_STREAMS, block)
            .await?;
        let accounts: Collection<AccountTokenSnapshotRecord> = self
            .fetch_collection("accountTokenSnapshots", &queries::ACCOUNT_TOKEN_SNAPSHOTS, block)
            .await?;
        let indexes: Collection<IndexRecord> = self
            .fetch_collection("indexes", &queries::INDEXES, block)
            .await?;
        let subscriptions: Collection<SubscriptionRecord> = self
            .fetch_collection("subscriptions", &queries::SUBSCRIPTIONS, block)
            .await?;

        let mut report = VerificationReport {
            block_number: block,
            ..Default::default()
        };

        report.streams = self.verify_streams(streams, block).await;
        report.indexes = self.verify_indexes(indexes, &subscriptions.records, block).await;
        report.subscriptions = self.verify_subscriptions(subscriptions, block).await;
        let (accounts_report, net_flow_sum) = self.verify_accounts(accounts, block).await;
        report.net_flow_unchecked = accounts_report.failures;
        report.account_token_snapshots = accounts_report;
        report.net_flow_sum = net_flow_sum;

        if report.net_flow_unchecked > 0 {
            error!(
                unchecked = report.net_flow_unchecked,
                partial_sum = %net_flow_sum,
                "'net flow sum == 0' global invariant could not be verified"
            );
        } else if net_flow_sum == 0 {
            info!("'net flow sum == 0' global invariant holds");
        } else {
            error!(sum = %net_flow_sum, "'net flow sum == 0' global invariant failed");
        }
        info!(
            block,
            mismatches = report.mismatches(),
            failures = report.failures(),
            "Verification finished"
        );
        Ok(report)
    }

    async fn fetch_collection<R: IndexedRecord>(
        &self,
        kind: &'static str,
        query: &queries::Query,
        block: u64,
    ) -> Result<Collection<R>, VerifyError> {
        info!(kind, "Querying indexed store");
        let fetched = fetch_all::<R, _>(&self.indexed, query, block, self.settings.page_size).await?;
        let total = fetched.len();
        let deduped = dedupe_by_key(fetched);
        info!(
            kind,
            unique = deduped.records.len(),
            total,
            duplicates = deduped.duplicates,
            "Filtered duplicate records"
        );
        Ok(Collection {
            report: KindReport {
                fetched: total,
                unique: deduped.records.len(),
                ..Default::default()
            },
            records: deduped.records,
        })
    }

    async fn verify_streams(&self, streams: Collection<StreamRecord>, block: u64) -> KindReport {
        info!(count = streams.records.len(), "Validating streams");
        let outcome = run_chunked(
            "stream",
            &streams.records,
            self.settings.chunk_size,
            self.settings.call_timeout(),
            |_, s| async move {
                let state = self
                    .chain
                    .get_flow(s.token.id, s.sender.id, s.receiver.id, block)
                    .await?;
                Ok::<_, VerifyError>(checks::check_stream(s, &state))
            },
        )
        .await;
        tally("stream", streams, outcome, |s| &s.id)
    }

    async fn verify_indexes(
        &self,
        indexes: Collection<IndexRecord>,
        subscriptions: &[SubscriptionRecord],
        block: u64,
    ) -> KindReport {
        info!(count = indexes.records.len(), "Validating indexes");
        let units: HashMap<String, _> = checks::subscription_units_by_index(subscriptions);
        let units = &units;
        let outcome = run_chunked(
            "index",
            &indexes.records,
            self.settings.chunk_size,
            self.settings.call_timeout(),
            |_, idx| async move {
                let state = self
                    .chain
                    .get_index(idx.token.id, idx.publisher.id, idx.index_id, block)
                    .await?;
                if !state.exists {
                    return Err(VerifyError::Missing {
                        kind: "index",
                        id: idx.id.clone(),
                    });
                }
                let held = units.get(&idx.id).copied().unwrap_or_default();
                Ok::<_, VerifyError>(checks::check_index(idx, &state, held))
            },
        )
        .await;
        tally("index", indexes, outcome, |i| &i.id)
    }

    async fn verify_subscriptions(
        &self,
        subscriptions: Collection<SubscriptionRecord>,
        block: u64,
    ) -> KindReport {
        info!(count = subscriptions.records.len(), "Validating subscriptions");
        let outcome = run_chunked(
            "subscription",
            &subscriptions.records,
            self.settings.chunk_size,
            self.settings.call_timeout(),
            |_, sub| async move {
                let state = self
                    .chain
                    .get_subscription(
                        sub.index.token.id,
                        sub.index.publisher.id,
                        sub.index.index_id,
                        sub.subscriber.id,
                        block,
                    )
                    .await?;
                if !state.exists {
                    return Err(VerifyError::Missing {
                        kind: "subscription",
                        id: sub.id.clone(),
                    });
                }
                Ok::<_, VerifyError>(checks::check_subscription(sub, &state))
            },
        )
        .await;
        tally("subscription", subscriptions, outcome, |s| &s.id)
    }

    /// Returns the report and the sum of authoritative net flows. Each task
    /// hands back its own net flow; the sum is folded afterwards.
    async fn verify_accounts(
        &self,
        accounts: Collection<AccountTokenSnapshotRecord>,
        block: u64,
    ) -> (KindReport, FlowRate) {
        info!(count = accounts.records.len(), "Validating account token snapshot net flow rates");
        let outcome = run_chunked(
            "accountTokenSnapshot",
            &accounts.records,
            self.settings.chunk_size,
            self.settings.call_timeout(),
            |_, ats| async move {
                let net_flow = self
                    .chain
                    .get_net_flow(ats.token.id, ats.account.id, block)
                    .await?;
                Ok::<_, VerifyError>((net_flow, checks::check_account(ats, net_flow)))
            },
        )
        .await;

        let net_flow_sum: FlowRate = outcome.successes.iter().map(|(_, (net, _))| *net).sum();
        let outcome = ChunkOutcome {
            successes: outcome
                .successes
                .into_iter()
                .map(|(i, (_, mismatches))| (i, mismatches))
                .collect(),
            failures: outcome.failures,
            batches: outcome.batches,
        };
        (tally("accountTokenSnapshot", accounts, outcome, |a| &a.id), net_flow_sum)
    }
}

/// Log every mismatching record and fold the outcome into the kind's counts.
fn tally<R>(
    kind: &'static str,
    collection: Collection<R>,
    outcome: ChunkOutcome<Vec<FieldMismatch>>,
    id_of: impl Fn(&R) -> &str,
) -> KindReport {
    let mut report = collection.report;
    report.checked = outcome.successes.len();
    report.failures = outcome.failures.len();
    for (index, mismatches) in &outcome.successes {
        if mismatches.is_empty() {
            continue;
        }
        report.mismatches += 1;
        let id = collection.records.get(*index).map(&id_of).unwrap_or_default();
        for m in mismatches {
            error!(
                kind,
                id,
                field = m.field,
                derived = %m.derived,
                authoritative = %m.authoritative,
                "Values don't match"
            );
        }
    }
    info!(
        kind,
        checked = report.checked,
        mismatches = report.mismatches,
        failures = report.failures,
        "Validation complete"
    );
    report
}
