//! Paginated reads of the derived dataset
//!
//! The indexed store only returns bounded pages, so complete collections are
//! read with a creation-time cursor, every page pinned to the same block.
//! Records sharing the cursor timestamp come back on both sides of a page
//! boundary; [`dedupe_by_key`] removes them before use.

pub mod client;
pub mod queries;
pub mod records;

use std::collections::HashSet;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{IndexerError, IndexerResult};

pub use client::GraphQlClient;
pub use queries::Query;
pub use records::{
    AccountTokenSnapshotRecord, AddressRef, IndexRecord, StreamRecord, SubscriptionIndexRef,
    SubscriptionRecord,
};

/// Variables accepted by every collection query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageVariables {
    pub block_number: u64,
    pub first: usize,
    /// Creation timestamp cursor (inclusive)
    pub created_at: u64,
}

/// Query interface of the indexed store.
#[async_trait]
pub trait IndexedStore: Send + Sync {
    /// Most recent block the store has fully indexed.
    async fn latest_indexed_block(&self) -> IndexerResult<u64>;

    /// One page of `query`, returned as raw rows.
    async fn query_page(
        &self,
        query: &Query,
        variables: PageVariables,
    ) -> IndexerResult<Vec<serde_json::Value>>;
}

/// A row that can be cursored and deduplicated.
pub trait IndexedRecord: DeserializeOwned {
    fn created_at_timestamp(&self) -> u64;

    fn natural_key(&self) -> String;
}

/// Read every row of `query` as of `block_number`.
///
/// Pages are requested with the last row's creation timestamp as the next
/// cursor until a page comes back short. A full page that cannot move the
/// cursor is an error rather than an endless loop.
pub async fn fetch_all<R, S>(
    store: &S,
    query: &Query,
    block_number: u64,
    page_size: usize,
) -> IndexerResult<Vec<R>>
where
    R: IndexedRecord,
    S: IndexedStore + ?Sized,
{
    let page_size = page_size.max(1);
    let mut cursor = 0u64;
    let mut pages = 0usize;
    let mut results = Vec::new();

    loop {
        let variables = PageVariables {
            block_number,
            first: page_size,
            created_at: cursor,
        };
        let rows = store.query_page(query, variables).await?;
        let full = rows.len() >= page_size;
        let page = rows
            .into_iter()
            .map(serde_json::from_value::<R>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| IndexerError::InvalidResponse {
                query: query.name.to_string(),
                reason: format!("page at cursor {}: {}", cursor, e),
            })?;
        pages += 1;
        debug!(
            query = query.name,
            page = pages,
            cursor,
            records = page.len(),
            "Fetched page"
        );

        let next_cursor = page.last().map(IndexedRecord::created_at_timestamp);
        results.extend(page);

        match next_cursor {
            Some(next) if full => {
                if next <= cursor {
                    return Err(IndexerError::StalledCursor { cursor, page_size });
                }
                cursor = next;
            }
            _ => break,
        }
    }

    debug!(query = query.name, pages, records = results.len(), "Fetched collection");
    Ok(results)
}

/// Records that survived deduplication.
#[derive(Debug)]
pub struct Deduped<R> {
    pub records: Vec<R>,
    pub duplicates: usize,
}

/// Keep the first record for each natural key, preserving order.
pub fn dedupe_by_key<R: IndexedRecord>(records: Vec<R>) -> Deduped<R> {
    let total = records.len();
    let mut seen = HashSet::with_capacity(total);
    let records: Vec<R> = records
        .into_iter()
        .filter(|r| seen.insert(r.natural_key()))
        .collect();
    Deduped {
        duplicates: total - records.len(),
        records,
    }
}
