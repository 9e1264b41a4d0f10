//! GraphQL documents for the indexed store
//!
//! Every collection query takes `$blockNumber`, `$first` and `$createdAt`,
//! orders by `createdAtTimestamp` ascending and returns its rows under the
//! `response` alias. The `_gte` filter repeats the boundary record on the
//! next page; callers dedupe.

/// A named GraphQL document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Query {
    pub name: &'static str,
    pub document: &'static str,
}

pub const LATEST_BLOCK: Query = Query {
    name: "latestBlock",
    document: "query latestBlock { _meta { block { number } } }",
};

/// Streams with a non-zero flow rate.
pub const CURRENT_STREAMS: Query = Query {
    name: "currentStreams",
    document: r#"query currentStreams($blockNumber: Int!, $first: Int!, $createdAt: BigInt!) {
  response: streams(
    block: { number: $blockNumber }
    first: $first
    where: { createdAtTimestamp_gte: $createdAt, currentFlowRate_gt: 0 }
    orderBy: createdAtTimestamp
    orderDirection: asc
  ) {
    id
    createdAtTimestamp
    updatedAtTimestamp
    currentFlowRate
    token { id }
    sender { id }
    receiver { id }
  }
}"#,
};

pub const ACCOUNT_TOKEN_SNAPSHOTS: Query = Query {
    name: "accountTokenSnapshots",
    document: r#"query accountTokenSnapshots($blockNumber: Int!, $first: Int!, $createdAt: BigInt!) {
  response: accountTokenSnapshots(
    block: { number: $blockNumber }
    first: $first
    where: { createdAtTimestamp_gte: $createdAt }
    orderBy: createdAtTimestamp
    orderDirection: asc
  ) {
    id
    createdAtTimestamp
    totalNetFlowRate
    account { id }
    token { id }
  }
}"#,
};

pub const INDEXES: Query = Query {
    name: "indexes",
    document: r#"query indexes($blockNumber: Int!, $first: Int!, $createdAt: BigInt!) {
  response: indexes(
    block: { number: $blockNumber }
    first: $first
    where: { createdAtTimestamp_gte: $createdAt }
    orderBy: createdAtTimestamp
    orderDirection: asc
  ) {
    id
    createdAtTimestamp
    indexId
    indexValue
    totalUnitsApproved
    totalUnitsPending
    token { id }
    publisher { id }
  }
}"#,
};

pub const SUBSCRIPTIONS: Query = Query {
    name: "subscriptions",
    document: r#"query subscriptions($blockNumber: Int!, $first: Int!, $createdAt: BigInt!) {
  response: indexSubscriptions(
    block: { number: $blockNumber }
    first: $first
    where: { createdAtTimestamp_gte: $createdAt }
    orderBy: createdAtTimestamp
    orderDirection: asc
  ) {
    id
    createdAtTimestamp
    approved
    units
    indexValueUntilUpdatedAt
    subscriber { id }
    index {
      id
      indexId
      indexValue
      token { id }
      publisher { id }
    }
  }
}"#,
};
