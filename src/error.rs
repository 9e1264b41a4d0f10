//! Error types
//!
//! Structural failures (indexer, configuration, the global invariant) abort a
//! run. Record-level failures are wrapped with the call that produced them so
//! they can be reported and the run can continue.

use thiserror::Error;

use crate::ledger::events::EventPosition;
use crate::types::AddressParseError;

/// Errors raised while applying events to the derived ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// SQLite failure
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Entity (de)serialization failed
    #[error("entity encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Event does not come strictly after the last applied event
    #[error("event at {incoming} is not after last applied event {last}")]
    OutOfOrder {
        last: EventPosition,
        incoming: EventPosition,
    },

    /// Event timestamp moved backwards
    #[error("event timestamp {incoming} is earlier than last applied timestamp {last}")]
    TimestampRegression { last: u64, incoming: u64 },

    /// Event carries values the protocol can never emit
    #[error("malformed {event} event: {reason}")]
    Malformed { event: &'static str, reason: String },
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Errors from the indexed (derived) store.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// HTTP request failed
    #[error("request to indexed store failed for query {query}: {source}")]
    Http {
        query: String,
        #[source]
        source: reqwest::Error,
    },

    /// Indexed store answered with a non-success status
    #[error("indexed store returned {status} for query {query}: {message}")]
    Server {
        query: String,
        status: u16,
        message: String,
    },

    /// GraphQL `errors` array in an otherwise successful response
    #[error("query {query} with variables {variables} failed: {message}")]
    Query {
        query: String,
        variables: String,
        message: String,
    },

    /// Response body did not match the expected shape
    #[error("invalid response for query {query}: {reason}")]
    InvalidResponse { query: String, reason: String },

    /// A full page shares one cursor value, so the cursor cannot advance.
    /// Paging by creation time cannot get past more than `page_size` records
    /// created at the same second.
    #[error(
        "pagination stalled: more than {page_size} records share createdAtTimestamp {cursor}; \
         raise verify.page_size (--page-size) above that count"
    )]
    StalledCursor { cursor: u64, page_size: usize },
}

pub type IndexerResult<T> = std::result::Result<T, IndexerError>;

/// Errors from the authoritative (on-chain) source.
#[derive(Debug, Error)]
pub enum ChainError {
    /// RPC transport failure
    #[error("rpc call {method}({args}) failed: {source}")]
    Transport {
        method: &'static str,
        args: String,
        #[source]
        source: reqwest::Error,
    },

    /// RPC node returned an error object
    #[error("rpc call {method}({args}) returned error {code}: {message}")]
    Rpc {
        method: &'static str,
        args: String,
        code: i64,
        message: String,
    },

    /// Return data could not be decoded
    #[error("cannot decode {method}({args}) result: {reason}")]
    Decode {
        method: &'static str,
        args: String,
        reason: String,
    },
}

pub type ChainResult<T> = std::result::Result<T, ChainError>;

/// Errors raised by the invariant verifier.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Fetching the derived dataset failed (structural)
    #[error(transparent)]
    Indexer(#[from] IndexerError),

    /// Authoritative read failed for a single record
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Authoritative read exceeded the per-call timeout
    #[error("verification of {record} timed out after {secs}s")]
    Timeout { record: String, secs: u64 },

    /// Verification task panicked
    #[error("verification task {index} panicked: {message}")]
    Panicked { index: usize, message: String },

    /// Authoritative source reports the record does not exist
    #[error("{kind} {id} does not exist on chain")]
    Missing { kind: &'static str, id: String },

    /// Some snapshots' net flows were never read, so the global sum is
    /// unknown (fatal)
    #[error("'net flow sum == 0' global invariant unverified: {unchecked} account net flows not read")]
    NetFlowIncomplete { unchecked: usize },

    /// Global conservation invariant failed (fatal)
    #[error("'net flow sum: {sum} != 0' global invariant failed")]
    NetFlowSum { sum: i128 },

    /// Record-level problems in a run that treats them as fatal
    #[error("{mismatches} record mismatches and {failures} failed checks")]
    RecordFailures { mismatches: usize, failures: usize },
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("network {0:?} is not a supported network")]
    UnsupportedNetwork(String),

    #[error("network {network}: {source}")]
    InvalidAddress {
        network: String,
        #[source]
        source: AddressParseError,
    },

    #[error("invalid setting {field}: {reason}")]
    InvalidSetting { field: &'static str, reason: String },
}
