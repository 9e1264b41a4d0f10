//! GraphQL client for the indexed store

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::queries::{self, Query};
use super::{IndexedStore, PageVariables};
use crate::error::{IndexerError, IndexerResult};

/// Talks to a subgraph-style GraphQL endpoint over HTTP.
pub struct GraphQlClient {
    endpoint: String,
    client: Client,
}

#[derive(Serialize)]
struct Request<'a, V> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    variables: Option<V>,
}

#[derive(Debug, Deserialize)]
struct Response {
    data: Option<serde_json::Value>,
    #[serde(default)]
    errors: Vec<GraphQlErrorMessage>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorMessage {
    message: String,
}

impl GraphQlClient {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> IndexerResult<Self> {
        let endpoint = endpoint.into();
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|source| IndexerError::Http {
                query: "<client>".to_string(),
                source,
            })?;
        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn request<V: Serialize>(
        &self,
        query: &Query,
        variables: Option<V>,
    ) -> IndexerResult<serde_json::Value> {
        let variables_json = variables
            .as_ref()
            .and_then(|v| serde_json::to_string(v).ok())
            .unwrap_or_default();
        let body = Request {
            query: query.document,
            variables,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|source| IndexerError::Http {
                query: query.name.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(IndexerError::Server {
                query: query.name.to_string(),
                status,
                message,
            });
        }

        let parsed: Response = response.json().await.map_err(|source| IndexerError::Http {
            query: query.name.to_string(),
            source,
        })?;
        extract_data(query, &variables_json, parsed)
    }
}

/// Unwrap `data`, turning a GraphQL `errors` array into an error.
fn extract_data(query: &Query, variables: &str, response: Response) -> IndexerResult<serde_json::Value> {
    if !response.errors.is_empty() {
        let message = response
            .errors
            .into_iter()
            .map(|e| e.message)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(IndexerError::Query {
            query: query.name.to_string(),
            variables: variables.to_string(),
            message,
        });
    }
    response.data.ok_or_else(|| IndexerError::InvalidResponse {
        query: query.name.to_string(),
        reason: "response has neither data nor errors".to_string(),
    })
}

fn extract_rows(query: &Query, mut data: serde_json::Value) -> IndexerResult<Vec<serde_json::Value>> {
    match data.get_mut("response").map(serde_json::Value::take) {
        Some(serde_json::Value::Array(rows)) => Ok(rows),
        _ => Err(IndexerError::InvalidResponse {
            query: query.name.to_string(),
            reason: "missing `response` array".to_string(),
        }),
    }
}

fn extract_block_number(query: &Query, data: &serde_json::Value) -> IndexerResult<u64> {
    data.pointer("/_meta/block/number")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| IndexerError::InvalidResponse {
            query: query.name.to_string(),
            reason: "missing _meta.block.number".to_string(),
        })
}

#[async_trait]
impl IndexedStore for GraphQlClient {
    async fn latest_indexed_block(&self) -> IndexerResult<u64> {
        let query = &queries::LATEST_BLOCK;
        let data = self.request::<()>(query, None).await?;
        let block = extract_block_number(query, &data)?;
        debug!(endpoint = %self.endpoint, block, "Latest indexed block");
        Ok(block)
    }

    async fn query_page(
        &self,
        query: &Query,
        variables: PageVariables,
    ) -> IndexerResult<Vec<serde_json::Value>> {
        let data = self.request(query, Some(variables)).await?;
        extract_rows(query, data)
    }
}
