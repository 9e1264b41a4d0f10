//! JSON-RPC `eth_call` source

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::abi::{self, Token, Word};
use super::{AuthoritativeSource, FlowState, IndexState, SubscriptionState};
use crate::error::{ChainError, ChainResult};
use crate::types::{Address, FlowRate};

const GET_NET_FLOW: &str = "getNetFlow(address,address)";
const GET_FLOW: &str = "getFlow(address,address,address)";
const GET_INDEX: &str = "getIndex(address,address,uint32)";
const GET_SUBSCRIPTION: &str = "getSubscription(address,address,uint32,address)";

/// Reads agreement state from an Ethereum JSON-RPC node.
pub struct RpcSource {
    url: String,
    cfa: Address,
    ida: Address,
    client: Client,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// One in-flight call, for error context.
struct Call {
    method: &'static str,
    args: String,
}

impl Call {
    fn decode_err(&self, reason: impl Into<String>) -> ChainError {
        ChainError::Decode {
            method: self.method,
            args: self.args.clone(),
            reason: reason.into(),
        }
    }
}

impl RpcSource {
    pub fn new(url: impl Into<String>, cfa: Address, ida: Address, timeout_secs: u64) -> ChainResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|source| ChainError::Transport {
                method: "<client>",
                args: String::new(),
                source,
            })?;
        Ok(Self {
            url: url.into(),
            cfa,
            ida,
            client,
            next_id: AtomicU64::new(1),
        })
    }

    /// `eth_call` pinned to `at_block`, returning at least `words` words.
    async fn eth_call(
        &self,
        call: &Call,
        to: Address,
        data: Vec<u8>,
        at_block: u64,
        words: usize,
    ) -> ChainResult<Vec<Word>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "eth_call",
            "params": [
                { "to": to.to_string(), "data": format!("0x{}", hex::encode(&data)) },
                format!("0x{:x}", at_block),
            ],
        });

        let transport = |source| ChainError::Transport {
            method: call.method,
            args: call.args.clone(),
            source,
        };
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(transport)?
            .error_for_status()
            .map_err(transport)?;
        let parsed: RpcResponse = response.json().await.map_err(transport)?;
        debug!(method = call.method, args = %call.args, at_block, "eth_call");
        decode_response(call, parsed, words)
    }
}

fn decode_response(call: &Call, response: RpcResponse, words: usize) -> ChainResult<Vec<Word>> {
    if let Some(error) = response.error {
        return Err(ChainError::Rpc {
            method: call.method,
            args: call.args.clone(),
            code: error.code,
            message: error.message,
        });
    }
    let result = response
        .result
        .ok_or_else(|| call.decode_err("response has neither result nor error"))?;
    let raw = hex::decode(result.trim_start_matches("0x"))
        .map_err(|e| call.decode_err(format!("result is not hex: {}", e)))?;
    abi::split_words(&raw, words).map_err(|reason| call.decode_err(reason))
}

fn decoded<T>(call: &Call, value: Result<T, String>) -> ChainResult<T> {
    value.map_err(|reason| call.decode_err(reason))
}

#[async_trait]
impl AuthoritativeSource for RpcSource {
    async fn get_net_flow(&self, token: Address, account: Address, at_block: u64) -> ChainResult<FlowRate> {
        let call = Call {
            method: "getNetFlow",
            args: format!("{}, {}", token, account),
        };
        let data = abi::encode_call(GET_NET_FLOW, &[Token::Address(token), Token::Address(account)]);
        let words = self.eth_call(&call, self.cfa, data, at_block, 1).await?;
        decoded(&call, abi::decode_int(&words[0]))
    }

    async fn get_flow(
        &self,
        token: Address,
        sender: Address,
        receiver: Address,
        at_block: u64,
    ) -> ChainResult<FlowState> {
        let call = Call {
            method: "getFlow",
            args: format!("{}, {}, {}", token, sender, receiver),
        };
        let data = abi::encode_call(
            GET_FLOW,
            &[Token::Address(token), Token::Address(sender), Token::Address(receiver)],
        );
        // (timestamp, flowRate, deposit, owedDeposit)
        let words = self.eth_call(&call, self.cfa, data, at_block, 4).await?;
        Ok(FlowState {
            updated_at_timestamp: decoded(&call, abi::decode_u64(&words[0]))?,
            flow_rate: decoded(&call, abi::decode_int(&words[1]))?,
        })
    }

    async fn get_index(
        &self,
        token: Address,
        publisher: Address,
        index_id: u32,
        at_block: u64,
    ) -> ChainResult<IndexState> {
        let call = Call {
            method: "getIndex",
            args: format!("{}, {}, {}", token, publisher, index_id),
        };
        let data = abi::encode_call(
            GET_INDEX,
            &[Token::Address(token), Token::Address(publisher), Token::Uint(index_id.into())],
        );
        let words = self.eth_call(&call, self.ida, data, at_block, 4).await?;
        Ok(IndexState {
            exists: decoded(&call, abi::decode_bool(&words[0]))?,
            index_value: decoded(&call, abi::decode_uint(&words[1]))?,
            total_units_approved: decoded(&call, abi::decode_uint(&words[2]))?,
            total_units_pending: decoded(&call, abi::decode_uint(&words[3]))?,
        })
    }

    async fn get_subscription(
        &self,
        token: Address,
        publisher: Address,
        index_id: u32,
        subscriber: Address,
        at_block: u64,
    ) -> ChainResult<SubscriptionState> {
        let call = Call {
            method: "getSubscription",
            args: format!("{}, {}, {}, {}", token, publisher, index_id, subscriber),
        };
        let data = abi::encode_call(
            GET_SUBSCRIPTION,
            &[
                Token::Address(token),
                Token::Address(publisher),
                Token::Uint(index_id.into()),
                Token::Address(subscriber),
            ],
        );
        let words = self.eth_call(&call, self.ida, data, at_block, 4).await?;
        Ok(SubscriptionState {
            exists: decoded(&call, abi::decode_bool(&words[0]))?,
            approved: decoded(&call, abi::decode_bool(&words[1]))?,
            units: decoded(&call, abi::decode_uint(&words[2]))?,
            pending_distribution: decoded(&call, abi::decode_uint(&words[3]))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call() -> Call {
        Call {
            method: "getIndex",
            args: "a, b, 0".to_string(),
        }
    }

    #[test]
    fn test_rpc_error_keeps_call_context() {
        let response: RpcResponse = serde_json::from_value(serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32000, "message": "header not found" }
        }))
        .unwrap();
        match decode_response(&call(), response, 4).unwrap_err() {
            ChainError::Rpc {
                method,
                args,
                code,
                message,
            } => {
                assert_eq!(method, "getIndex");
                assert_eq!(args, "a, b, 0");
                assert_eq!(code, -32000);
                assert_eq!(message, "header not found");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_result_is_split_into_words() {
        let mut raw = vec![0u8; 128];
        raw[31] = 1;
        raw[63] = 50;
        let response = RpcResponse {
            result: Some(format!("0x{}", hex::encode(&raw))),
            error: None,
        };
        let words = decode_response(&call(), response, 4).unwrap();
        assert!(abi::decode_bool(&words[0]).unwrap());
        assert_eq!(abi::decode_uint(&words[1]).unwrap(), 50);
    }

    #[test]
    fn test_short_result_is_a_decode_error() {
        let response = RpcResponse {
            result: Some("0x".to_string()),
            error: None,
        };
        assert!(matches!(
            decode_response(&call(), response, 4),
            Err(ChainError::Decode { .. })
        ));
    }
}
