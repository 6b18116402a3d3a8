//! Dispatchers that ship transactions to a node.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chaind_store::{DispatchError, Dispatcher};
use serde_json::Value;

use crate::AdapterError;

/// Method used for raw transaction submission on EVM nodes.
pub const DEFAULT_METHOD: &str = "eth_sendRawTransaction";

/// Sends wires to a node over HTTP JSON-RPC.
///
/// A JSON-RPC `error` member is a rejection ([`DispatchError::Rpc`]).
/// Transport failures, non-2xx statuses and unusable bodies mean the node
/// was not reached ([`DispatchError::Unavailable`]).
pub struct JsonRpcDispatcher {
    http: reqwest::blocking::Client,
    url: String,
    method: String,
    next_id: AtomicU64,
}

impl JsonRpcDispatcher {
    pub fn new(url: impl Into<String>, method: impl Into<String>) -> Result<Self, AdapterError> {
        let http = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AdapterError::Config(format!("http client: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
            method: method.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn request(&self, wire: &str) -> Value {
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": self.method,
            "params": [wire],
        })
    }
}

/// Interpret a JSON-RPC response body.
fn parse_response(body: Value) -> Result<String, DispatchError> {
    if let Some(err) = body.get("error").filter(|e| !e.is_null()) {
        return Err(DispatchError::Rpc {
            code: err.get("code").and_then(Value::as_i64).unwrap_or(0),
            message: err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
    }
    match body.get("result") {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Ok(other.to_string()),
        None => Err(DispatchError::Unavailable(
            "response carries neither result nor error".to_string(),
        )),
    }
}

impl Dispatcher for JsonRpcDispatcher {
    fn send(&self, wire: &str) -> Result<String, DispatchError> {
        let response = self
            .http
            .post(&self.url)
            .json(&self.request(wire))
            .send()
            .map_err(|e| DispatchError::Unavailable(format!("request to {} failed: {e}", self.url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Unavailable(format!(
                "{} returned HTTP {status}",
                self.url
            )));
        }

        let body: Value = response
            .json()
            .map_err(|e| DispatchError::Unavailable(format!("invalid JSON from {}: {e}", self.url)))?;
        parse_response(body)
    }
}

/// Accepts every wire and only logs it. For dry runs.
#[derive(Default)]
pub struct LogDispatcher;

impl Dispatcher for LogDispatcher {
    fn send(&self, wire: &str) -> Result<String, DispatchError> {
        tracing::info!(len = wire.len(), wire, "dry run: not sending");
        Ok(wire.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn result_string_is_returned() {
        let body = json!({"jsonrpc": "2.0", "id": 1, "result": "0xabc"});
        assert_eq!(parse_response(body).unwrap(), "0xabc");
    }

    #[test]
    fn error_member_is_a_rejection() {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32000, "message": "nonce too low"}
        });
        assert_eq!(
            parse_response(body),
            Err(DispatchError::Rpc {
                code: -32000,
                message: "nonce too low".to_string()
            })
        );
    }

    #[test]
    fn null_error_is_ignored() {
        let body = json!({"jsonrpc": "2.0", "id": 1, "error": null, "result": "0x1"});
        assert_eq!(parse_response(body).unwrap(), "0x1");
    }

    #[test]
    fn empty_body_means_unavailable() {
        assert!(matches!(
            parse_response(json!({})),
            Err(DispatchError::Unavailable(_))
        ));
    }

    #[test]
    fn request_ids_increase() {
        let d = JsonRpcDispatcher::new("http://127.0.0.1:1", DEFAULT_METHOD).unwrap();
        let a = d.request("0x01");
        let b = d.request("0x02");
        assert_eq!(a["method"], DEFAULT_METHOD);
        assert_eq!(a["params"][0], "0x01");
        assert!(b["id"].as_u64() > a["id"].as_u64());
    }

    #[test]
    fn unreachable_node_is_unavailable() {
        // Port 1 on loopback refuses connections.
        let d = JsonRpcDispatcher::new("http://127.0.0.1:1", DEFAULT_METHOD).unwrap();
        assert!(matches!(d.send("0x01"), Err(DispatchError::Unavailable(_))));
    }

    #[test]
    fn log_dispatcher_accepts_everything() {
        assert_eq!(LogDispatcher.send("0xdead").unwrap(), "0xdead");
    }
}
