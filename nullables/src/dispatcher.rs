//! Nullable dispatcher: record sends without touching the network.

use chaind_store::{DispatchError, Dispatcher};
use std::collections::VecDeque;
use std::sync::Mutex;

/// A test dispatcher that records every wire it is given.
///
/// Outcomes are scripted: each call pops the next scripted result, and once
/// the script is empty every send succeeds.
pub struct NullDispatcher {
    sent: Mutex<Vec<String>>,
    script: Mutex<VecDeque<Result<String, DispatchError>>>,
}

impl NullDispatcher {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
        }
    }

    /// A dispatcher whose first send is rejected with an RPC error.
    pub fn rejecting(code: i64, message: &str) -> Self {
        let d = Self::new();
        d.push_error(DispatchError::Rpc {
            code,
            message: message.to_string(),
        });
        d
    }

    /// Script the next outcome to be an error.
    pub fn push_error(&self, err: DispatchError) {
        self.script.lock().unwrap().push_back(Err(err));
    }

    /// Script the next outcome to be a success with the given response.
    pub fn push_ok(&self, response: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Ok(response.to_string()));
    }

    /// Get all wires handed to `send` (for assertions).
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Clear all state.
    pub fn reset(&self) {
        self.sent.lock().unwrap().clear();
        self.script.lock().unwrap().clear();
    }
}

impl Default for NullDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher for NullDispatcher {
    fn send(&self, wire: &str) -> Result<String, DispatchError> {
        self.sent.lock().unwrap().push(wire.to_string());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(wire.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_outcomes_then_success() {
        let d = NullDispatcher::rejecting(-32000, "nonce too low");
        assert!(matches!(d.send("0x01"), Err(DispatchError::Rpc { code: -32000, .. })));
        assert_eq!(d.send("0x02").unwrap(), "0x02");
        assert_eq!(d.sent(), vec!["0x01".to_string(), "0x02".to_string()]);
    }
}
