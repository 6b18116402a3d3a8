//! Adapter configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chaind_types::ChainSpec;
use chaind_utils::LogFormat;

use crate::registry::{DispatcherKind, StoreBackend};
use crate::{AdapterError, RetryPolicy};

/// Configuration for a chaind instance.
///
/// Can be loaded from a TOML file via [`ChaindConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChaindConfig {
    /// Chain the queue belongs to, as `arch:fork:network_id`.
    #[serde(default)]
    pub chain: ChainSpec,

    /// Parent directory of all per-chain stores.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Store backend: "fs" or "lmdb".
    #[serde(default = "default_store_backend")]
    pub store_backend: String,

    /// Create the store if it does not exist yet.
    #[serde(default = "default_true")]
    pub create_store: bool,

    /// Repair derived store structures on open.
    #[serde(default)]
    pub store_sync: bool,

    /// LMDB map size in bytes.
    #[serde(default = "default_lmdb_map_size")]
    pub lmdb_map_size: usize,

    /// Dispatcher: "json-rpc" or "log".
    #[serde(default = "default_dispatcher")]
    pub dispatcher: String,

    /// Node endpoint for the JSON-RPC dispatcher.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// JSON-RPC method used to submit a raw transaction.
    #[serde(default = "default_rpc_method")]
    pub rpc_method: String,

    /// Maximum records in flight at once. 0 means no limit.
    #[serde(default = "default_dispatch_limit")]
    pub dispatch_limit: usize,

    /// Pause between dispatch passes.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Seconds after which an in-network record counts as stalled. 0 disables.
    #[serde(default)]
    pub pending_retry_threshold: u64,

    /// Send attempts after which an unreachable node fails the record
    /// instead of deferring it. 0 means defer forever.
    #[serde(default)]
    pub error_retry_threshold: u32,

    /// Log format: "human" or "json".
    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub retry: RetryConfig,
}

/// Store retry pacing, in milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Total tries per operation. 0 means unbounded.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./chaind_data")
}

fn default_store_backend() -> String {
    StoreBackend::Fs.as_str().to_string()
}

fn default_true() -> bool {
    true
}

fn default_lmdb_map_size() -> usize {
    chaind_store_lmdb::DEFAULT_MAP_SIZE
}

fn default_dispatcher() -> String {
    DispatcherKind::JsonRpc.as_str().to_string()
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_rpc_method() -> String {
    crate::rpc::DEFAULT_METHOD.to_string()
}

fn default_dispatch_limit() -> usize {
    16
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    4000
}

fn default_max_attempts() -> u32 {
    20
}

// ── Impl ───────────────────────────────────────────────────────────────

impl ChaindConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, AdapterError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, AdapterError> {
        toml::from_str(s).map_err(|e| AdapterError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, AdapterError> {
        toml::to_string_pretty(self).map_err(|e| AdapterError::Config(e.to_string()))
    }

    /// Directory of this chain's store: `<data_dir>/<arch>_<fork>_<network_id>`.
    pub fn store_root(&self) -> PathBuf {
        self.data_dir.join(self.chain.path_segment())
    }

    pub fn backend(&self) -> Result<StoreBackend, AdapterError> {
        self.store_backend.parse()
    }

    pub fn dispatcher_kind(&self) -> Result<DispatcherKind, AdapterError> {
        self.dispatcher.parse()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Check the named components before anything is opened.
    pub fn validate(&self) -> Result<(), AdapterError> {
        self.backend()?;
        if self.dispatcher_kind()? == DispatcherKind::JsonRpc && self.rpc_url.is_empty() {
            return Err(AdapterError::Config(
                "json-rpc dispatcher needs rpc_url".to_string(),
            ));
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(AdapterError::Config(format!(
                "retry.max_delay_ms ({}) is below retry.base_delay_ms ({})",
                self.retry.max_delay_ms, self.retry.base_delay_ms
            )));
        }
        Ok(())
    }
}

impl Default for ChaindConfig {
    fn default() -> Self {
        Self {
            chain: ChainSpec::default(),
            data_dir: default_data_dir(),
            store_backend: default_store_backend(),
            create_store: default_true(),
            store_sync: false,
            lmdb_map_size: default_lmdb_map_size(),
            dispatcher: default_dispatcher(),
            rpc_url: default_rpc_url(),
            rpc_method: default_rpc_method(),
            dispatch_limit: default_dispatch_limit(),
            poll_interval_ms: default_poll_interval_ms(),
            pending_retry_threshold: 0,
            error_retry_threshold: 0,
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            retry: RetryConfig::default(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            max_attempts: self.max_attempts,
            deadline: self.deadline_ms.map(Duration::from_millis),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
            deadline_ms: None,
        }
    }
}
