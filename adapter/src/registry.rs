//! Named components selectable from configuration.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chaind_store::{Dispatcher, QueueStore, StoreError};
use chaind_store_fs::FsQueueStore;
use chaind_store_lmdb::LmdbQueueStore;
use serde::{Deserialize, Serialize};

use crate::rpc::{JsonRpcDispatcher, LogDispatcher};
use crate::{AdapterBuilder, AdapterError, ChaindAdapter, ChaindConfig};

/// A store picked at runtime.
pub type DynStore = Box<dyn QueueStore + Send + Sync>;

/// A dispatcher picked at runtime.
pub type DynDispatcher = Box<dyn Dispatcher>;

/// The adapter the daemon runs.
pub type DynAdapter = ChaindAdapter<DynStore, DynDispatcher>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DispatcherKind {
    JsonRpc,
    Log,
}

impl DispatcherKind {
    pub const ALL: [DispatcherKind; 2] = [DispatcherKind::JsonRpc, DispatcherKind::Log];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JsonRpc => "json-rpc",
            Self::Log => "log",
        }
    }

    pub fn build(&self, config: &ChaindConfig) -> Result<DynDispatcher, AdapterError> {
        let dispatcher: DynDispatcher = match self {
            Self::JsonRpc => Box::new(JsonRpcDispatcher::new(&config.rpc_url, &config.rpc_method)?),
            Self::Log => Box::new(LogDispatcher),
        };
        Ok(dispatcher)
    }
}

impl FromStr for DispatcherKind {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s || (*k == Self::JsonRpc && s == "jsonrpc"))
            .ok_or_else(|| AdapterError::UnknownDispatcher(s.to_string()))
    }
}

impl fmt::Display for DispatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Fs,
    Lmdb,
}

impl StoreBackend {
    pub const ALL: [StoreBackend; 2] = [StoreBackend::Fs, StoreBackend::Lmdb];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fs => "fs",
            Self::Lmdb => "lmdb",
        }
    }

    /// Open the store under `root`, creating it first when `create` is set.
    pub fn connect(
        &self,
        root: &Path,
        create: bool,
        map_size: usize,
    ) -> Result<DynStore, StoreError> {
        let store: DynStore = match (self, create) {
            (Self::Fs, true) => Box::new(FsQueueStore::create(root)?),
            (Self::Fs, false) => Box::new(FsQueueStore::open(root)?),
            (Self::Lmdb, true) => Box::new(LmdbQueueStore::create(root, map_size)?),
            (Self::Lmdb, false) => Box::new(LmdbQueueStore::open(root, map_size)?),
        };
        Ok(store)
    }
}

impl FromStr for StoreBackend {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| AdapterError::UnknownBackend(s.to_string()))
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the adapter described by `config`.
pub fn open_adapter(config: &ChaindConfig) -> Result<DynAdapter, AdapterError> {
    config.validate()?;
    let backend = config.backend()?;
    let dispatcher = config.dispatcher_kind()?.build(config)?;
    let root = config.store_root();
    tracing::info!(
        chain = %config.chain,
        backend = %backend,
        dispatcher = %config.dispatcher,
        root = %root.display(),
        "opening adapter"
    );
    AdapterBuilder::new(config.chain.clone(), dispatcher)
        .retry(config.retry.policy())
        .pending_retry_threshold(config.pending_retry_threshold)
        .error_retry_threshold(config.error_retry_threshold)
        .store_sync(config.store_sync)
        .open(|| backend.connect(&root, config.create_store, config.lmdb_map_size))
}
