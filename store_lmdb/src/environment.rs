//! LMDB environment setup.

use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};

use crate::LmdbError;

const MAX_DBS: u32 = 4;
const SCHEMA_VERSION_KEY: &[u8] = b"schema_version";

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Env,
    /// `tx_hash` → bincode `TxRecord`.
    pub(crate) records_db: Database<Bytes, Bytes>,
    /// `seq` (big-endian) → `tx_hash`; iteration order is allocation order.
    pub(crate) sequence_db: Database<Bytes, Bytes>,
    /// Counters and schema version.
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment in the existing directory `path`.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        // SAFETY: the environment is opened once per process per path and
        // the memory map is never modified outside of LMDB.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(MAX_DBS)
                .open(path)?
        };
        let mut wtxn = env.write_txn()?;
        let records_db = env.create_database(&mut wtxn, Some("records"))?;
        let sequence_db = env.create_database(&mut wtxn, Some("sequence"))?;
        let meta_db = env.create_database(&mut wtxn, Some("meta"))?;
        wtxn.commit()?;
        Ok(Self {
            env,
            records_db,
            sequence_db,
            meta_db,
        })
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub(crate) fn read_txn(&self) -> Result<RoTxn<'_>, LmdbError> {
        Ok(self.env.read_txn()?)
    }

    pub(crate) fn write_txn(&self) -> Result<RwTxn<'_>, LmdbError> {
        Ok(self.env.write_txn()?)
    }

    pub fn get_schema_version(&self) -> Result<u32, LmdbError> {
        let rtxn = self.read_txn()?;
        match self.meta_db.get(&rtxn, SCHEMA_VERSION_KEY)? {
            Some(bytes) => {
                let arr: [u8; 4] = bytes.try_into().map_err(|_| {
                    LmdbError::Serialization("schema_version has unexpected byte length".to_string())
                })?;
                Ok(u32::from_le_bytes(arr))
            }
            None => Ok(0),
        }
    }

    pub fn set_schema_version(&self, version: u32) -> Result<(), LmdbError> {
        let mut wtxn = self.write_txn()?;
        self.put_schema_version(&mut wtxn, version)?;
        wtxn.commit()?;
        Ok(())
    }

    pub(crate) fn put_schema_version(
        &self,
        wtxn: &mut RwTxn<'_>,
        version: u32,
    ) -> Result<(), LmdbError> {
        self.meta_db
            .put(wtxn, SCHEMA_VERSION_KEY, &version.to_le_bytes())?;
        Ok(())
    }
}
