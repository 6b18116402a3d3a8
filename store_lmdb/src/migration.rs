//! Schema versioning for the queue environment.
//!
//! The meta database holds the schema version. Opening an older environment
//! applies each missing step in order; each step and its version stamp
//! commit in one write transaction, so an interrupted upgrade resumes from
//! the last completed step.

use heed::RwTxn;

use crate::queue::NEXT_SEQ_KEY;
use crate::{LmdbEnvironment, LmdbError};

/// Schema version written by this build.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

struct Step {
    /// Version the step upgrades to.
    to: u32,
    name: &'static str,
    apply: fn(&LmdbEnvironment, &mut RwTxn<'_>) -> Result<(), LmdbError>,
}

const STEPS: &[Step] = &[Step {
    to: 1,
    name: "seed sequence counter",
    apply: seed_sequence_counter,
}];

/// Brings an environment up to [`CURRENT_SCHEMA_VERSION`].
pub struct Migrator;

impl Migrator {
    /// Refuses environments stamped by a newer build.
    pub fn run(env: &LmdbEnvironment) -> Result<(), LmdbError> {
        let stored = env.get_schema_version()?;
        if stored > CURRENT_SCHEMA_VERSION {
            return Err(LmdbError::Heed(format!(
                "queue schema version {stored} is newer than supported version {CURRENT_SCHEMA_VERSION}"
            )));
        }
        for step in STEPS.iter().filter(|s| s.to > stored) {
            let mut wtxn = env.write_txn()?;
            (step.apply)(env, &mut wtxn)?;
            env.put_schema_version(&mut wtxn, step.to)?;
            wtxn.commit()?;
            tracing::info!(version = step.to, step = step.name, "queue schema upgraded");
        }
        Ok(())
    }
}

/// Make sure the counter sits past every allocated sequence number.
fn seed_sequence_counter(env: &LmdbEnvironment, wtxn: &mut RwTxn<'_>) -> Result<(), LmdbError> {
    let next = match env.sequence_db.last(wtxn)? {
        Some((key, _)) => {
            let arr: [u8; 8] = key.try_into().map_err(|_| {
                LmdbError::Serialization("sequence key has unexpected byte length".to_string())
            })?;
            u64::from_be_bytes(arr) + 1
        }
        None => 0,
    };
    if env.meta_db.get(wtxn, NEXT_SEQ_KEY)?.is_none() {
        env.meta_db.put(wtxn, NEXT_SEQ_KEY, &next.to_be_bytes())?;
    }
    Ok(())
}
