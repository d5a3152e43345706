//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use rewards_store::RetentionPolicy;
use tracing::info;

use crate::delegation_state::LmdbDelegationStateStore;
use crate::LmdbError;

/// Named databases inside the environment.
const MAX_DBS: u32 = 4;

const DELEGATION_STATES_DB: &str = "delegation_states";

/// Default map size: 16 GiB of address space, grown into lazily by LMDB.
pub const DEFAULT_MAP_SIZE: usize = 16 * 1024 * 1024 * 1024;

/// Wraps the LMDB environment and its database handles.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    delegation_states: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment in the directory `path`.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per process and directory;
        // nothing else maps the same files with different options.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(MAX_DBS)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let delegation_states: Database<Bytes, Bytes> =
            env.create_database(&mut wtxn, Some(DELEGATION_STATES_DB))?;
        wtxn.commit()?;

        info!(path = %path.display(), map_size, "opened LMDB environment");
        Ok(Self {
            env: Arc::new(env),
            delegation_states,
        })
    }

    /// Delegation state store backed by this environment.
    pub fn delegation_state_store(&self, retention: RetentionPolicy) -> LmdbDelegationStateStore {
        LmdbDelegationStateStore {
            env: Arc::clone(&self.env),
            states_db: self.delegation_states,
            retention,
        }
    }
}
