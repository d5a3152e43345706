//! LMDB implementation of DelegationStateStore.
//!
//! Key layout: `cycle (8 bytes, big-endian, sign bit flipped) ++ delegate address`.
//! Keys sort by cycle first, so a cycle's states are one contiguous range,
//! pruning is a single `delete_range`, and the last key holds the highest cycle.

use std::ops::Bound;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};
use rewards_store::{DelegationStateStore, RetentionPolicy, StoreError, StoredDelegationState};
use rewards_types::{Address, Cycle};
use tracing::debug;

use crate::LmdbError;

const CYCLE_KEY_LEN: usize = 8;

/// Order-preserving encoding of a signed cycle.
fn cycle_key(cycle: Cycle) -> [u8; CYCLE_KEY_LEN] {
    ((cycle as u64) ^ (1 << 63)).to_be_bytes()
}

fn decode_cycle_key(bytes: &[u8]) -> Result<Cycle, LmdbError> {
    let prefix: [u8; CYCLE_KEY_LEN] = bytes
        .get(..CYCLE_KEY_LEN)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| LmdbError::Corruption(format!("key too short: {} bytes", bytes.len())))?;
    Ok((u64::from_be_bytes(prefix) ^ (1 << 63)) as Cycle)
}

fn state_key(delegate: &Address, cycle: Cycle) -> Vec<u8> {
    let mut key = Vec::with_capacity(CYCLE_KEY_LEN + delegate.as_str().len());
    key.extend_from_slice(&cycle_key(cycle));
    key.extend_from_slice(delegate.as_str().as_bytes());
    key
}

pub struct LmdbDelegationStateStore {
    pub(crate) env: Arc<Env>,
    pub(crate) states_db: Database<Bytes, Bytes>,
    pub(crate) retention: RetentionPolicy,
}

impl DelegationStateStore for LmdbDelegationStateStore {
    fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    fn get(&self, delegate: &Address, cycle: Cycle) -> Result<StoredDelegationState, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let bytes = self
            .states_db
            .get(&rtxn, &state_key(delegate, cycle))
            .map_err(LmdbError::from)?
            .ok_or_else(|| LmdbError::NotFound(format!("delegation state {delegate}@{cycle}")))?;
        let state = bincode::deserialize(bytes).map_err(LmdbError::from)?;
        Ok(state)
    }

    fn upsert(&self, state: &StoredDelegationState) -> Result<(), StoreError> {
        let key = state_key(state.delegate(), state.cycle());
        let bytes = bincode::serialize(state).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.states_db
            .put(&mut wtxn, &key, &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        debug!(delegate = %state.delegate(), cycle = state.cycle(), "stored delegation state");
        Ok(())
    }

    fn exists(&self, delegate: &Address, cycle: Cycle) -> Result<bool, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let found = self
            .states_db
            .get(&rtxn, &state_key(delegate, cycle))
            .map_err(LmdbError::from)?
            .is_some();
        Ok(found)
    }

    fn states_for_cycle(&self, cycle: Cycle) -> Result<Vec<StoredDelegationState>, StoreError> {
        let lower = cycle_key(cycle);
        let upper = cycle_key(cycle.saturating_add(1));
        let bounds = if cycle == Cycle::MAX {
            (Bound::Included(lower.as_slice()), Bound::Unbounded)
        } else {
            (Bound::Included(lower.as_slice()), Bound::Excluded(upper.as_slice()))
        };

        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self
            .states_db
            .range(&rtxn, &bounds)
            .map_err(LmdbError::from)?;

        let mut states = Vec::new();
        for result in iter {
            let (_, bytes) = result.map_err(LmdbError::from)?;
            states.push(bincode::deserialize(bytes).map_err(LmdbError::from)?);
        }
        Ok(states)
    }

    fn delete_before(&self, cycle: Cycle) -> Result<usize, StoreError> {
        let upper = cycle_key(cycle);
        let bounds = (Bound::<&[u8]>::Unbounded, Bound::Excluded(upper.as_slice()));

        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let deleted = self
            .states_db
            .delete_range(&mut wtxn, &bounds)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        debug!(below = cycle, deleted, "pruned delegation states");
        Ok(deleted)
    }

    fn last_fetched_cycle(&self) -> Result<Cycle, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self.states_db.last(&rtxn).map_err(LmdbError::from)? {
            Some((key, _)) => Ok(decode_cycle_key(key)?),
            None => Ok(0),
        }
    }
}
