//! Fan-out helpers used by generated batch loaders.

use std::collections::BTreeMap;
use std::fmt::Debug;

use tonic::Status;

use crate::loader::LoadError;

/// Pairs the `n` requested keys with a positional list result.
pub fn by_position<V>(keys: usize, values: Vec<V>) -> Vec<Result<V, LoadError>> {
    let mut values = values.into_iter();
    (0..keys)
        .map(|position| {
            values
                .next()
                .ok_or_else(|| LoadError::MissingKey(format!("#{position}")))
        })
        .collect()
}

/// Pairs the requested keys with a keyed map result.
pub fn by_key<K, V>(keys: &[K], values: BTreeMap<K, V>) -> Vec<Result<V, LoadError>>
where
    K: Ord + Debug,
    V: Clone,
{
    keys.iter()
        .map(|key| {
            values
                .get(key)
                .cloned()
                .ok_or_else(|| LoadError::MissingKey(format!("{key:?}")))
        })
        .collect()
}

/// Takes the only result of a single-key batch.
pub fn single<V>(results: Vec<Result<V, LoadError>>) -> Result<V, Status> {
    results
        .into_iter()
        .next()
        .unwrap_or_else(|| Err(LoadError::MissingKey("#0".to_string())))
        .map_err(Status::from)
}
