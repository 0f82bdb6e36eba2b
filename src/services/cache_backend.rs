//! Key/value store under the Read Cache
//!
//! Each key holds one of three value shapes: a flat string hash, an ordered
//! list of strings, or a set of strings. Every write replaces the value of a
//! single key in one step, so readers never observe a half-written key.
//! Concurrency between the single writer and many readers is left to the
//! backend; the in-process implementation relies on moka's concurrent map.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};

use crate::error::CacheError;

#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Replace the hash stored at `key`.
    async fn put_hash(&self, key: &str, fields: HashMap<String, String>) -> Result<(), CacheError>;

    /// Fields of the hash at `key`; empty when the key is absent.
    async fn get_hash(&self, key: &str) -> Result<HashMap<String, String>, CacheError>;

    /// Replace the list stored at `key`.
    async fn put_list(&self, key: &str, values: Vec<String>) -> Result<(), CacheError>;

    /// Elements of the list at `key` in insertion order; empty when absent.
    async fn get_list(&self, key: &str) -> Result<Vec<String>, CacheError>;

    /// Add `member` to the set at `key`, creating the set if needed.
    async fn add_to_set(&self, key: &str, member: &str) -> Result<(), CacheError>;

    /// Members of the set at `key` in ascending order; empty when absent.
    async fn set_members(&self, key: &str) -> Result<Vec<String>, CacheError>;

    /// Approximate number of keys held.
    fn entry_count(&self) -> u64;
}

#[derive(Debug, Clone)]
enum CacheValue {
    Hash(Arc<HashMap<String, String>>),
    List(Arc<Vec<String>>),
    Set(Arc<BTreeSet<String>>),
}

impl CacheValue {
    fn kind(&self) -> &'static str {
        match self {
            CacheValue::Hash(_) => "hash",
            CacheValue::List(_) => "list",
            CacheValue::Set(_) => "set",
        }
    }
}

/// In-process backend on a moka future cache.
///
/// Unbounded with no TTL: an entry lives until overwritten. The sub-keys of
/// one order must never be evicted independently of each other.
#[derive(Clone)]
pub struct MokaCacheBackend {
    cache: Cache<String, CacheValue>,
}

impl MokaCacheBackend {
    pub fn new() -> Self {
        Self {
            cache: Cache::builder().build(),
        }
    }

    async fn get_value(&self, key: &str) -> Option<CacheValue> {
        self.cache.get(key).await
    }

    /// Flush moka's deferred maintenance so counts and evictions are settled.
    #[cfg(test)]
    pub(crate) async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}

impl Default for MokaCacheBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn wrong_type(key: &str, expected: &'static str, found: &CacheValue) -> CacheError {
    CacheError::WrongType {
        key: key.to_string(),
        expected,
        found: found.kind(),
    }
}

#[async_trait]
impl CacheBackend for MokaCacheBackend {
    async fn put_hash(&self, key: &str, fields: HashMap<String, String>) -> Result<(), CacheError> {
        self.cache
            .insert(key.to_string(), CacheValue::Hash(Arc::new(fields)))
            .await;
        Ok(())
    }

    async fn get_hash(&self, key: &str) -> Result<HashMap<String, String>, CacheError> {
        match self.get_value(key).await {
            None => Ok(HashMap::new()),
            Some(CacheValue::Hash(fields)) => Ok(fields.as_ref().clone()),
            Some(other) => Err(wrong_type(key, "hash", &other)),
        }
    }

    async fn put_list(&self, key: &str, values: Vec<String>) -> Result<(), CacheError> {
        self.cache
            .insert(key.to_string(), CacheValue::List(Arc::new(values)))
            .await;
        Ok(())
    }

    async fn get_list(&self, key: &str) -> Result<Vec<String>, CacheError> {
        match self.get_value(key).await {
            None => Ok(Vec::new()),
            Some(CacheValue::List(values)) => Ok(values.as_ref().clone()),
            Some(other) => Err(wrong_type(key, "list", &other)),
        }
    }

    async fn add_to_set(&self, key: &str, member: &str) -> Result<(), CacheError> {
        let member = member.to_string();
        let result = self
            .cache
            .entry(key.to_string())
            .and_compute_with(|existing| {
                let op = match existing.map(|entry| entry.into_value()) {
                    None => Op::Put(CacheValue::Set(Arc::new(BTreeSet::from([member])))),
                    Some(CacheValue::Set(members)) if members.contains(&member) => Op::Nop,
                    Some(CacheValue::Set(members)) => {
                        let mut members = members.as_ref().clone();
                        members.insert(member);
                        Op::Put(CacheValue::Set(Arc::new(members)))
                    }
                    // Left untouched; reported below
                    Some(_) => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;

        match result {
            CompResult::Unchanged(entry) => match entry.into_value() {
                CacheValue::Set(_) => Ok(()),
                other => Err(wrong_type(key, "set", &other)),
            },
            _ => Ok(()),
        }
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, CacheError> {
        match self.get_value(key).await {
            None => Ok(Vec::new()),
            Some(CacheValue::Set(members)) => Ok(members.iter().cloned().collect()),
            Some(other) => Err(wrong_type(key, "set", &other)),
        }
    }

    fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}
