//! TTL cache of validation verdicts keyed by `"{name}:{content hash}"`.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::OwnedMutexGuard;
use tokio::time::Instant;

use crate::keyed_lock::KeyedLock;
use crate::node_class::NodeClass;

use super::ValidationResult;

#[derive(Serialize)]
struct HashedFields<'a> {
    subnets: Vec<(&'a str, &'a str)>,
    labels: &'a std::collections::BTreeMap<String, String>,
    disk_type: &'a str,
    disk_size_bytes: u64,
    security_groups: Vec<&'a str>,
    accelerated_network: bool,
    core_fractions: Vec<u8>,
}

/// Cache key for a node class: its name plus a hash of every field that
/// affects validation. Lists are hashed as sets.
#[must_use]
pub fn cache_key(class: &NodeClass) -> String {
    let mut subnets: Vec<(&str, &str)> = class
        .status
        .subnets
        .iter()
        .map(|subnet| (subnet.id.as_str(), subnet.zone.as_str()))
        .collect();
    subnets.sort_unstable();
    subnets.dedup();
    let mut security_groups: Vec<&str> = class
        .spec
        .security_groups
        .iter()
        .map(|group| group.as_str())
        .collect();
    security_groups.sort_unstable();
    security_groups.dedup();
    let mut core_fractions: Vec<u8> = class
        .spec
        .core_fractions
        .iter()
        .map(|fraction| fraction.percent())
        .collect();
    core_fractions.sort_unstable();
    core_fractions.dedup();

    let fields = HashedFields {
        subnets,
        labels: &class.spec.labels,
        disk_type: &class.spec.disk_type,
        disk_size_bytes: class.spec.disk_size_bytes,
        security_groups,
        accelerated_network: class.spec.accelerated_network,
        core_fractions,
    };
    let mut hasher = Sha256::new();
    // Serialising plain strings, maps and integers cannot fail.
    if let Ok(bytes) = serde_json::to_vec(&fields) {
        hasher.update(&bytes);
    }
    let digest = hasher.finalize();
    let prefix = digest.get(..8).unwrap_or_default();
    format!("{}:{}", class.name, hex::encode(prefix))
}

#[derive(Clone, Debug)]
struct Entry {
    result: ValidationResult,
    stored_at: Instant,
}

/// Shared verdict cache. Reads and writes for one key are serialised through
/// [`ValidationCache::lock`].
#[derive(Debug)]
pub struct ValidationCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
    locks: KeyedLock<String>,
}

impl ValidationCache {
    /// Creates an empty cache whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
            locks: KeyedLock::new(),
        }
    }

    /// Serialises check-then-compute for one key.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        self.locks.lock(&key.to_owned()).await
    }

    /// Returns a live entry, evicting it when expired.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<ValidationResult> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.result.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Stores a verdict and drops entries for the same node class under
    /// other hashes.
    pub fn insert(&self, key: &str, result: ValidationResult) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(name) = owner(key) {
            entries.retain(|existing, _| existing == key || owner(existing) != Some(name));
        }
        entries.insert(
            key.to_owned(),
            Entry {
                result,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drops every entry for a node class.
    pub fn clear(&self, name: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|existing, _| owner(existing) != Some(name));
    }

    /// Number of stored entries, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Reports whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn owner(key: &str) -> Option<&str> {
    key.rsplit_once(':').map(|(name, _)| name)
}
