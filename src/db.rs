// src/db.rs
//
// Thin sled wrapper. One tree per collection, values stored as JSON.
use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};
use sled::Db;
use std::sync::Arc;

/// Tree holding per-collection id counters.
const SEQUENCES_TREE: &str = "__sequences";

/// Collections managed by this service, in seed/export order.
pub const COLLECTIONS: &[&str] = &["users", "vehicles", "slots", "requests", "logs"];

#[derive(Clone)]
pub struct Database {
    pub db: Arc<Db>,
}

impl Database {
    pub fn new(path: &str) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Next numeric id for a collection, starting at 1. Atomic per key, so
    /// concurrent inserts never hand out the same id.
    pub fn next_id(&self, collection: &str) -> Result<u64> {
        let tree = self.db.open_tree(SEQUENCES_TREE)?;
        let prev = tree.fetch_and_update(collection, |old| {
            let next = old.map(be_u64).unwrap_or(0).saturating_add(1);
            Some(next.to_be_bytes().to_vec())
        })?;
        Ok(prev.as_deref().map(be_u64).unwrap_or(0) + 1)
    }

    pub fn insert<T: Serialize>(&self, collection: &str, key: &str, value: &T) -> Result<()> {
        let tree = self.db.open_tree(collection)?;
        let serialized = serde_json::to_vec(value)?;
        tree.insert(key, serialized)?;
        self.db.flush()?;
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, collection: &str, key: &str) -> Result<Option<T>> {
        let tree = self.db.open_tree(collection)?;
        if let Some(data) = tree.get(key)? {
            let value: T = serde_json::from_slice(&data)?;
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }

    /// All values in key order. Numeric collections use zero-padded keys,
    /// so this is ascending id order, which is insertion order.
    pub fn list<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>> {
        let tree = self.db.open_tree(collection)?;
        let mut items = Vec::new();

        for result in tree.iter() {
            let (_key, value) = result?;
            let item: T = serde_json::from_slice(&value)?;
            items.push(item);
        }

        Ok(items)
    }

    pub fn delete(&self, collection: &str, key: &str) -> Result<bool> {
        let tree = self.db.open_tree(collection)?;
        let existed = tree.remove(key)?.is_some();
        self.db.flush()?;
        Ok(existed)
    }

    pub fn update<T: Serialize>(&self, collection: &str, key: &str, value: &T) -> Result<()> {
        self.insert(collection, key, value)
    }

    pub fn count(&self, collection: &str) -> Result<usize> {
        let tree = self.db.open_tree(collection)?;
        Ok(tree.len())
    }

    /// Drop all records in a collection and reset its id counter.
    pub fn clear(&self, collection: &str) -> Result<()> {
        let tree = self.db.open_tree(collection)?;
        tree.clear()?;
        let seq = self.db.open_tree(SEQUENCES_TREE)?;
        seq.remove(collection)?;
        self.db.flush()?;
        Ok(())
    }

    /// Export every managed collection as one JSON document keyed by
    /// collection name. Used by the `db dump` CLI command.
    pub fn export_json(&self) -> Result<serde_json::Value> {
        let mut doc = serde_json::Map::new();
        for collection in COLLECTIONS {
            let items: Vec<serde_json::Value> = self.list(collection)?;
            doc.insert((*collection).to_string(), serde_json::Value::Array(items));
        }
        Ok(serde_json::Value::Object(doc))
    }

    pub fn flush(&self) -> Result<usize> {
        Ok(self.db.flush()?)
    }
}

/// Zero-padded sled key so lexicographic tree order matches numeric id order.
pub fn id_key(id: u64) -> String {
    format!("{:020}", id)
}

fn be_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    if bytes.len() == 8 {
        buf.copy_from_slice(bytes);
    }
    u64::from_be_bytes(buf)
}
