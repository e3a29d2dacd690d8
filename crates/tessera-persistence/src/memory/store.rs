//! Document collections for the in-memory engine

use std::collections::{BTreeMap, HashMap};

use tessera_common::{CollectionAccess, SyncMap};

/// Stored representation of an entity
pub type Document = serde_json::Value;

type Collection = BTreeMap<String, Document>;

/// Named collections of documents keyed by entity id
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: SyncMap<String, Collection>,
}

/// Full copy of a store, used to roll back
pub type StoreSnapshot = HashMap<String, Collection>;

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document
    pub fn put(&self, collection: &str, key: String, document: Document) {
        self.collections.write_with(|collections| {
            collections
                .entry(collection.to_string())
                .or_default()
                .insert(key, document);
        });
    }

    pub fn get(&self, collection: &str, key: &str) -> Option<Document> {
        self.collections
            .read_with(|collections| collections.get(collection)?.get(key).cloned())
    }

    /// Remove a document, returning whether it existed
    pub fn remove(&self, collection: &str, key: &str) -> bool {
        self.collections.write_with(|collections| {
            let Some(documents) = collections.get_mut(collection) else {
                return false;
            };
            let removed = documents.remove(key).is_some();
            if documents.is_empty() {
                collections.remove(collection);
            }
            removed
        })
    }

    pub fn contains(&self, collection: &str, key: &str) -> bool {
        self.collections.read_with(|collections| {
            collections
                .get(collection)
                .is_some_and(|documents| documents.contains_key(key))
        })
    }

    /// Every document of a collection, ordered by key
    pub fn all(&self, collection: &str) -> Vec<Document> {
        self.collections.read_with(|collections| {
            collections
                .get(collection)
                .map(|documents| documents.values().cloned().collect())
                .unwrap_or_default()
        })
    }

    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read_with(|collections| collections.get(collection).map_or(0, BTreeMap::len))
    }

    /// Names of non-empty collections
    pub fn collection_names(&self) -> Vec<String> {
        let mut names = self.collections.keys();
        names.sort();
        names
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.collections.snapshot()
    }

    pub fn restore(&self, snapshot: StoreSnapshot) {
        self.collections.restore(snapshot);
    }
}
