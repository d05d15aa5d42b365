//! Document store layer
//!
//! Flat JSON documents grouped in named collections and addressed by key.
//! Uses in-memory storage for development; Postgres when a URL is configured.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::StoreError;

pub mod postgres;
pub use postgres::PostgresDocumentStore;

pub type Document = Map<String, Value>;

/// Store-side filter: `field in values`, then an optional limit.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub field_in: Option<(String, Vec<String>)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn field_in(mut self, field: &str, values: Vec<String>) -> Self {
        self.field_in = Some((field.to_string(), values));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn accepts(&self, doc: &Document) -> bool {
        match &self.field_in {
            Some((field, values)) => doc
                .get(field)
                .and_then(Value::as_str)
                .map(|v| values.iter().any(|wanted| wanted == v))
                .unwrap_or(false),
            None => true,
        }
    }
}

/// Trait for document persistence. Results come back ordered by key.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError>;

    /// Create or overwrite.
    async fn set(&self, collection: &str, key: &str, doc: Document) -> Result<(), StoreError>;

    /// Overwrite the given fields of an existing document.
    async fn update(&self, collection: &str, key: &str, fields: Document) -> Result<(), StoreError>;

    /// Append `items` to the array at `field` and merge `fields`, creating
    /// the document when missing. Atomic per document: concurrent appends
    /// never drop each other's items. A non-array `field` is replaced.
    async fn append_array(
        &self,
        collection: &str,
        key: &str,
        field: &str,
        items: Vec<Value>,
        fields: Document,
    ) -> Result<(), StoreError>;

    /// Deleting a missing document is not an error.
    async fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError>;

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// Write every document in one atomic commit.
    async fn batch_set(&self, collection: &str, docs: Vec<(String, Document)>) -> Result<(), StoreError>;
}

/// In-memory document store for development and tests
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<HashMap<String, BTreeMap<String, Document>>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(key))
            .cloned())
    }

    async fn set(&self, collection: &str, key: &str, doc: Document) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), doc);
        Ok(())
    }

    async fn update(&self, collection: &str, key: &str, fields: Document) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let existing = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(key))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                key: key.to_string(),
            })?;

        existing.extend(fields);
        Ok(())
    }

    async fn append_array(
        &self,
        collection: &str,
        key: &str,
        field: &str,
        items: Vec<Value>,
        fields: Document,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let doc = collections
            .entry(collection.to_string())
            .or_default()
            .entry(key.to_string())
            .or_default();

        match doc.get_mut(field) {
            Some(Value::Array(existing)) => existing.extend(items),
            _ => {
                doc.insert(field.to_string(), Value::Array(items));
            }
        }
        doc.extend(fields);
        Ok(())
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        if let Some(docs) = collections.get_mut(collection) {
            docs.remove(key);
        }
        Ok(())
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        Ok(docs
            .values()
            .filter(|doc| query.accepts(doc))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn batch_set(&self, collection: &str, docs: Vec<(String, Document)>) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let target = collections.entry(collection.to_string()).or_default();
        for (key, doc) in docs {
            target.insert(key, doc);
        }
        Ok(())
    }
}

/// Pick the store backend: Postgres when a URL is given, in-memory otherwise.
pub fn build_store(url: Option<&str>) -> Arc<dyn DocumentStore> {
    if let Some(url) = url {
        match PostgresDocumentStore::connect_lazy(url) {
            Ok(store) => {
                info!("Document store backend: postgres");
                return Arc::new(store);
            }
            Err(error) => {
                warn!(
                    "Failed to initialize postgres document store, falling back to in-memory: {}",
                    error
                );
            }
        }
    }

    info!("Document store backend: in-memory");
    Arc::new(InMemoryDocumentStore::new())
}
