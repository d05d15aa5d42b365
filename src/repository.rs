//! Activity repository
//!
//! CRUD, search and bulk merge/import/export over the `Activities`
//! collection. Documents are keyed by activity name.

use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::{RepositoryError, StoreError};
use crate::models::{Activity, ActivityDraft, MergeStats, MergeStrategy};
use crate::store::{Document, DocumentStore, Query};

pub const ACTIVITIES_COLLECTION: &str = "Activities";
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

type Result<T> = std::result::Result<T, RepositoryError>;

#[derive(Clone)]
pub struct ActivityRepository {
    store: Arc<dyn DocumentStore>,
}

impl ActivityRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Clean and write, overwriting any document with the same name.
    pub async fn create(&self, draft: ActivityDraft) -> Result<Activity> {
        let activity = Activity::clean(draft)?;

        self.store
            .set(ACTIVITIES_COLLECTION, &activity.name, to_document(&activity)?)
            .await
            .map_err(|e| {
                error!("Error creating activity {}: {}", activity.name, e);
                RepositoryError::from(e)
            })?;

        debug!("Created activity {}", activity.name);
        Ok(activity)
    }

    pub async fn read(&self, name: &str) -> Result<Option<Activity>> {
        let doc = self.store.get(ACTIVITIES_COLLECTION, name).await.map_err(|e| {
            error!("Error reading activity {}: {}", name, e);
            RepositoryError::from(e)
        })?;

        doc.map(from_document).transpose()
    }

    /// Clean only the provided fields and merge them into the stored document.
    /// The name is the key and cannot be changed here.
    pub async fn update(&self, name: &str, partial: ActivityDraft) -> Result<()> {
        if let Some(new_name) = partial.name.as_deref() {
            if new_name.trim() != name {
                return Err(RepositoryError::Validation(format!(
                    "cannot rename '{}' to '{}'; delete and recreate instead",
                    name,
                    new_name.trim()
                )));
            }
        }

        let fields = partial_fields(partial);

        self.store
            .update(ACTIVITIES_COLLECTION, name, fields)
            .await
            .map_err(|e| match e {
                StoreError::NotFound { .. } => RepositoryError::NotFound(name.to_string()),
                other => {
                    error!("Error updating activity {}: {}", name, other);
                    RepositoryError::from(other)
                }
            })
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        self.store
            .delete(ACTIVITIES_COLLECTION, name)
            .await
            .map_err(|e| {
                error!("Error deleting activity {}: {}", name, e);
                RepositoryError::from(e)
            })
    }

    /// Store-side `category in categories` and limit, then keep activities
    /// whose keywords contain one of the interests (case-insensitive, whole
    /// keyword). No interests means no keyword filter.
    pub async fn search(
        &self,
        interests: &[String],
        categories: &[String],
        limit: usize,
    ) -> Result<Vec<Activity>> {
        let mut query = Query::all().limit(limit);
        if !categories.is_empty() {
            query = query.field_in("category", categories.to_vec());
        }

        let docs = self
            .store
            .query(ACTIVITIES_COLLECTION, &query)
            .await
            .map_err(|e| {
                error!("Error searching activities: {}", e);
                RepositoryError::from(e)
            })?;

        let activities = decode_all(docs);
        if interests.is_empty() {
            return Ok(activities);
        }

        Ok(activities
            .into_iter()
            .filter(|activity| activity.matches_any(interests))
            .collect())
    }

    /// Every stored activity, ordered by name.
    pub async fn list(&self) -> Result<Vec<Activity>> {
        let docs = self
            .store
            .query(ACTIVITIES_COLLECTION, &Query::all())
            .await?;
        Ok(decode_all(docs))
    }

    /// Create, update or skip each record. One bad record never aborts the batch.
    pub async fn merge(&self, drafts: Vec<ActivityDraft>, strategy: MergeStrategy) -> MergeStats {
        let mut stats = MergeStats::default();

        for draft in drafts {
            let label = draft.name.clone().unwrap_or_else(|| "unknown".to_string());
            match self.merge_one(draft, strategy).await {
                Ok(MergeOutcome::Created) => stats.created += 1,
                Ok(MergeOutcome::Updated) => stats.updated += 1,
                Ok(MergeOutcome::Skipped) => stats.skipped += 1,
                Err(e) => {
                    warn!("Error merging activity {}: {}", label, e);
                    stats.failed += 1;
                }
            }
        }

        info!(strategy = %strategy, "Merge finished: {}", stats);
        stats
    }

    async fn merge_one(&self, draft: ActivityDraft, strategy: MergeStrategy) -> Result<MergeOutcome> {
        let activity = Activity::clean(draft)?;
        let exists = self
            .store
            .get(ACTIVITIES_COLLECTION, &activity.name)
            .await?
            .is_some();

        if exists && strategy == MergeStrategy::Skip {
            return Ok(MergeOutcome::Skipped);
        }

        let doc = to_document(&activity)?;
        if exists {
            self.store.update(ACTIVITIES_COLLECTION, &activity.name, doc).await?;
            Ok(MergeOutcome::Updated)
        } else {
            self.store.set(ACTIVITIES_COLLECTION, &activity.name, doc).await?;
            Ok(MergeOutcome::Created)
        }
    }

    /// Write the whole collection to `path` as an indented JSON array.
    pub async fn export(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let activities = self.list().await.map_err(|e| {
            error!("Error exporting activities: {}", e);
            e
        })?;

        let body = serde_json::to_string_pretty(&activities)?;
        tokio::fs::write(path, body).await?;

        info!("Exported {} activities to {}", activities.len(), path.display());
        Ok(activities.len())
    }

    /// Read a JSON array from `path` and merge it. Elements that are not
    /// objects count as failed.
    pub async fn import(&self, path: impl AsRef<Path>, strategy: MergeStrategy) -> Result<MergeStats> {
        let items = read_items(path.as_ref()).await?;

        let mut failed = 0;
        let drafts: Vec<ActivityDraft> = items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<ActivityDraft>(item) {
                Ok(draft) => Some(draft),
                Err(e) => {
                    warn!("Skipping unreadable activity record: {}", e);
                    failed += 1;
                    None
                }
            })
            .collect();

        let mut stats = self.merge(drafts, strategy).await;
        stats.failed += failed;
        Ok(stats)
    }

    /// Batch-write every record of `path` in one atomic commit. Any invalid
    /// record rejects the whole file.
    pub async fn upload(&self, path: impl AsRef<Path>) -> Result<usize> {
        let items = read_items(path.as_ref()).await?;

        let mut docs = Vec::with_capacity(items.len());
        for item in items {
            let draft: ActivityDraft = serde_json::from_value(item)?;
            let activity = Activity::clean(draft)?;
            docs.push((activity.name.clone(), to_document(&activity)?));
        }

        let count = docs.len();
        self.store
            .batch_set(ACTIVITIES_COLLECTION, docs)
            .await
            .map_err(|e| {
                error!("Batch upload failed: {}", e);
                RepositoryError::from(e)
            })?;

        info!("Uploaded {} records to {}", count, ACTIVITIES_COLLECTION);
        Ok(count)
    }
}

enum MergeOutcome {
    Created,
    Updated,
    Skipped,
}

async fn read_items(path: &Path) -> Result<Vec<Value>> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        error!("Error reading activity file {}: {}", path.display(), e);
        RepositoryError::from(e)
    })?;
    Ok(serde_json::from_str(&raw)?)
}

fn to_document(activity: &Activity) -> Result<Document> {
    match serde_json::to_value(activity)? {
        Value::Object(map) => Ok(map),
        _ => Err(RepositoryError::Validation(
            "activity did not serialize to an object".to_string(),
        )),
    }
}

fn from_document(doc: Document) -> Result<Activity> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}

fn decode_all(docs: Vec<Document>) -> Vec<Activity> {
    docs.into_iter()
        .filter_map(|doc| match from_document(doc) {
            Ok(activity) => Some(activity),
            Err(e) => {
                warn!("Skipping malformed activity document: {}", e);
                None
            }
        })
        .collect()
}

/// Cleaned subset of the provided fields plus a fresh `last_updated`.
fn partial_fields(partial: ActivityDraft) -> Document {
    let mut fields = Map::new();

    if let Some(description) = partial.description {
        fields.insert("description".into(), Value::String(description.trim().to_string()));
    }
    if let Some(keywords) = partial.keywords {
        fields.insert(
            "keywords".into(),
            Value::Array(keywords.normalize().into_iter().map(Value::String).collect()),
        );
    }
    if let Some(link) = partial.link {
        fields.insert("link".into(), Value::String(link.trim().to_string()));
    }
    if let Some(category) = partial.category {
        fields.insert("category".into(), Value::String(category.trim().to_string()));
    }
    fields.insert(
        "last_updated".into(),
        Value::String(chrono::Utc::now().to_rfc3339()),
    );

    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryDocumentStore;
    use crate::store::testing::UnreachableStore;
    use serde_json::json;

    fn draft(value: Value) -> ActivityDraft {
        serde_json::from_value(value).unwrap()
    }

    fn repository() -> ActivityRepository {
        ActivityRepository::new(Arc::new(InMemoryDocumentStore::new()))
    }

    async fn seeded() -> ActivityRepository {
        let repo = repository();
        repo.create(draft(json!({
            "name": "A", "description": "first", "keywords": ["foo"],
            "link": "https://a.example", "category": "x"
        })))
        .await
        .unwrap();
        repo.create(draft(json!({
            "name": "B", "description": "second", "keywords": ["bar"],
            "link": "https://b.example", "category": "y"
        })))
        .await
        .unwrap();
        repo
    }

    #[tokio::test]
    async fn test_create_and_read() {
        let repo = repository();
        let created = repo
            .create(draft(json!({ "name": " Yoga ", "keywords": "fitness, calm" })))
            .await
            .unwrap();
        assert_eq!(created.name, "Yoga");

        let read = repo.read("Yoga").await.unwrap().unwrap();
        assert_eq!(read, created);
        assert!(repo.read("Pilates").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_merges_provided_fields() {
        let repo = seeded().await;
        let before = repo.read("A").await.unwrap().unwrap();

        repo.update("A", draft(json!({ "description": "  changed ", "keywords": "foo, baz" })))
            .await
            .unwrap();

        let after = repo.read("A").await.unwrap().unwrap();
        assert_eq!(after.description, "changed");
        assert_eq!(after.keywords, vec!["foo", "baz"]);
        assert_eq!(after.link, before.link);
        assert_eq!(after.category, before.category);
        assert!(after.last_updated >= before.last_updated);
    }

    #[tokio::test]
    async fn test_update_rejects_rename_and_missing() {
        let repo = seeded().await;
        let renamed = repo.update("A", draft(json!({ "name": "Z" }))).await;
        assert!(matches!(renamed, Err(RepositoryError::Validation(_))));

        let missing = repo.update("Nope", draft(json!({ "link": "x" }))).await;
        assert!(matches!(missing, Err(RepositoryError::NotFound(name)) if name == "Nope"));
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = seeded().await;
        repo.delete("A").await.unwrap();
        assert!(repo.read("A").await.unwrap().is_none());
        assert!(repo.read("B").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_search_filter_correctness() {
        let repo = seeded().await;

        let found = repo
            .search(&["foo".to_string()], &["x".to_string()], DEFAULT_SEARCH_LIMIT)
            .await
            .unwrap();
        let names: Vec<&str> = found.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["A"]);

        let none = repo
            .search(&["bar".to_string()], &["x".to_string()], DEFAULT_SEARCH_LIMIT)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_search_without_interests_or_categories() {
        let repo = seeded().await;

        let everything = repo.search(&[], &[], DEFAULT_SEARCH_LIMIT).await.unwrap();
        assert_eq!(everything.len(), 2);

        let limited = repo.search(&[], &[], 1).await.unwrap();
        assert_eq!(limited.len(), 1);

        let by_keyword = repo.search(&["BAR".to_string()], &[], DEFAULT_SEARCH_LIMIT).await.unwrap();
        assert_eq!(by_keyword.len(), 1);
        assert_eq!(by_keyword[0].name, "B");
    }

    #[tokio::test]
    async fn test_merge_statistics() {
        let existing = json!({ "name": "A", "description": "again", "keywords": ["foo"],
                               "link": "https://a.example", "category": "x" });
        let new = json!({ "name": "C", "description": "third", "keywords": ["baz"],
                          "link": "https://c.example", "category": "x" });

        let repo = seeded().await;
        let skip = repo
            .merge(vec![draft(existing.clone()), draft(new.clone())], MergeStrategy::Skip)
            .await;
        assert_eq!(skip, MergeStats { created: 1, updated: 0, skipped: 1, failed: 0 });
        assert_eq!(repo.read("A").await.unwrap().unwrap().description, "first");

        let repo = seeded().await;
        let update = repo
            .merge(vec![draft(existing), draft(new)], MergeStrategy::Update)
            .await;
        assert_eq!(update, MergeStats { created: 1, updated: 1, skipped: 0, failed: 0 });
        assert_eq!(repo.read("A").await.unwrap().unwrap().description, "again");
    }

    #[tokio::test]
    async fn test_merge_counts_bad_records_and_continues() {
        let repo = repository();
        let stats = repo
            .merge(
                vec![draft(json!({ "description": "nameless" })), draft(json!({ "name": "Ok" }))],
                MergeStrategy::Update,
            )
            .await;
        assert_eq!(stats, MergeStats { created: 1, updated: 0, skipped: 0, failed: 1 });
    }

    #[tokio::test]
    async fn test_unreachable_store_surfaces_as_error() {
        let repo = ActivityRepository::new(Arc::new(UnreachableStore));

        let search = repo.search(&[], &[], DEFAULT_SEARCH_LIMIT).await;
        assert!(matches!(search, Err(RepositoryError::Store(_))));

        let stats = repo.merge(vec![draft(json!({ "name": "A" }))], MergeStrategy::Update).await;
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn test_export_import_round_trip() {
        let repo = seeded().await;
        let before = repo.list().await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activities.json");
        assert_eq!(repo.export(&path).await.unwrap(), 2);

        let stats = repo.import(&path, MergeStrategy::Update).await.unwrap();
        assert_eq!(stats, MergeStats { created: 0, updated: 2, skipped: 0, failed: 0 });

        let after = repo.list().await.unwrap();
        assert_eq!(before.len(), after.len());
        for (b, a) in before.iter().zip(after.iter()) {
            assert!(b.same_content(a), "{:?} != {:?}", b, a);
        }

        let fresh = repository();
        let stats = fresh.import(&path, MergeStrategy::Skip).await.unwrap();
        assert_eq!(stats.created, 2);
    }

    #[tokio::test]
    async fn test_import_counts_non_object_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixed.json");
        std::fs::write(&path, r#"[{"name": "A"}, 42, "text"]"#).unwrap();

        let stats = repository().import(&path, MergeStrategy::Update).await.unwrap();
        assert_eq!(stats, MergeStats { created: 1, updated: 0, skipped: 0, failed: 2 });
    }

    #[tokio::test]
    async fn test_import_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = repository()
            .import(dir.path().join("absent.json"), MergeStrategy::Update)
            .await;
        assert!(matches!(result, Err(RepositoryError::Io(_))));
    }

    #[tokio::test]
    async fn test_upload_writes_all_or_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.json");
        std::fs::write(&good, r#"[{"name": "A", "keywords": "x, y"}, {"name": "B"}]"#).unwrap();
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, r#"[{"name": "C"}, {"name": "  "}]"#).unwrap();

        let repo = repository();
        assert_eq!(repo.upload(&good).await.unwrap(), 2);
        assert_eq!(repo.read("A").await.unwrap().unwrap().keywords, vec!["x", "y"]);

        assert!(repo.upload(&bad).await.is_err());
        assert!(repo.read("C").await.unwrap().is_none());
    }
}
