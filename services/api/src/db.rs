//! Data Access Layer
//!
//! Planning state lives in JSON documents addressed by slash-separated paths
//! (`users/{uid}/plan/user_plan`, ...). `DocumentStore` is the repository seam:
//! PostgreSQL backs it in production, an in-memory map in tests.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use sqlx::{PgPool, Row, types::Json};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// One write inside a [`DocumentStore::transact`] batch.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentWrite {
    pub path: String,
    pub data: Value,
    /// Shallow-merge top-level fields into the existing document instead of replacing it.
    pub merge: bool,
}

impl DocumentWrite {
    pub fn replace(path: impl Into<String>, data: Value) -> Self {
        Self {
            path: path.into(),
            data,
            merge: false,
        }
    }

    pub fn merge(path: impl Into<String>, data: Value) -> Self {
        Self {
            path: path.into(),
            data,
            merge: true,
        }
    }
}

/// Get / set / transact over JSON documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Option<Value>>;

    async fn set(&self, path: &str, data: Value, merge: bool) -> Result<()>;

    /// Applies every write or none of them.
    async fn transact(&self, writes: Vec<DocumentWrite>) -> Result<()>;
}

impl<'a> dyn DocumentStore + 'a {
    /// Reads a document and decodes it into `T`.
    pub async fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        match self.get(path).await? {
            Some(value) => {
                let doc = serde_json::from_value(value)
                    .with_context(|| format!("Document '{path}' has an unexpected shape"))?;
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    /// Encodes `doc` and writes it over whatever is stored at `path`.
    pub async fn put<T: Serialize + Sync>(&self, path: &str, doc: &T) -> Result<()> {
        self.set(path, serde_json::to_value(doc)?, false).await
    }
}

/// Merges `incoming` into `existing` the way a document database does: top-level
/// fields of `incoming` win, anything else is kept. Non-objects are replaced.
pub fn merge_documents(existing: Option<Value>, incoming: Value) -> Value {
    match (existing, incoming) {
        (Some(Value::Object(mut current)), Value::Object(fields)) => {
            current.extend(fields);
            Value::Object(current)
        }
        (_, incoming) => incoming,
    }
}

/// `DocumentStore` over a single JSONB table.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

const SELECT_DOCUMENT: &str = "SELECT data FROM documents WHERE path = $1";

const REPLACE_DOCUMENT: &str = r#"
    INSERT INTO documents (path, data, updated_at)
    VALUES ($1, $2, now())
    ON CONFLICT (path) DO UPDATE SET data = EXCLUDED.data, updated_at = now()
"#;

const MERGE_DOCUMENT: &str = r#"
    INSERT INTO documents (path, data, updated_at)
    VALUES ($1, $2, now())
    ON CONFLICT (path) DO UPDATE SET data = documents.data || EXCLUDED.data, updated_at = now()
"#;

fn upsert_statement(merge: bool) -> &'static str {
    if merge { MERGE_DOCUMENT } else { REPLACE_DOCUMENT }
}

impl PgDocumentStore {
    /// Creates a new `PgDocumentStore` instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs all pending `sqlx` migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, path: &str) -> Result<Option<Value>> {
        let row = sqlx::query(SELECT_DOCUMENT)
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let Json(data): Json<Value> = row.try_get("data")?;
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, path: &str, data: Value, merge: bool) -> Result<()> {
        sqlx::query(upsert_statement(merge))
            .bind(path)
            .bind(Json(data))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn transact(&self, writes: Vec<DocumentWrite>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for write in writes {
            sqlx::query(upsert_statement(write.merge))
                .bind(&write.path)
                .bind(Json(write.data))
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to write '{}'", write.path))?;
        }
        tx.commit().await?;
        Ok(())
    }
}

/// `DocumentStore` kept in process memory.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<String, Value>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored path starting with `prefix`, sorted.
    pub async fn paths_with_prefix(&self, prefix: &str) -> Vec<String> {
        let documents = self.documents.read().await;
        let mut paths: Vec<String> = documents
            .keys()
            .filter(|p| p.starts_with(prefix))
            .cloned()
            .collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, path: &str) -> Result<Option<Value>> {
        Ok(self.documents.read().await.get(path).cloned())
    }

    async fn set(&self, path: &str, data: Value, merge: bool) -> Result<()> {
        let mut documents = self.documents.write().await;
        let next = if merge {
            merge_documents(documents.remove(path), data)
        } else {
            data
        };
        documents.insert(path.to_string(), next);
        Ok(())
    }

    async fn transact(&self, writes: Vec<DocumentWrite>) -> Result<()> {
        let mut documents = self.documents.write().await;
        for write in writes {
            let next = if write.merge {
                merge_documents(documents.remove(&write.path), write.data)
            } else {
                write.data
            };
            documents.insert(write.path, next);
        }
        Ok(())
    }
}

/// The `users/{uid}` account document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(default)]
    pub account_type: Option<String>,
    #[serde(default)]
    pub selected_profile_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Account {
    pub fn is_family(&self) -> bool {
        self.account_type.as_deref() == Some("family")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("A profileId is required for family accounts")]
    ProfileRequired,
}

/// Where one student's documents live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPaths {
    account: String,
    base: String,
    profile_id: Option<String>,
}

impl DocumentPaths {
    pub fn account_path(user_id: &str) -> String {
        format!("users/{user_id}")
    }

    /// Resolves the student's document root. Family accounts keep one subtree per
    /// student profile, picked by `requested` or the account's `selectedProfileId`.
    pub fn resolve(
        user_id: &str,
        account: &Account,
        requested: Option<&str>,
    ) -> Result<Self, PathError> {
        let account_path = Self::account_path(user_id);
        if !account.is_family() {
            return Ok(Self {
                base: account_path.clone(),
                account: account_path,
                profile_id: None,
            });
        }
        let profile_id = requested
            .filter(|id| !id.trim().is_empty())
            .or(account.selected_profile_id.as_deref())
            .ok_or(PathError::ProfileRequired)?;
        Ok(Self {
            base: format!("{account_path}/studentProfiles/{profile_id}"),
            account: account_path,
            profile_id: Some(profile_id.to_string()),
        })
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn profile_id(&self) -> Option<&str> {
        self.profile_id.as_deref()
    }

    pub fn profile(&self) -> String {
        format!("{}/privateProfile/profile", self.base)
    }

    pub fn plan(&self) -> String {
        format!("{}/plan/user_plan", self.base)
    }

    pub fn performance(&self) -> String {
        format!("{}/performance_analytics/summary", self.base)
    }

    pub fn gamification(&self) -> String {
        format!("{}/gamification/data", self.base)
    }

    pub fn study_session(&self, session_id: &str) -> String {
        format!("{}/study_sessions/{session_id}", self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn family(selected: Option<&str>) -> Account {
        Account {
            account_type: Some("family".to_string()),
            selected_profile_id: selected.map(String::from),
            extra: Map::new(),
        }
    }

    #[test]
    fn test_single_account_paths() {
        let paths = DocumentPaths::resolve("u1", &Account::default(), Some("ignored")).unwrap();

        assert_eq!(paths.account(), "users/u1");
        assert_eq!(paths.profile(), "users/u1/privateProfile/profile");
        assert_eq!(paths.plan(), "users/u1/plan/user_plan");
        assert_eq!(paths.performance(), "users/u1/performance_analytics/summary");
        assert_eq!(paths.gamification(), "users/u1/gamification/data");
        assert_eq!(paths.profile_id(), None);
    }

    #[test]
    fn test_family_account_paths() {
        let paths = DocumentPaths::resolve("u1", &family(Some("p9")), None).unwrap();
        assert_eq!(
            paths.plan(),
            "users/u1/studentProfiles/p9/plan/user_plan"
        );

        let paths = DocumentPaths::resolve("u1", &family(Some("p9")), Some("p2")).unwrap();
        assert_eq!(
            paths.profile(),
            "users/u1/studentProfiles/p2/privateProfile/profile"
        );
        assert_eq!(paths.profile_id(), Some("p2"));

        assert_eq!(
            DocumentPaths::resolve("u1", &family(None), None),
            Err(PathError::ProfileRequired)
        );
    }

    #[test]
    fn test_merge_documents_is_shallow() {
        let merged = merge_documents(
            Some(json!({"a": 1, "nested": {"x": 1, "y": 2}})),
            json!({"b": 2, "nested": {"x": 5}}),
        );
        assert_eq!(merged, json!({"a": 1, "b": 2, "nested": {"x": 5}}));

        assert_eq!(merge_documents(None, json!({"a": 1})), json!({"a": 1}));
        assert_eq!(merge_documents(Some(json!([1])), json!({"a": 1})), json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_in_memory_store_set_and_merge() {
        let store = InMemoryDocumentStore::new();
        store.set("users/u1", json!({"a": 1}), false).await.unwrap();
        store.set("users/u1", json!({"b": 2}), true).await.unwrap();
        assert_eq!(
            store.get("users/u1").await.unwrap(),
            Some(json!({"a": 1, "b": 2}))
        );

        store.set("users/u1", json!({"c": 3}), false).await.unwrap();
        assert_eq!(store.get("users/u1").await.unwrap(), Some(json!({"c": 3})));
        assert_eq!(store.get("users/u2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_in_memory_transact_and_typed_reads() {
        let store = InMemoryDocumentStore::new();
        store
            .transact(vec![
                DocumentWrite::replace("users/u1", json!({"accountType": "family", "plan": "pro"})),
                DocumentWrite::merge("users/u1", json!({"selectedProfileId": "p1"})),
                DocumentWrite::replace("users/u1/gamification/data", json!({"xp": 10})),
            ])
            .await
            .unwrap();

        let store: &dyn DocumentStore = &store;
        let account: Account = store.get_as("users/u1").await.unwrap().unwrap();
        assert!(account.is_family());
        assert_eq!(account.selected_profile_id.as_deref(), Some("p1"));
        assert_eq!(account.extra.get("plan"), Some(&json!("pro")));

        let missing: Option<Account> = store.get_as("users/none").await.unwrap();
        assert!(missing.is_none());
    }
}
