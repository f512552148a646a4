//! # SQLite Driver
//!
//! Collections stored as rows of the shared `documents` table.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │               find_one_and_update / find_one_and_delete                 │
//! │                                                                         │
//! │  BEGIN IMMEDIATE   ← takes the database write lock; other writers      │
//! │       │              wait up to busy_timeout                            │
//! │       ▼                                                                 │
//! │  1. Scan rows of the collection ORDER BY seq                            │
//! │     (or one row by id when the filter is a plain _id lookup)            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  2. First row whose hydrated body matches the filter                    │
//! │       │            none? ──► ROLLBACK, Ok(None)                         │
//! │       ▼                                                                 │
//! │  3. UPDATE/DELETE ... WHERE seq = ?   (revision + 1 on update)          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Match and write see the same snapshot, so concurrent writers queue    │
//! │  instead of failing.                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docrepo_core::{Filter, Metadata, RawDocument, Update};
use futures_util::TryStreamExt;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::{hydrated, require_id, Collection, ReturnDocument};
use crate::error::{DbError, DbResult};

/// Opens a transaction holding the write lock from its first statement.
const BEGIN_WRITE: &str = "BEGIN IMMEDIATE";

/// One row of the `documents` table.
#[derive(Debug, sqlx::FromRow)]
struct DocumentRow {
    seq: i64,
    id: String,
    body: String,
    revision: i64,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
}

impl DocumentRow {
    fn metadata(&self) -> Metadata {
        Metadata {
            revision: self.revision,
            created_at: self.created_at,
            modified_at: self.modified_at,
        }
    }

    /// The stored body without metadata.
    fn body(&self) -> DbResult<RawDocument> {
        Ok(RawDocument::from_json(&self.body)?)
    }

    /// The body as callers see it.
    fn view(&self) -> DbResult<RawDocument> {
        Ok(hydrated(self.body()?, &self.metadata()))
    }
}

/// Finds the first matching row of `collection` along with its hydrated view.
///
/// Runs on the caller's connection so a write transaction sees its own
/// snapshot. The row stream is dropped before returning.
async fn first_match(
    conn: &mut SqliteConnection,
    collection: &str,
    filter: &Filter,
) -> DbResult<Option<(DocumentRow, RawDocument)>> {
    if let Some(id) = filter.id_equality() {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT seq, id, body, revision, created_at, modified_at
            FROM documents
            WHERE collection = ?1 AND id = ?2
            "#,
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        return match row {
            Some(row) => {
                let view = row.view()?;
                Ok(Some((row, view)))
            }
            None => Ok(None),
        };
    }

    let mut rows = sqlx::query_as::<_, DocumentRow>(
        r#"
        SELECT seq, id, body, revision, created_at, modified_at
        FROM documents
        WHERE collection = ?1
        ORDER BY seq ASC
        "#,
    )
    .bind(collection)
    .fetch(&mut *conn);

    while let Some(row) = rows.try_next().await? {
        let view = row.view()?;
        if filter.matches(&view)? {
            return Ok(Some((row, view)));
        }
    }
    Ok(None)
}

/// A named collection backed by SQLite.
#[derive(Debug, Clone)]
pub struct SqliteCollection {
    pool: SqlitePool,
    name: Arc<str>,
}

impl SqliteCollection {
    /// Creates a handle; no I/O happens until the first operation.
    pub fn new(pool: SqlitePool, name: impl Into<Arc<str>>) -> Self {
        SqliteCollection {
            pool,
            name: name.into(),
        }
    }

    /// Number of documents in the collection.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE collection = ?1")
                .bind(&*self.name)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

#[async_trait]
impl Collection for SqliteCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert_one(&self, mut doc: RawDocument) -> DbResult<RawDocument> {
        let id = require_id(&self.name, &doc)?;
        doc.strip_metadata();
        let body = doc.to_json()?;
        let meta = Metadata::created(Utc::now());

        let result = sqlx::query(
            r#"
            INSERT INTO documents (collection, id, body, revision, created_at, modified_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&*self.name)
        .bind(&id)
        .bind(&body)
        .bind(meta.revision)
        .bind(meta.created_at)
        .bind(meta.modified_at)
        .execute(&self.pool)
        .await;

        if let Err(err) = result {
            // The constraint message names the columns, not the value
            return Err(match DbError::from(err) {
                DbError::UniqueViolation { .. } => DbError::duplicate("_id", id),
                other => other,
            });
        }

        debug!(collection = %self.name, id = %id, "Inserted document");
        Ok(hydrated(doc, &meta))
    }

    async fn find(&self, filter: &Filter) -> DbResult<Vec<RawDocument>> {
        if filter.id_equality().is_some() {
            let mut conn = self.pool.acquire().await?;
            let found = first_match(&mut conn, &self.name, filter).await?;
            return Ok(found.map(|(_, view)| view).into_iter().collect());
        }

        let mut rows = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT seq, id, body, revision, created_at, modified_at
            FROM documents
            WHERE collection = ?1
            ORDER BY seq ASC
            "#,
        )
        .bind(&*self.name)
        .fetch(&self.pool);

        let mut found = Vec::new();
        while let Some(row) = rows.try_next().await? {
            let view = row.view()?;
            if filter.matches(&view)? {
                found.push(view);
            }
        }
        Ok(found)
    }

    async fn find_one(&self, filter: &Filter) -> DbResult<Option<RawDocument>> {
        let mut conn = self.pool.acquire().await?;
        let found = first_match(&mut conn, &self.name, filter).await?;
        Ok(found.map(|(_, view)| view))
    }

    async fn find_one_and_update(
        &self,
        filter: &Filter,
        update: &Update,
        returning: ReturnDocument,
    ) -> DbResult<Option<RawDocument>> {
        let mut tx = self.pool.begin_with(BEGIN_WRITE).await?;

        let Some((row, before)) = first_match(&mut tx, &self.name, filter).await? else {
            tx.rollback().await?;
            return Ok(None);
        };

        // An error from here on drops `tx`, which rolls back
        let mut body = update.apply(&row.body()?)?;
        body.strip_metadata();
        let meta = row.metadata().bumped(Utc::now());

        sqlx::query(
            r#"
            UPDATE documents
            SET body = ?1, revision = ?2, modified_at = ?3
            WHERE seq = ?4
            "#,
        )
        .bind(body.to_json()?)
        .bind(meta.revision)
        .bind(meta.modified_at)
        .bind(row.seq)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            collection = %self.name,
            id = %row.id,
            revision = meta.revision,
            "Updated document"
        );

        Ok(Some(match returning {
            ReturnDocument::Before => before,
            ReturnDocument::After => hydrated(body, &meta),
        }))
    }

    async fn find_one_and_delete(&self, filter: &Filter) -> DbResult<Option<RawDocument>> {
        let mut tx = self.pool.begin_with(BEGIN_WRITE).await?;

        let Some((row, view)) = first_match(&mut tx, &self.name, filter).await? else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query("DELETE FROM documents WHERE seq = ?1")
            .bind(row.seq)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(collection = %self.name, id = %row.id, "Deleted document");
        Ok(Some(view))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use serde_json::json;

    async fn users() -> SqliteCollection {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.collection("users")
    }

    fn raw(value: serde_json::Value) -> RawDocument {
        RawDocument::try_from(value).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_find_by_id() {
        let users = users().await;
        let stored = users
            .insert_one(raw(json!({"_id": "u-1", "name": "Ada", "_revision": 99})))
            .await
            .unwrap();
        assert_eq!(stored.metadata().unwrap().revision, 1);

        let found = users
            .find_one(&Filter::new(json!({"_id": "u-1"})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, stored);
        assert_eq!(users.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_id_maps_to_unique_violation() {
        let users = users().await;
        users.insert_one(raw(json!({"_id": "u-1"}))).await.unwrap();

        let err = users.insert_one(raw(json!({"_id": "u-1"}))).await.unwrap_err();
        match err {
            DbError::UniqueViolation { field, value } => {
                assert_eq!(field, "_id");
                assert_eq!(value, "u-1");
            }
            other => panic!("expected UniqueViolation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let users = db.collection("users");
        let orders = db.collection("orders");

        users.insert_one(raw(json!({"_id": "x"}))).await.unwrap();
        orders.insert_one(raw(json!({"_id": "x"}))).await.unwrap();

        assert_eq!(users.find(&Filter::all()).await.unwrap().len(), 1);
        assert_eq!(orders.find(&Filter::all()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_scan_filters_in_insertion_order() {
        let users = users().await;
        for (id, age) in [("c", 30), ("a", 40), ("b", 30)] {
            users
                .insert_one(raw(json!({"_id": id, "age": age})))
                .await
                .unwrap();
        }

        let found = users
            .find(&Filter::new(json!({"age": {"$lt": 35}})))
            .await
            .unwrap();
        let ids: Vec<_> = found.iter().filter_map(|d| d.id()).collect();
        assert_eq!(ids, vec!["c", "b"]);
    }

    #[tokio::test]
    async fn test_update_persists_and_bumps_revision() {
        let users = users().await;
        users
            .insert_one(raw(json!({"_id": "u-1", "tags": ["a"]})))
            .await
            .unwrap();

        let after = users
            .find_one_and_update(
                &Filter::new(json!({"tags": "a"})),
                &Update::new(json!({"$set": {"tags": ["a", "b"]}})),
                ReturnDocument::After,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.get_path("tags"), Some(&json!(["a", "b"])));
        assert_eq!(after.metadata().unwrap().revision, 2);

        let reread = users.find_one(&Filter::all()).await.unwrap().unwrap();
        assert_eq!(reread, after);
    }

    #[tokio::test]
    async fn test_delete_then_miss() {
        let users = users().await;
        users.insert_one(raw(json!({"_id": "u-1"}))).await.unwrap();

        let filter = Filter::new(json!({"_id": "u-1"}));
        assert!(users.find_one_and_delete(&filter).await.unwrap().is_some());
        assert!(users.find_one_and_delete(&filter).await.unwrap().is_none());
        assert_eq!(users.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_invalid_filter_surfaces_query_error() {
        let users = users().await;
        users.insert_one(raw(json!({"_id": "u-1"}))).await.unwrap();

        let err = users
            .find(&Filter::new(json!({"age": {"$between": [1, 2]}})))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Query(_)));
    }

    #[tokio::test]
    async fn test_rejected_update_rolls_back_and_releases_lock() {
        let users = users().await;
        users
            .insert_one(raw(json!({"_id": "u-1", "name": "Ada"})))
            .await
            .unwrap();
        let filter = Filter::new(json!({"_id": "u-1"}));

        let err = users
            .find_one_and_update(
                &filter,
                &Update::new(json!({"$set": {"_revision": 7}})),
                ReturnDocument::After,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Query(_)));

        // A miss ends its transaction too
        let missed = users
            .find_one_and_update(
                &Filter::new(json!({"name": "nobody"})),
                &Update::new(json!({"$set": {"name": "x"}})),
                ReturnDocument::After,
            )
            .await
            .unwrap();
        assert!(missed.is_none());

        // The single in-memory connection is usable again
        let before = users
            .find_one_and_update(
                &filter,
                &Update::new(json!({"$set": {"name": "Grace"}})),
                ReturnDocument::Before,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(before.get_path("name"), Some(&json!("Ada")));
        assert_eq!(before.metadata().unwrap().revision, 1);

        users.insert_one(raw(json!({"_id": "u-2"}))).await.unwrap();
        assert_eq!(users.count().await.unwrap(), 2);
    }
}
