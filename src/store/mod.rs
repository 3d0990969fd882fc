//! Persistent routine storage.
//!
//! `RoutineStore` is the seam the analyzer depends on; `SqliteRoutineStore`
//! is the shipped implementation over a local SQLite file.

pub mod db;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::analyzer::types::AnalysisRecord;
use crate::error::{Result, SkincareError};
use crate::routine::{Comment, RoutineRecord};

pub use db::RoutineDb;

/// Keyed access to `community_builds` rows.
#[async_trait]
pub trait RoutineStore: Send + Sync {
    async fn fetch_one(&self, shareable_id: &str) -> Result<RoutineRecord>;

    /// Overwrite the routine's analysis slot. No version check: last write wins.
    async fn update_analysis(&self, shareable_id: &str, record: &AnalysisRecord) -> Result<()>;

    async fn delete(&self, shareable_id: &str) -> Result<()>;
}

/// Async wrapper around [`RoutineDb`].
///
/// Each call opens the database on a blocking thread, the same way the
/// other SQLite-backed stores in this crate are used from async code.
#[derive(Debug, Clone)]
pub struct SqliteRoutineStore {
    db_path: PathBuf,
}

impl SqliteRoutineStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn with_db<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&RoutineDb) -> Result<T> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let db = RoutineDb::new(&db_path)?;
            op(&db)
        })
        .await
        .map_err(|e| SkincareError::Persistence(format!("Store task panicked: {}", e)))?
    }

    pub async fn insert(&self, record: RoutineRecord) -> Result<()> {
        self.with_db(move |db| db.insert(&record)).await
    }

    pub async fn add_comment(&self, shareable_id: &str, comment: Comment) -> Result<()> {
        let shareable_id = shareable_id.to_string();
        self.with_db(move |db| db.add_comment(&shareable_id, &comment))
            .await
    }
}

#[async_trait]
impl RoutineStore for SqliteRoutineStore {
    async fn fetch_one(&self, shareable_id: &str) -> Result<RoutineRecord> {
        let shareable_id = shareable_id.to_string();
        self.with_db(move |db| db.fetch_one(&shareable_id)).await
    }

    async fn update_analysis(&self, shareable_id: &str, record: &AnalysisRecord) -> Result<()> {
        let shareable_id = shareable_id.to_string();
        let record = record.clone();
        self.with_db(move |db| db.update_analysis(&shareable_id, &record))
            .await
    }

    async fn delete(&self, shareable_id: &str) -> Result<()> {
        let shareable_id = shareable_id.to_string();
        self.with_db(move |db| db.delete(&shareable_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_async_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = SqliteRoutineStore::new(dir.path().join("nested").join("builds.db"));

        let mut record = RoutineRecord::new("Glass skin");
        record.skin_concerns = vec!["dullness".to_string()];
        let id = record.shareable_id.clone();
        store.insert(record.clone()).await.unwrap();

        let fetched = store.fetch_one(&id).await.unwrap();
        assert_eq!(fetched, record);

        store
            .add_comment(&id, Comment::new("u1", "Dana", Some("https://a/1.png".into()), "Love it"))
            .await
            .unwrap();
        let fetched = store.fetch_one(&id).await.unwrap();
        assert_eq!(fetched.comments[0].avatar_url.as_deref(), Some("https://a/1.png"));

        store.delete(&id).await.unwrap();
        assert!(matches!(
            store.fetch_one(&id).await,
            Err(SkincareError::RoutineNotFound(_))
        ));
    }
}
