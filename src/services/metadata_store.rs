//! Relational CRUD over the `files` metadata table.
//!
//! Every call is a single-row operation; there are no partial-write states
//! within one call. Consistency with the object store is the file service's
//! concern, not this module's.

use super::{FileError, FileResult};
use crate::models::file_record::{FileFilters, FileRecord, FileRecordUpdate, NewFileRecord};
use chrono::Utc;
use sqlx::types::Json;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::sync::Arc;
use tracing::debug;

const SELECT_COLUMNS: &str = "id, key, name, original_name, size, content_type, url, folder, \
     category, uploaded_by, is_public, metadata, created_at, updated_at";

/// SQLite-backed store for file metadata rows.
#[derive(Clone)]
pub struct MetadataStore {
    db: Arc<SqlitePool>,
}

impl MetadataStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Execute the embedded schema, statement by statement.
    pub async fn migrate(&self) -> FileResult<()> {
        let sql = include_str!("../../migrations/0001_init.sql");
        let statements = sql
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        debug!("running {} migration statements", statements.len());
        for stmt in statements {
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(())
    }

    /// Insert a new record and return the stored row (with assigned id and
    /// timestamps).
    pub async fn insert(&self, record: NewFileRecord) -> FileResult<FileRecord> {
        let now = Utc::now();
        let inserted = sqlx::query_as::<_, FileRecord>(
            r#"
            INSERT INTO files (
                key, name, original_name, size, content_type, url,
                folder, category, uploaded_by, is_public, metadata,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, key, name, original_name, size, content_type, url, folder,
                      category, uploaded_by, is_public, metadata, created_at, updated_at
            "#,
        )
        .bind(&record.key)
        .bind(&record.name)
        .bind(&record.original_name)
        .bind(record.size)
        .bind(&record.content_type)
        .bind(&record.url)
        .bind(&record.folder)
        .bind(record.category)
        .bind(&record.uploaded_by)
        .bind(record.is_public)
        .bind(Json(record.metadata.clone()))
        .bind(now)
        .bind(now)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                FileError::Store(format!("object key `{}` already indexed", record.key))
            } else {
                err.into()
            }
        })?;

        Ok(inserted)
    }

    pub async fn get_by_id(&self, id: i64) -> FileResult<FileRecord> {
        sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {} FROM files WHERE id = ?",
            SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => FileError::NotFound(format!("file {}", id)),
            other => other.into(),
        })
    }

    pub async fn get_by_key(&self, key: &str) -> FileResult<FileRecord> {
        sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {} FROM files WHERE key = ?",
            SELECT_COLUMNS
        ))
        .bind(key)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => FileError::NotFound(format!("file with key `{}`", key)),
            other => other.into(),
        })
    }

    /// Filtered listing, newest-first by `created_at`.
    pub async fn query_by_filters(&self, filters: &FileFilters) -> FileResult<Vec<FileRecord>> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM files WHERE 1 = 1",
            SELECT_COLUMNS
        ));

        if let Some(folder) = &filters.folder {
            builder.push(" AND folder = ");
            builder.push_bind(folder);
        }
        if let Some(category) = filters.category {
            builder.push(" AND category = ");
            builder.push_bind(category);
        }
        if let Some(uploaded_by) = &filters.uploaded_by {
            builder.push(" AND uploaded_by = ");
            builder.push_bind(uploaded_by);
        }
        if let Some(is_public) = filters.is_public {
            builder.push(" AND is_public = ");
            builder.push_bind(is_public);
        }

        builder.push(" ORDER BY created_at DESC, id DESC");
        builder.push(" LIMIT ");
        builder.push_bind(filters.limit.unwrap_or(100).clamp(1, 1000));
        builder.push(" OFFSET ");
        builder.push_bind(filters.offset.unwrap_or(0).max(0));

        let rows = builder.build_query_as().fetch_all(&*self.db).await?;
        Ok(rows)
    }

    /// Case-insensitive substring match over `name` and `original_name`.
    pub async fn search_by_name(&self, term: &str, limit: i64) -> FileResult<Vec<FileRecord>> {
        let pattern = format!("%{}%", term.to_lowercase());
        let rows = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {} FROM files \
             WHERE lower(name) LIKE ? OR lower(original_name) LIKE ? \
             ORDER BY created_at DESC, id DESC LIMIT ?",
            SELECT_COLUMNS
        ))
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit.clamp(1, 1000))
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }

    /// Apply a partial update and bump `updated_at`.
    pub async fn update(&self, id: i64, update: &FileRecordUpdate) -> FileResult<FileRecord> {
        if update.is_empty() {
            return self.get_by_id(id).await;
        }

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE files SET updated_at = ");
        builder.push_bind(Utc::now());

        if let Some(name) = &update.name {
            builder.push(", name = ");
            builder.push_bind(name);
        }
        if let Some(folder) = &update.folder {
            builder.push(", folder = ");
            builder.push_bind(folder);
        }
        if let Some(is_public) = update.is_public {
            builder.push(", is_public = ");
            builder.push_bind(is_public);
        }

        builder.push(" WHERE id = ");
        builder.push_bind(id);
        builder.push(format!(" RETURNING {}", SELECT_COLUMNS));

        builder
            .build_query_as()
            .fetch_one(&*self.db)
            .await
            .map_err(|err| match err {
                sqlx::Error::RowNotFound => FileError::NotFound(format!("file {}", id)),
                other => other.into(),
            })
    }

    /// Remove a row. NotFound when no row matched.
    pub async fn delete(&self, id: i64) -> FileResult<()> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(FileError::NotFound(format!("file {}", id)));
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }
}

/// Return true if the SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}
