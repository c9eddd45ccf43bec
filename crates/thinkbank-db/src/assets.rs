//! Asset record repository over the `files` table.

use async_trait::async_trait;
use chrono::Utc;
use pgvector::Vector;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, instrument};

use thinkbank_core::{
    validate_embedding, AssetId, AssetRepository, AssetType, CaptureMetadata, Error, MediaAsset,
    NewAsset, Result,
};

const ASSET_COLUMNS: &str = "id, file_name, original_file_path, file_path, metadata, type, \
                             caption, tags, vector, created_at, updated_at";

/// PostgreSQL implementation of [`AssetRepository`].
#[derive(Clone)]
pub struct PgAssetRepository {
    pool: Pool<Postgres>,
}

impl PgAssetRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn check_affected(id: AssetId, rows: u64) -> Result<()> {
        if rows == 0 {
            return Err(Error::AssetNotFound(id));
        }
        Ok(())
    }
}

/// Map a `files` row onto [`MediaAsset`].
///
/// Empty path strings are read as unset, matching rows written before the
/// columns became nullable.
pub(crate) fn asset_from_row(row: &PgRow) -> Result<MediaAsset> {
    let type_str: Option<String> = row.try_get("type").map_err(Error::Database)?;
    let asset_type = type_str
        .as_deref()
        .unwrap_or("")
        .parse::<AssetType>()
        .unwrap_or(AssetType::Unknown);

    let tags: Option<serde_json::Value> = row.try_get("tags").map_err(Error::Database)?;
    let tags = match tags {
        Some(value) if !value.is_null() => serde_json::from_value(value)?,
        _ => Vec::new(),
    };

    let vector: Option<Vector> = row.try_get("vector").map_err(Error::Database)?;
    let metadata: Option<serde_json::Value> = row.try_get("metadata").map_err(Error::Database)?;

    Ok(MediaAsset {
        id: row.try_get("id").map_err(Error::Database)?,
        file_name: row.try_get("file_name").map_err(Error::Database)?,
        asset_type,
        original_file_path: non_empty(row.try_get("original_file_path").map_err(Error::Database)?),
        file_path: non_empty(row.try_get("file_path").map_err(Error::Database)?),
        caption: non_empty(row.try_get("caption").map_err(Error::Database)?),
        embedding: vector.map(|v| v.to_vec()),
        tags,
        metadata: metadata.unwrap_or_else(|| serde_json::json!({})),
        created_at: row.try_get("created_at").map_err(Error::Database)?,
        updated_at: row.try_get("updated_at").map_err(Error::Database)?,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

#[async_trait]
impl AssetRepository for PgAssetRepository {
    #[instrument(skip(self, req), fields(subsystem = "db", component = "assets", op = "insert"))]
    async fn insert(&self, req: NewAsset) -> Result<AssetId> {
        let now = Utc::now();
        let tags = serde_json::to_value(&req.tags)?;

        let row = sqlx::query(
            "INSERT INTO files (file_name, type, tags, metadata, created_at, updated_at)
             VALUES ($1, $2, $3, '{}'::jsonb, $4, $4)
             RETURNING id",
        )
        .bind(&req.file_name)
        .bind(req.asset_type.as_str())
        .bind(tags)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        let id: AssetId = row.try_get("id").map_err(Error::Database)?;
        debug!(asset_id = id, file_name = %req.file_name, asset_type = %req.asset_type, "Asset record created");
        Ok(id)
    }

    async fn fetch(&self, id: AssetId) -> Result<MediaAsset> {
        let sql = format!("SELECT {} FROM files WHERE id = $1", ASSET_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::AssetNotFound(id))?;
        asset_from_row(&row)
    }

    async fn fetch_many(&self, ids: &[AssetId]) -> Result<Vec<MediaAsset>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("SELECT {} FROM files WHERE id = ANY($1)", ASSET_COLUMNS);
        let rows = sqlx::query(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        rows.iter().map(asset_from_row).collect()
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<MediaAsset>> {
        let sql = format!(
            "SELECT {} FROM files ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2",
            ASSET_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(limit.max(0))
            .bind(offset.max(0))
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        rows.iter().map(asset_from_row).collect()
    }

    async fn set_original_path(&self, id: AssetId, path: &str) -> Result<()> {
        let result =
            sqlx::query("UPDATE files SET original_file_path = $1, updated_at = $2 WHERE id = $3")
                .bind(path)
                .bind(Utc::now())
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(Error::Database)?;
        Self::check_affected(id, result.rows_affected())
    }

    async fn set_normalized(
        &self,
        id: AssetId,
        path: &str,
        capture: Option<&CaptureMetadata>,
    ) -> Result<()> {
        let patch = match capture {
            Some(meta) if !meta.is_empty() => serde_json::to_value(meta)?,
            _ => serde_json::json!({}),
        };

        let result = sqlx::query(
            "UPDATE files
             SET file_path = $1,
                 metadata = COALESCE(metadata, '{}'::jsonb) || $2::jsonb,
                 updated_at = $3
             WHERE id = $4",
        )
        .bind(path)
        .bind(patch)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Self::check_affected(id, result.rows_affected())
    }

    async fn set_analysis(&self, id: AssetId, caption: &str, embedding: &[f32]) -> Result<()> {
        validate_embedding(embedding)?;
        let vector = Vector::from(embedding.to_vec());

        let result = sqlx::query(
            "UPDATE files SET caption = $1, vector = $2, updated_at = $3 WHERE id = $4",
        )
        .bind(caption)
        .bind(vector)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Self::check_affected(id, result.rows_affected())
    }

    async fn delete(&self, id: AssetId) -> Result<()> {
        sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty_filters_blank() {
        assert_eq!(non_empty(Some(String::new())), None);
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some("a".into())), Some("a".to_string()));
    }

    #[test]
    fn test_asset_columns_cover_model() {
        for col in ["file_path", "original_file_path", "vector", "caption", "tags"] {
            assert!(ASSET_COLUMNS.contains(col));
        }
    }
}
