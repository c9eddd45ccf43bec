//! Lexical and vector ranking primitives over the `files` table.
//!
//! - Lexical: `ts_rank` against `websearch_to_tsquery`, so OR/NOT/phrase
//!   operators in user queries work.
//! - Vector: pgvector L2 distance (`<->`), nearest first.
//!
//! Both return ids with raw scores only; fusion and hydration happen in
//! `thinkbank-search`.

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, instrument};

use thinkbank_core::defaults::FTS_CONFIG;
use thinkbank_core::{validate_embedding, AssetSearchIndex, Error, LexicalHit, Result, VectorHit};

/// Search index backed by PostgreSQL tsvector and pgvector.
#[derive(Clone)]
pub struct PgAssetSearch {
    pool: Pool<Postgres>,
}

impl PgAssetSearch {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AssetSearchIndex for PgAssetSearch {
    #[instrument(skip(self), fields(subsystem = "db", component = "search", op = "lexical"))]
    async fn lexical_top_k(&self, query: &str, k: i64) -> Result<Vec<LexicalHit>> {
        if query.trim().is_empty() || k <= 0 {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            SELECT id,
                   ts_rank(tsv, websearch_to_tsquery('{cfg}', $1))::float8 AS score
            FROM files
            WHERE tsv @@ websearch_to_tsquery('{cfg}', $1)
            ORDER BY score DESC, id ASC
            LIMIT $2
            "#,
            cfg = FTS_CONFIG
        );

        let rows = sqlx::query(&sql)
            .bind(query)
            .bind(k)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let hits = rows
            .iter()
            .map(|row| {
                Ok(LexicalHit {
                    asset_id: row.try_get("id")?,
                    score: row.try_get::<f64, _>("score")?.max(0.0),
                })
            })
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()
            .map_err(Error::Database)?;

        debug!(result_count = hits.len(), "Lexical ranking complete");
        Ok(hits)
    }

    #[instrument(skip(self, embedding), fields(subsystem = "db", component = "search", op = "vector"))]
    async fn vector_top_k(&self, embedding: &[f32], k: i64) -> Result<Vec<VectorHit>> {
        validate_embedding(embedding)?;
        if k <= 0 {
            return Ok(Vec::new());
        }
        let vector = Vector::from(embedding.to_vec());

        let rows = sqlx::query(
            r#"
            SELECT id, (vector <-> $1::vector)::float8 AS distance
            FROM files
            WHERE vector IS NOT NULL
            ORDER BY distance ASC, id ASC
            LIMIT $2
            "#,
        )
        .bind(vector)
        .bind(k)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let hits = rows
            .iter()
            .map(|row| {
                Ok(VectorHit {
                    asset_id: row.try_get("id")?,
                    distance: row.try_get("distance")?,
                })
            })
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()
            .map_err(Error::Database)?;

        debug!(result_count = hits.len(), "Vector ranking complete");
        Ok(hits)
    }
}
