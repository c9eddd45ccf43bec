//! Search HTTP handlers.

use axum::extract::{Multipart, Query, State};
use axum::Json;
use serde::Deserialize;

use thinkbank_core::defaults::{SEARCH_ALPHA, SEARCH_TOP_K};
use thinkbank_core::MediaAsset;

use crate::{ApiError, AppState};

/// Largest `top_k` a caller may request.
const MAX_TOP_K: usize = 100;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Query text. May be empty, which searches by vector only.
    #[serde(default)]
    pub q: String,
    pub top_k: Option<usize>,
    /// Lexical weight in `[0, 1]`.
    pub alpha: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ImageSearchQuery {
    pub top_k: Option<usize>,
}

fn clamp_top_k(top_k: Option<usize>) -> usize {
    top_k.unwrap_or(SEARCH_TOP_K).min(MAX_TOP_K)
}

/// Hybrid text search.
///
/// # Query Parameters
/// - `q`: query text
/// - `top_k`: maximum results (default 10, capped at 100)
/// - `alpha`: lexical weight (default 0.5)
pub async fn search_text(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<Vec<MediaAsset>>, ApiError> {
    let alpha = params.alpha.unwrap_or(SEARCH_ALPHA);
    if !(0.0..=1.0).contains(&alpha) {
        return Err(ApiError::BadRequest(format!(
            "alpha must be between 0 and 1, got {}",
            alpha
        )));
    }
    let results = state
        .search
        .search(&params.q, clamp_top_k(params.top_k), alpha)
        .await?;
    Ok(Json(results))
}

/// Search by example image.
///
/// # Multipart Fields
/// - `file`: the query image
pub async fn search_image(
    State(state): State<AppState>,
    Query(params): Query<ImageSearchQuery>,
    mut multipart: Multipart,
) -> Result<Json<Vec<MediaAsset>>, ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("query").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Read error: {}", e)))?;
        upload = Some((file_name, bytes.to_vec()));
    }

    let (file_name, bytes) =
        upload.ok_or_else(|| ApiError::BadRequest("Missing file in multipart form".into()))?;
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("Image file is empty".into()));
    }

    let results = state
        .search
        .search_by_image(&bytes, &file_name, clamp_top_k(params.top_k))
        .await?;
    Ok(Json(results))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_top_k() {
        assert_eq!(clamp_top_k(None), 10);
        assert_eq!(clamp_top_k(Some(3)), 3);
        assert_eq!(clamp_top_k(Some(10_000)), 100);
    }
}
