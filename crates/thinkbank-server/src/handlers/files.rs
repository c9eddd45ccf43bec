//! Asset listing HTTP handlers.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use thinkbank_core::defaults::PAGE_LIMIT;
use thinkbank_core::{AssetId, MediaAsset};

use crate::{ApiError, AppState};

const MAX_PAGE_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// List assets, newest first.
pub async fn list_files(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<Vec<MediaAsset>>, ApiError> {
    let limit = params.limit.unwrap_or(PAGE_LIMIT).clamp(0, MAX_PAGE_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);
    Ok(Json(state.assets.list(limit, offset).await?))
}

/// Fetch one asset.
pub async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<AssetId>,
) -> Result<Json<MediaAsset>, ApiError> {
    Ok(Json(state.assets.fetch(id).await?))
}
