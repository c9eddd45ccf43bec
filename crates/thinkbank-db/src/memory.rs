//! In-memory asset store for tests in dependent crates.
//!
//! Implements both [`AssetRepository`] and [`AssetSearchIndex`] so pipeline
//! and search code can run without PostgreSQL. Lexical scores are the
//! fraction of query terms found in the caption or file name; vector scores
//! are L2 distances, matching the ordering of the SQL implementation.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use thinkbank_core::{
    validate_embedding, AssetId, AssetRepository, AssetSearchIndex, CaptureMetadata, Error,
    LexicalHit, MediaAsset, NewAsset, Result, VectorHit,
};

#[derive(Default)]
struct State {
    next_id: AssetId,
    assets: BTreeMap<AssetId, MediaAsset>,
}

/// Shared, cloneable in-memory store.
#[derive(Clone, Default)]
pub struct MemoryAssetStore {
    state: Arc<Mutex<State>>,
    fail_normalized_updates: bool,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `set_normalized` call fail.
    pub fn failing_normalized_updates(mut self) -> Self {
        self.fail_normalized_updates = true;
        self
    }

    pub fn len(&self) -> usize {
        self.lock().assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of one asset, if present.
    pub fn get(&self, id: AssetId) -> Option<MediaAsset> {
        self.lock().assets.get(&id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn update<F>(&self, id: AssetId, f: F) -> Result<()>
    where
        F: FnOnce(&mut MediaAsset) -> Result<()>,
    {
        let mut state = self.lock();
        let asset = state.assets.get_mut(&id).ok_or(Error::AssetNotFound(id))?;
        f(asset)?;
        asset.updated_at = Utc::now();
        Ok(())
    }
}

fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn l2_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = (*x - *y) as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

#[async_trait]
impl AssetRepository for MemoryAssetStore {
    async fn insert(&self, req: NewAsset) -> Result<AssetId> {
        let mut state = self.lock();
        state.next_id += 1;
        let id = state.next_id;
        let now = Utc::now();
        state.assets.insert(
            id,
            MediaAsset {
                id,
                file_name: req.file_name,
                asset_type: req.asset_type,
                original_file_path: None,
                file_path: None,
                caption: None,
                embedding: None,
                tags: req.tags,
                metadata: serde_json::json!({}),
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn fetch(&self, id: AssetId) -> Result<MediaAsset> {
        self.get(id).ok_or(Error::AssetNotFound(id))
    }

    async fn fetch_many(&self, ids: &[AssetId]) -> Result<Vec<MediaAsset>> {
        let state = self.lock();
        Ok(ids
            .iter()
            .filter_map(|id| state.assets.get(id).cloned())
            .collect())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<MediaAsset>> {
        let state = self.lock();
        let mut all: Vec<MediaAsset> = state.assets.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn set_original_path(&self, id: AssetId, path: &str) -> Result<()> {
        self.update(id, |asset| {
            asset.original_file_path = Some(path.to_string());
            Ok(())
        })
    }

    async fn set_normalized(
        &self,
        id: AssetId,
        path: &str,
        capture: Option<&CaptureMetadata>,
    ) -> Result<()> {
        if self.fail_normalized_updates {
            return Err(Error::Internal("memory store: normalized update disabled".into()));
        }
        let patch = match capture {
            Some(meta) if !meta.is_empty() => Some(serde_json::to_value(meta)?),
            _ => None,
        };
        self.update(id, |asset| {
            asset.file_path = Some(path.to_string());
            if let (Some(serde_json::Value::Object(patch)), Some(target)) =
                (patch, asset.metadata.as_object_mut())
            {
                target.extend(patch);
            }
            Ok(())
        })
    }

    async fn set_analysis(&self, id: AssetId, caption: &str, embedding: &[f32]) -> Result<()> {
        validate_embedding(embedding)?;
        self.update(id, |asset| {
            asset.caption = Some(caption.to_string());
            asset.embedding = Some(embedding.to_vec());
            Ok(())
        })
    }

    async fn delete(&self, id: AssetId) -> Result<()> {
        self.lock().assets.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl AssetSearchIndex for MemoryAssetStore {
    async fn lexical_top_k(&self, query: &str, k: i64) -> Result<Vec<LexicalHit>> {
        let query_terms = terms(query);
        if query_terms.is_empty() || k <= 0 {
            return Ok(Vec::new());
        }

        let state = self.lock();
        let mut hits: Vec<LexicalHit> = state
            .assets
            .values()
            .filter_map(|asset| {
                let mut doc = terms(&asset.file_name);
                if let Some(caption) = &asset.caption {
                    doc.extend(terms(caption));
                }
                let matched = query_terms.iter().filter(|t| doc.contains(t)).count();
                (matched > 0).then(|| LexicalHit {
                    asset_id: asset.id,
                    score: matched as f64 / query_terms.len() as f64,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.asset_id.cmp(&b.asset_id))
        });
        hits.truncate(k as usize);
        Ok(hits)
    }

    async fn vector_top_k(&self, embedding: &[f32], k: i64) -> Result<Vec<VectorHit>> {
        validate_embedding(embedding)?;
        if k <= 0 {
            return Ok(Vec::new());
        }

        let state = self.lock();
        let mut hits: Vec<VectorHit> = state
            .assets
            .values()
            .filter_map(|asset| {
                asset.embedding.as_ref().map(|v| VectorHit {
                    asset_id: asset.id,
                    distance: l2_distance(v, embedding),
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.asset_id.cmp(&b.asset_id))
        });
        hits.truncate(k as usize);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thinkbank_core::defaults::EMBED_DIMENSION;

    fn unit(i: usize) -> Vec<f32> {
        let mut v = vec![0.0; EMBED_DIMENSION];
        v[i] = 1.0;
        v
    }

    #[tokio::test]
    async fn test_insert_and_update() {
        let store = MemoryAssetStore::new();
        let id = store.insert(NewAsset::from_file_name("a.heic")).await.unwrap();
        store.set_original_path(id, "/o/1.heic").await.unwrap();
        let capture = CaptureMetadata {
            latitude: Some(1.5),
            longitude: Some(-2.5),
            captured_at: None,
        };
        store.set_normalized(id, "/n/1.jpg", Some(&capture)).await.unwrap();

        let asset = store.fetch(id).await.unwrap();
        assert_eq!(asset.file_path.as_deref(), Some("/n/1.jpg"));
        assert_eq!(asset.metadata["latitude"], 1.5);
        assert!(store.set_original_path(99, "x").await.is_err());
    }

    #[tokio::test]
    async fn test_lexical_and_vector_ordering() {
        let store = MemoryAssetStore::new();
        let a = store.insert(NewAsset::from_file_name("a.jpg")).await.unwrap();
        let b = store.insert(NewAsset::from_file_name("b.jpg")).await.unwrap();
        store.set_analysis(a, "a dog on a beach", &unit(0)).await.unwrap();
        store.set_analysis(b, "a dog", &unit(1)).await.unwrap();

        let lexical = store.lexical_top_k("dog beach", 10).await.unwrap();
        assert_eq!(lexical.iter().map(|h| h.asset_id).collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(lexical[0].score, 1.0);
        assert_eq!(lexical[1].score, 0.5);

        let vector = store.vector_top_k(&unit(1), 1).await.unwrap();
        assert_eq!(vector.len(), 1);
        assert_eq!(vector[0].asset_id, b);
        assert_eq!(vector[0].distance, 0.0);

        assert!(store.lexical_top_k("   ", 10).await.unwrap().is_empty());
    }
}
