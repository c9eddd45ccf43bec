//! Weighted score fusion of lexical and vector candidates.
//!
//! For an asset found by both rankers the fused score is
//! `alpha * lexical + (1 - alpha) * similarity`. An asset found by only one
//! ranker keeps that side's weighted score and nothing from the other side.
//! Scores are not normalized, so lexical ranks and similarities contribute
//! on their native scales.

use std::collections::HashMap;

use tracing::debug;

use thinkbank_core::{AssetId, LexicalHit, SearchResult, VectorHit};

#[derive(Default)]
struct Sides {
    lexical: Option<f64>,
    similarity: Option<f64>,
}

/// Convert nearest-neighbour hits into `(id, similarity)` pairs.
pub fn similarities(hits: &[VectorHit]) -> Vec<(AssetId, f64)> {
    hits.iter().map(|h| (h.asset_id, h.similarity())).collect()
}

/// Fuse lexical scores and vector similarities into one ranking.
///
/// Results are ordered by fused score descending, ties broken by ascending
/// asset id, and truncated to `top_k`. When an id appears twice on the same
/// side the first occurrence wins.
pub fn fuse_scores(
    lexical: &[LexicalHit],
    similarity: &[(AssetId, f64)],
    alpha: f64,
    top_k: usize,
) -> Vec<SearchResult> {
    if top_k == 0 {
        return Vec::new();
    }

    let mut sides: HashMap<AssetId, Sides> = HashMap::new();
    for hit in lexical {
        sides
            .entry(hit.asset_id)
            .or_default()
            .lexical
            .get_or_insert(hit.score);
    }
    for (id, sim) in similarity {
        sides.entry(*id).or_default().similarity.get_or_insert(*sim);
    }

    let mut results: Vec<SearchResult> = sides
        .into_iter()
        .map(|(asset_id, s)| {
            let fused_score = match (s.lexical, s.similarity) {
                (Some(lex), Some(sim)) => alpha * lex + (1.0 - alpha) * sim,
                (Some(lex), None) => alpha * lex,
                (None, Some(sim)) => (1.0 - alpha) * sim,
                (None, None) => 0.0,
            };
            SearchResult {
                asset_id,
                fused_score,
            }
        })
        .collect();

    results.sort_by(|a, b| {
        b.fused_score
            .total_cmp(&a.fused_score)
            .then(a.asset_id.cmp(&b.asset_id))
    });
    results.truncate(top_k);

    debug!(
        lexical_hits = lexical.len(),
        semantic_hits = similarity.len(),
        result_count = results.len(),
        "Score fusion complete"
    );

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(id: AssetId, score: f64) -> LexicalHit {
        LexicalHit {
            asset_id: id,
            score,
        }
    }

    fn ids(results: &[SearchResult]) -> Vec<AssetId> {
        results.iter().map(|r| r.asset_id).collect()
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_fusion_reference_case() {
        let lexical = vec![lex(1, 0.8), lex(2, 0.4)];
        let similarity = vec![(2, 0.9), (3, 0.6)];

        let results = fuse_scores(&lexical, &similarity, 0.5, 10);
        assert_eq!(ids(&results), vec![2, 1, 3]);
        assert_close(results[0].fused_score, 0.65);
        assert_close(results[1].fused_score, 0.4);
        assert_close(results[2].fused_score, 0.3);

        let top1 = fuse_scores(&lexical, &similarity, 0.5, 1);
        assert_eq!(ids(&top1), vec![2]);
    }

    #[test]
    fn test_ties_break_by_ascending_id() {
        let lexical = vec![lex(9, 0.5), lex(4, 0.5)];
        let results = fuse_scores(&lexical, &[], 0.5, 10);
        assert_eq!(ids(&results), vec![4, 9]);
    }

    #[test]
    fn test_alpha_extremes() {
        let lexical = vec![lex(1, 1.0)];
        let similarity = vec![(2, 1.0)];

        let lexical_only = fuse_scores(&lexical, &similarity, 1.0, 10);
        assert_eq!(ids(&lexical_only), vec![1, 2]);
        assert_close(lexical_only[1].fused_score, 0.0);

        let vector_only = fuse_scores(&lexical, &similarity, 0.0, 10);
        assert_eq!(ids(&vector_only), vec![2, 1]);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(fuse_scores(&[], &[], 0.5, 10).is_empty());
        assert!(fuse_scores(&[lex(1, 1.0)], &[], 0.5, 0).is_empty());
    }

    #[test]
    fn test_duplicate_ids_first_wins() {
        let lexical = vec![lex(1, 0.8), lex(1, 0.1)];
        let results = fuse_scores(&lexical, &[], 0.5, 10);
        assert_eq!(results.len(), 1);
        assert_close(results[0].fused_score, 0.4);
    }

    #[test]
    fn test_similarities_from_distance() {
        let hits = vec![
            VectorHit {
                asset_id: 5,
                distance: 0.0,
            },
            VectorHit {
                asset_id: 6,
                distance: 1.0,
            },
        ];
        assert_eq!(similarities(&hits), vec![(5, 1.0), (6, 0.5)]);
    }
}
