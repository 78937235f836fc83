//! Cosine-similarity ranking in embedding space.

use uema_core::{Document, ScoredDocument};

/// Cosine similarity of two vectors.
///
/// Returns `0.0` when the lengths differ, either vector is empty, or either
/// norm is zero.
///
/// # Examples
///
/// ```
/// use uema_rag::similarity::cosine_similarity;
///
/// assert!((cosine_similarity(&[1.0, 2.0], &[1.0, 2.0]) - 1.0).abs() < 1e-9);
/// assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }

    dot / denom
}

/// Score every candidate against `query` and keep the best `limit`.
///
/// A candidate without an embedding scores 0 and is kept, so it ranks last
/// rather than disappearing. Scores are clamped to `[0.0, 1.0]`; ties keep
/// input order.
///
/// # Examples
///
/// ```
/// use uema_core::{Document, Sector};
/// use uema_rag::similarity::rank_by_similarity;
///
/// let near = Document::new("near", "A", Sector::Prog);
/// let missing = Document::new("missing", "B", Sector::Prog);
/// let ranked = rank_by_similarity(
///     &[1.0, 0.0],
///     vec![(missing, None), (near, Some(vec![0.9, 0.1]))],
///     5,
/// );
/// assert_eq!(ranked[0].document.id, "near");
/// assert_eq!(ranked[1].score, 0.0);
/// ```
pub fn rank_by_similarity(
    query: &[f32],
    candidates: Vec<(Document, Option<Vec<f32>>)>,
    limit: usize,
) -> Vec<ScoredDocument> {
    let mut scored: Vec<ScoredDocument> = candidates
        .into_iter()
        .map(|(document, embedding)| {
            let score = embedding
                .map(|e| cosine_similarity(query, &e))
                .unwrap_or(0.0);
            ScoredDocument {
                document,
                score: score.clamp(0.0, 1.0),
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(limit);
    scored
}
