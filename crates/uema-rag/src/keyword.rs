//! Offline keyword ranking, the last fallback tier.
//!
//! Deterministic and free of network calls, so it is what runs in demo and
//! test environments without an API key.

use uema_core::{Document, ScoredDocument};

use crate::text::searchable_text;

/// Lowercased query words longer than two characters.
///
/// # Examples
///
/// ```
/// use uema_rag::keyword::query_terms;
///
/// assert_eq!(query_terms("Prazo do Edital 01/2025"), vec!["prazo", "edital", "01/2025"]);
/// ```
pub fn query_terms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() > 2)
        .collect()
}

/// Rank documents by the share of query words they contain.
///
/// Score is `matched words / query words`. Documents matching nothing are
/// dropped, as is everything when the query has no usable words. Ties keep
/// input order. At most `limit` documents are returned.
///
/// # Examples
///
/// ```
/// use uema_core::{Document, Sector};
/// use uema_rag::keyword::rank_by_keywords;
///
/// let docs = vec![
///     Document::new("1", "Edital de monitoria", Sector::Prog),
///     Document::new("2", "Ata do conselho", Sector::Reitoria),
/// ];
/// let ranked = rank_by_keywords("edital monitoria", &docs, 5);
/// assert_eq!(ranked.len(), 1);
/// assert_eq!(ranked[0].score, 1.0);
/// ```
pub fn rank_by_keywords(query: &str, documents: &[Document], limit: usize) -> Vec<ScoredDocument> {
    let terms = query_terms(query);
    if terms.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<ScoredDocument> = documents
        .iter()
        .filter_map(|doc| {
            let text = searchable_text(doc);
            let matched = terms.iter().filter(|t| text.contains(t.as_str())).count();
            (matched > 0).then(|| ScoredDocument {
                document: doc.clone(),
                score: matched as f64 / terms.len() as f64,
            })
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

#[cfg(test)]
mod tests {
    use super::*;
    use uema_core::Sector;

    fn corpus() -> Vec<Document> {
        vec![
            Document::new("a", "Edital 01/2025 - Monitoria", Sector::Prog)
                .with_content("O Edital 01/2025 fixa prazo de 30 dias para inscrições."),
            Document::new("b", "Relatório de gestão", Sector::Proplad)
                .with_summary("Balanço anual do orçamento"),
            Document::new("c", "Chamada pública", Sector::Ppg)
                .with_content("Conforme edital publicado no diário oficial."),
        ]
    }

    #[test]
    fn short_words_are_ignored() {
        assert_eq!(query_terms("o de da ata"), vec!["ata"]);
        assert!(query_terms("a é  ").is_empty());
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        // "pós" is three characters but four bytes
        assert_eq!(query_terms("pós"), vec!["pós"]);
        assert!(query_terms("é").is_empty());
    }

    #[test]
    fn edital_matches_two_of_three() {
        let ranked = rank_by_keywords("Edital", &corpus(), 5);
        let ids: Vec<&str> = ranked.iter().map(|s| s.document.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert!(ranked.iter().all(|s| s.score == 1.0));
    }

    #[test]
    fn partial_matches_rank_below_full_matches() {
        let ranked = rank_by_keywords("prazo edital 01/2025", &corpus(), 5);
        assert_eq!(ranked[0].document.id, "a");
        assert_eq!(ranked[0].score, 1.0);
        assert_eq!(ranked[1].document.id, "c");
        assert!((ranked[1].score - 1.0 / 3.0).abs() < 1e-9);
        assert!(ranked.iter().all(|s| s.document.id != "b"));
    }

    #[test]
    fn sector_name_and_tags_are_searchable() {
        let docs = vec![Document::new("t", "Portaria", Sector::Cca).with_tags(["bolsas"])];
        assert_eq!(rank_by_keywords("agrárias", &docs, 5).len(), 1);
        assert_eq!(rank_by_keywords("BOLSAS", &docs, 5).len(), 1);
    }

    #[test]
    fn limit_truncates() {
        let ranked = rank_by_keywords("edital", &corpus(), 1);
        assert_eq!(ranked.len(), 1);
    }

    #[test]
    fn empty_query_returns_nothing() {
        assert!(rank_by_keywords("", &corpus(), 5).is_empty());
    }
}
