//! Text views of a document used by the rankers.

use std::fmt::Write;

use uema_core::{truncate_chars, Document};

/// Lowercased concatenation of every searchable field, for keyword matching.
///
/// Fields: title, tags, summary, sector code and name, extracted content.
///
/// # Examples
///
/// ```
/// use uema_core::{Document, Sector};
/// use uema_rag::text::searchable_text;
///
/// let doc = Document::new("1", "Edital", Sector::Prog).with_tags(["Monitoria"]);
/// let text = searchable_text(&doc);
/// assert!(text.contains("edital"));
/// assert!(text.contains("monitoria"));
/// assert!(text.contains("pró-reitoria de graduação"));
/// ```
pub fn searchable_text(doc: &Document) -> String {
    let tags = doc.tags_joined();
    let parts = [
        doc.title.as_str(),
        tags.as_str(),
        doc.summary.as_deref().unwrap_or(""),
        doc.sector.code(),
        doc.sector.full_name(),
        doc.content.as_deref().unwrap_or(""),
    ];
    parts.join(" ").to_lowercase()
}

/// Multi-line description of a document sent to embedding and rerank models.
///
/// Extracted content is cut to `content_chars` characters.
///
/// # Examples
///
/// ```
/// use uema_core::{Document, Sector};
/// use uema_rag::text::document_blurb;
///
/// let doc = Document::new("1", "Edital 01/2025", Sector::Prog)
///     .with_content("prazo de 30 dias para inscrição");
/// let blurb = document_blurb(&doc, 8);
/// assert!(blurb.starts_with("Título: Edital 01/2025"));
/// assert!(blurb.contains("Conteúdo: prazo de"));
/// assert!(!blurb.contains("30 dias"));
/// ```
pub fn document_blurb(doc: &Document, content_chars: usize) -> String {
    let mut blurb = format!("Título: {}", doc.title);
    if let Some(summary) = doc.summary.as_deref().filter(|s| !s.is_empty()) {
        let _ = write!(blurb, "\nResumo: {summary}");
    }
    if !doc.tags.is_empty() {
        let _ = write!(blurb, "\nTags: {}", doc.tags_joined());
    }
    let _ = write!(
        blurb,
        "\nSetor: {} ({})",
        doc.sector.code(),
        doc.sector.full_name()
    );
    if let Some(content) = doc.content.as_deref().filter(|c| !c.is_empty()) {
        let _ = write!(blurb, "\nConteúdo: {}", truncate_chars(content, content_chars));
    }
    blurb
}
