use std::fmt::Write;

use uema_core::{truncate_chars, ScoredDocument, Sector};

/// Exact sentence the model must give when no document covers the question.
pub const NOT_FOUND: &str = "Não encontrei documentos específicos sobre este assunto no sistema.";

/// Fixed reply returned whenever the chat call cannot produce an answer.
pub const APOLOGY: &str =
    "Desculpe, ocorreu um erro ao processar sua pergunta. Por favor, tente novamente.";

const RULES: &str = "\
Você é o assistente virtual da UEMA Digital, o portal de documentos institucionais \
da Universidade Estadual do Maranhão. Responda sempre em português.

Regras:
- Responda SOMENTE com base nos documentos listados em CONTEXTO.
- Cite apenas documentos presentes no CONTEXTO, pelo título exato.
- Nunca invente títulos, números de edital, datas, prazos ou valores.
- Se nenhum documento do CONTEXTO for relevante, responda exatamente: \"";

/// Glossary line for every sector, e.g. `- PROG: Pró-Reitoria de Graduação`.
///
/// # Examples
///
/// ```
/// use uema_chat::prompt::sector_glossary;
///
/// let glossary = sector_glossary();
/// assert!(glossary.contains("- PROG: Pró-Reitoria de Graduação"));
/// assert_eq!(glossary.lines().count(), 13);
/// ```
pub fn sector_glossary() -> String {
    let mut glossary = String::new();
    for sector in Sector::ALL {
        let _ = writeln!(glossary, "- {}: {}", sector.code(), sector.full_name());
    }
    glossary
}

/// Build the preamble that confines the model to `documents`.
///
/// Each document contributes its title, sector, summary, tags and a content
/// excerpt of at most `excerpt_chars` characters. An empty list puts the
/// [`NOT_FOUND`] sentence in the context section itself.
///
/// # Examples
///
/// ```
/// use uema_chat::prompt::{build_preamble, NOT_FOUND};
/// use uema_core::{Document, ScoredDocument, Sector};
///
/// let empty = build_preamble(&[], 500);
/// assert!(empty.contains(NOT_FOUND));
///
/// let doc = ScoredDocument {
///     document: Document::new("1", "Edital 01/2025", Sector::Prog),
///     score: 0.9,
/// };
/// let preamble = build_preamble(&[doc], 500);
/// assert!(preamble.contains("[1] Edital 01/2025"));
/// ```
pub fn build_preamble(documents: &[ScoredDocument], excerpt_chars: usize) -> String {
    let mut preamble = String::from(RULES);
    preamble.push_str(NOT_FOUND);
    preamble.push_str("\"\n\nSiglas dos setores:\n");
    preamble.push_str(&sector_glossary());
    preamble.push_str("\nCONTEXTO:\n");

    if documents.is_empty() {
        let _ = writeln!(preamble, "Nenhum documento relevante foi encontrado. {NOT_FOUND}");
        return preamble;
    }

    for (i, scored) in documents.iter().enumerate() {
        let doc = &scored.document;
        let _ = writeln!(preamble, "\n[{}] {}", i + 1, doc.title);
        let _ = writeln!(
            preamble,
            "Setor: {} ({})",
            doc.sector.code(),
            doc.sector.full_name()
        );
        if let Some(summary) = doc.summary.as_deref().filter(|s| !s.is_empty()) {
            let _ = writeln!(preamble, "Resumo: {summary}");
        }
        if !doc.tags.is_empty() {
            let _ = writeln!(preamble, "Tags: {}", doc.tags_joined());
        }
        if let Some(content) = doc.content.as_deref().filter(|c| !c.is_empty()) {
            let excerpt = truncate_chars(content, excerpt_chars);
            let ellipsis = if excerpt.len() < content.len() { "..." } else { "" };
            let _ = writeln!(preamble, "Trecho: {excerpt}{ellipsis}");
        }
    }

    preamble
}
