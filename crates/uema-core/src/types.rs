use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Organizational unit a document or process belongs to.
///
/// Serialized as the upper-case abbreviation used across the university.
///
/// # Examples
///
/// ```
/// use uema_core::Sector;
///
/// let sector: Sector = "prog".parse().unwrap();
/// assert_eq!(sector, Sector::Prog);
/// assert_eq!(sector.code(), "PROG");
/// assert_eq!(sector.full_name(), "Pró-Reitoria de Graduação");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sector {
    Reitoria,
    Prog,
    Ppg,
    Proexae,
    Proplad,
    Progep,
    Proinfra,
    Cecen,
    Cct,
    Ccsa,
    Cca,
    Ccs,
    Nti,
}

impl Sector {
    /// Every sector, in glossary order.
    pub const ALL: [Sector; 13] = [
        Sector::Reitoria,
        Sector::Prog,
        Sector::Ppg,
        Sector::Proexae,
        Sector::Proplad,
        Sector::Progep,
        Sector::Proinfra,
        Sector::Cecen,
        Sector::Cct,
        Sector::Ccsa,
        Sector::Cca,
        Sector::Ccs,
        Sector::Nti,
    ];

    /// Abbreviation shown in listings and prompts.
    pub fn code(&self) -> &'static str {
        match self {
            Sector::Reitoria => "REITORIA",
            Sector::Prog => "PROG",
            Sector::Ppg => "PPG",
            Sector::Proexae => "PROEXAE",
            Sector::Proplad => "PROPLAD",
            Sector::Progep => "PROGEP",
            Sector::Proinfra => "PROINFRA",
            Sector::Cecen => "CECEN",
            Sector::Cct => "CCT",
            Sector::Ccsa => "CCSA",
            Sector::Cca => "CCA",
            Sector::Ccs => "CCS",
            Sector::Nti => "NTI",
        }
    }

    /// Full Portuguese name of the unit.
    pub fn full_name(&self) -> &'static str {
        match self {
            Sector::Reitoria => "Reitoria",
            Sector::Prog => "Pró-Reitoria de Graduação",
            Sector::Ppg => "Pró-Reitoria de Pesquisa e Pós-Graduação",
            Sector::Proexae => "Pró-Reitoria de Extensão e Assuntos Estudantis",
            Sector::Proplad => "Pró-Reitoria de Planejamento e Administração",
            Sector::Progep => "Pró-Reitoria de Gestão de Pessoas",
            Sector::Proinfra => "Pró-Reitoria de Infraestrutura",
            Sector::Cecen => "Centro de Educação, Ciências Exatas e Naturais",
            Sector::Cct => "Centro de Ciências Tecnológicas",
            Sector::Ccsa => "Centro de Ciências Sociais Aplicadas",
            Sector::Cca => "Centro de Ciências Agrárias",
            Sector::Ccs => "Centro de Ciências da Saúde",
            Sector::Nti => "Núcleo de Tecnologia da Informação",
        }
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Sector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        Sector::ALL
            .iter()
            .copied()
            .find(|sector| sector.code() == upper)
            .ok_or_else(|| format!("unknown sector: {s}"))
    }
}

/// Kind of file backing a document.
///
/// # Examples
///
/// ```
/// use uema_core::DocumentType;
///
/// assert_eq!(format!("{}", DocumentType::Pdf), "pdf");
/// assert_eq!("DOCX".parse::<DocumentType>().unwrap(), DocumentType::Docx);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Pdf,
    Doc,
    Docx,
    Xls,
    Xlsx,
    Ppt,
    Pptx,
    Image,
    Other,
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocumentType::Pdf => "pdf",
            DocumentType::Doc => "doc",
            DocumentType::Docx => "docx",
            DocumentType::Xls => "xls",
            DocumentType::Xlsx => "xlsx",
            DocumentType::Ppt => "ppt",
            DocumentType::Pptx => "pptx",
            DocumentType::Image => "image",
            DocumentType::Other => "other",
        };
        f.write_str(s)
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pdf" => Ok(DocumentType::Pdf),
            "doc" => Ok(DocumentType::Doc),
            "docx" => Ok(DocumentType::Docx),
            "xls" => Ok(DocumentType::Xls),
            "xlsx" => Ok(DocumentType::Xlsx),
            "ppt" => Ok(DocumentType::Ppt),
            "pptx" => Ok(DocumentType::Pptx),
            "image" | "png" | "jpg" | "jpeg" => Ok(DocumentType::Image),
            "other" => Ok(DocumentType::Other),
            other => Err(format!("unknown document type: {other}")),
        }
    }
}

/// Publication state of a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Draft,
    #[default]
    Published,
    Archived,
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentStatus::Draft => write!(f, "draft"),
            DocumentStatus::Published => write!(f, "published"),
            DocumentStatus::Archived => write!(f, "archived"),
        }
    }
}

impl FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(DocumentStatus::Draft),
            "published" => Ok(DocumentStatus::Published),
            "archived" => Ok(DocumentStatus::Archived),
            other => Err(format!("unknown document status: {other}")),
        }
    }
}

/// An institutional document as held by the document store.
///
/// A missing `status` deserializes as [`DocumentStatus::Published`], the same
/// state [`Document::new`] starts from.
///
/// # Examples
///
/// ```
/// use uema_core::{Document, Sector};
///
/// let doc = Document::new("doc-1", "Edital 01/2025", Sector::Prog)
///     .with_summary("Seleção de monitores")
///     .with_tags(["edital", "monitoria"]);
/// assert_eq!(doc.tags.len(), 2);
/// assert!(doc.content.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Store-assigned identifier.
    pub id: String,
    pub title: String,
    #[serde(rename = "type", default = "default_document_type")]
    pub doc_type: DocumentType,
    pub sector: Sector,
    #[serde(default)]
    pub status: DocumentStatus,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub summary: Option<String>,
    /// Text extracted from the underlying file, if any.
    #[serde(default)]
    pub content: Option<String>,
    /// File size in bytes.
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub author: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_document_type() -> DocumentType {
    DocumentType::Pdf
}

impl Document {
    /// Create a published PDF document with the given identity.
    pub fn new(id: impl Into<String>, title: impl Into<String>, sector: Sector) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            doc_type: DocumentType::Pdf,
            sector,
            status: DocumentStatus::Published,
            tags: BTreeSet::new(),
            summary: None,
            content: None,
            size: 0,
            author: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_status(mut self, status: DocumentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Tags joined with `", "` in their stored order.
    pub fn tags_joined(&self) -> String {
        self.tags.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
    }
}

/// A document paired with its relevance to one query.
///
/// Produced transiently by the rankers and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredDocument {
    pub document: Document,
    /// Relevance score. Semantic and keyword scores lie in `[0.0, 1.0]`;
    /// rerank scores are passed through as returned by the endpoint.
    pub score: f64,
}

/// Author of a chat turn.
///
/// # Examples
///
/// ```
/// use uema_core::ChatRole;
///
/// assert_eq!(serde_json::to_string(&ChatRole::Assistant).unwrap(), "\"assistant\"");
/// assert_eq!("user".parse::<ChatRole>().unwrap(), ChatRole::User);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatRole::User => write!(f, "user"),
            ChatRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for ChatRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(ChatRole::User),
            "assistant" => Ok(ChatRole::Assistant),
            other => Err(format!("unknown chat role: {other}")),
        }
    }
}

/// One message of a chat session, reduced to what grounding needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use uema_core::OutputFormat;
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable listings.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
