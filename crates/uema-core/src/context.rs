use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{Document, DocumentStatus, Sector};

/// Permission level of a portal user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Full access to every sector.
    Admin,
    /// Manages the documents of one sector.
    Manager,
    /// Authors documents.
    Staff,
    /// Read-only access to published documents.
    Viewer,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::Manager => write!(f, "manager"),
            UserRole::Staff => write!(f, "staff"),
            UserRole::Viewer => write!(f, "viewer"),
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "manager" => Ok(UserRole::Manager),
            "staff" => Ok(UserRole::Staff),
            "viewer" => Ok(UserRole::Viewer),
            other => Err(format!("unknown user role: {other}")),
        }
    }
}

/// The acting user, passed explicitly to every operation that needs identity.
///
/// # Examples
///
/// ```
/// use uema_core::{Document, DocumentStatus, Sector, UserContext, UserRole};
///
/// let manager = UserContext::new("ana", UserRole::Manager).with_sector(Sector::Prog);
/// let draft = Document::new("d1", "Minuta", Sector::Prog)
///     .with_status(DocumentStatus::Draft)
///     .with_author("joao");
/// assert!(manager.can_view(&draft));
/// assert!(manager.can_edit(&draft));
///
/// let viewer = UserContext::new("maria", UserRole::Viewer);
/// assert!(!viewer.can_view(&draft));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub name: String,
    pub role: UserRole,
    /// Home sector, relevant for managers.
    pub sector: Option<Sector>,
}

impl UserContext {
    pub fn new(name: impl Into<String>, role: UserRole) -> Self {
        Self {
            name: name.into(),
            role,
            sector: None,
        }
    }

    pub fn with_sector(mut self, sector: Sector) -> Self {
        self.sector = Some(sector);
        self
    }

    fn manages(&self, sector: Sector) -> bool {
        self.role == UserRole::Manager && self.sector == Some(sector)
    }

    fn authored(&self, doc: &Document) -> bool {
        !doc.author.is_empty() && doc.author == self.name
    }

    /// Whether the document may appear in this user's listings and answers.
    pub fn can_view(&self, doc: &Document) -> bool {
        if self.role == UserRole::Admin {
            return true;
        }
        match doc.status {
            DocumentStatus::Published => true,
            DocumentStatus::Draft => self.authored(doc) || self.manages(doc.sector),
            DocumentStatus::Archived => self.manages(doc.sector),
        }
    }

    /// Whether the user may modify or delete the document.
    pub fn can_edit(&self, doc: &Document) -> bool {
        match self.role {
            UserRole::Admin => true,
            UserRole::Manager => self.manages(doc.sector),
            UserRole::Staff => doc.status == DocumentStatus::Draft && self.authored(doc),
            UserRole::Viewer => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(status: DocumentStatus, sector: Sector, author: &str) -> Document {
        Document::new("d", "t", sector)
            .with_status(status)
            .with_author(author)
    }

    #[test]
    fn published_is_visible_to_everyone() {
        let d = doc(DocumentStatus::Published, Sector::Cct, "x");
        for role in [UserRole::Admin, UserRole::Manager, UserRole::Staff, UserRole::Viewer] {
            assert!(UserContext::new("u", role).can_view(&d));
        }
    }

    #[test]
    fn draft_is_visible_to_author_only_among_staff() {
        let d = doc(DocumentStatus::Draft, Sector::Cct, "paulo");
        assert!(UserContext::new("paulo", UserRole::Staff).can_view(&d));
        assert!(!UserContext::new("rita", UserRole::Staff).can_view(&d));
    }

    #[test]
    fn archived_needs_sector_manager_or_admin() {
        let d = doc(DocumentStatus::Archived, Sector::Ccs, "paulo");
        assert!(UserContext::new("a", UserRole::Admin).can_view(&d));
        assert!(UserContext::new("m", UserRole::Manager)
            .with_sector(Sector::Ccs)
            .can_view(&d));
        assert!(!UserContext::new("m", UserRole::Manager)
            .with_sector(Sector::Cca)
            .can_view(&d));
        assert!(!UserContext::new("paulo", UserRole::Staff).can_view(&d));
    }

    #[test]
    fn staff_cannot_edit_published_even_as_author() {
        let d = doc(DocumentStatus::Published, Sector::Cct, "paulo");
        assert!(!UserContext::new("paulo", UserRole::Staff).can_edit(&d));
        let draft = doc(DocumentStatus::Draft, Sector::Cct, "paulo");
        assert!(UserContext::new("paulo", UserRole::Staff).can_edit(&draft));
    }

    #[test]
    fn empty_author_never_matches() {
        let d = doc(DocumentStatus::Draft, Sector::Cct, "");
        assert!(!UserContext::new("", UserRole::Staff).can_view(&d));
    }

    #[test]
    fn role_parses() {
        assert_eq!("Manager".parse::<UserRole>().unwrap(), UserRole::Manager);
        assert!("root".parse::<UserRole>().is_err());
    }
}
