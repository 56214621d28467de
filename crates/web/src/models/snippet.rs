use chrono::{DateTime, Utc};

use snippetbox_core::SnippetId;

/// A stored snippet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub id: SnippetId,
    pub title: String,
    pub content: String,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

impl Snippet {
    /// Creation time for display, e.g. `17 Mar 2026 at 10:15`.
    #[must_use]
    pub fn created_display(&self) -> String {
        human_date(self.created)
    }

    #[must_use]
    pub fn expires_display(&self) -> String {
        human_date(self.expires)
    }
}

fn human_date(at: DateTime<Utc>) -> String {
    at.format("%d %b %Y at %H:%M").to_string()
}
