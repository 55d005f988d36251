//! The core data types shared by the fetcher, the sync engine and the UI.
//!
//! A [`Snapshot`] is one complete answer from the cards endpoint.  Snapshots
//! are immutable once built; the sync engine replaces them wholesale.

use chrono::{DateTime, Utc};

/// Each card shows at most this many headlines, in server order.
pub const MAX_ARTICLES_PER_CARD: usize = 3;

/// One headline on the front of a card, with the text for the back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleSummary {
    pub article_id: String,
    /// Short generated headline.
    pub title: String,
    /// Two or three sentence neutral summary, shown on the back.
    pub summary: String,
    pub link: Option<String>,
    /// `None` when the backend did not know, or sent something unparseable.
    pub published_at: Option<DateTime<Utc>>,
}

/// A person and their most recent articles.
///
/// Equality is field-by-field, so two cards are equal regardless of the key
/// order the server serialised them in, but `articles` compares in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonCard {
    /// Unique within a snapshot.
    pub person_id: String,
    pub name: String,
    pub image_url: Option<String>,
    /// Display order, newest first as served.  Never longer than
    /// [`MAX_ARTICLES_PER_CARD`].
    pub articles: Vec<ArticleSummary>,
}

impl PersonCard {
    /// Up to two initials, used as the avatar when there is no image.
    pub fn initials(&self) -> String {
        self.name
            .split_whitespace()
            .filter_map(|part| part.chars().next())
            .filter(|c| c.is_alphanumeric())
            .take(2)
            .flat_map(char::to_uppercase)
            .collect()
    }
}

/// An ordered list of cards produced by a single fetch.
pub type Snapshot = Vec<PersonCard>;
