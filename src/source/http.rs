//! Snapshot fetcher for the backend's `GET /people/cards` endpoint.
//!
//! The wire records are deserialised into private `*Record` structs and then
//! normalised into [`PersonCard`]s by [`parse_cards`], which is a pure
//! function so the mapping rules can be tested without a server.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use futures::FutureExt;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::warn;

use super::{ArticleSummary, CardSource, FetchFuture, PersonCard, Snapshot, MAX_ARTICLES_PER_CARD};
use crate::error::FetchError;

/// The backend uses integer primary keys, but nothing stops a proxy or a
/// future version from sending strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecordId {
    Number(i64),
    Text(String),
}

impl RecordId {
    fn into_key(self) -> String {
        match self {
            RecordId::Number(n) => n.to_string(),
            RecordId::Text(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CardRecord {
    id: RecordId,
    name: String,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    articles: Vec<ArticleRecord>,
}

#[derive(Debug, Deserialize)]
struct ArticleRecord {
    id: RecordId,
    title: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
}

/// RFC 3339, or the naive ISO-8601 form the backend writes for UTC rows.
fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

impl From<CardRecord> for PersonCard {
    fn from(record: CardRecord) -> Self {
        // The person's image rides along on every article row.
        let image_url = record
            .image_url
            .or_else(|| record.articles.iter().find_map(|a| a.image_url.clone()));

        let articles = record
            .articles
            .into_iter()
            .take(MAX_ARTICLES_PER_CARD)
            .map(|a| ArticleSummary {
                article_id: a.id.into_key(),
                title: a.title,
                summary: a.summary.unwrap_or_default(),
                link: a.link,
                published_at: a.published_at.as_deref().and_then(parse_published),
            })
            .collect();

        PersonCard {
            person_id: record.id.into_key(),
            name: record.name,
            image_url,
            articles,
        }
    }
}

/// Decode a cards response body into a snapshot.
///
/// Later records reusing an already-seen person id are dropped.
pub fn parse_cards(body: &[u8]) -> Result<Snapshot, FetchError> {
    let records: Vec<CardRecord> =
        serde_json::from_slice(body).map_err(|e| FetchError::Parse(e.to_string()))?;

    let mut seen = HashSet::new();
    let mut cards = Vec::with_capacity(records.len());
    for card in records.into_iter().map(PersonCard::from) {
        if !seen.insert(card.person_id.clone()) {
            warn!(person_id = %card.person_id, "duplicate person in cards response, keeping first");
            continue;
        }
        cards.push(card);
    }
    Ok(cards)
}

/// Pulls snapshots over HTTP.
pub struct HttpCardSource {
    client: reqwest::Client,
    url: String,
}

impl HttpCardSource {
    /// `url` is the full cards endpoint, e.g. `http://localhost:8000/people/cards`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl CardSource for HttpCardSource {
    fn name(&self) -> &str {
        &self.url
    }

    fn fetch(&self) -> FetchFuture {
        let request = self.client.get(&self.url).header(ACCEPT, "application/json");

        async move {
            let response = request
                .send()
                .await
                .map_err(|e| FetchError::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Http(status.as_u16()));
            }

            let body = response
                .bytes()
                .await
                .map_err(|e| FetchError::Network(e.to_string()))?;
            parse_cards(&body)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::testing::{closed_port, serve_once};
    use chrono::TimeZone;

    #[test]
    fn parse_cards_maps_people_and_articles() {
        let body = br#"[
          {"id": 1, "name": "Ada Lovelace", "articles": [
            {"id": 10, "title": "Engine Notes", "summary": "She wrote notes.",
             "link": "https://example.com/10", "image_url": "https://img/ada.png",
             "published_at": "2025-10-10T13:28:17"}
          ]},
          {"id": "p2", "name": "Alan Turing", "image_url": "https://img/alan.png", "articles": [
            {"id": 20, "title": "Test Passed", "summary": "A machine passed.", "link": null},
            {"id": 21, "title": "Codes Broken", "summary": "Enigma fell.",
             "published_at": "2025-10-09T08:00:00Z"}
          ]}
        ]"#;

        let cards = parse_cards(body).unwrap();
        assert_eq!(cards.len(), 2);

        let ada = &cards[0];
        assert_eq!(ada.person_id, "1");
        assert_eq!(ada.name, "Ada Lovelace");
        assert_eq!(ada.image_url.as_deref(), Some("https://img/ada.png"));
        assert_eq!(ada.articles.len(), 1);
        assert_eq!(ada.articles[0].article_id, "10");
        assert_eq!(
            ada.articles[0].published_at,
            Some(Utc.with_ymd_and_hms(2025, 10, 10, 13, 28, 17).unwrap())
        );

        let alan = &cards[1];
        assert_eq!(alan.person_id, "p2");
        assert_eq!(alan.image_url.as_deref(), Some("https://img/alan.png"));
        assert_eq!(alan.articles[0].link, None);
        assert_eq!(alan.articles[0].published_at, None);
        assert_eq!(
            alan.articles[1].published_at,
            Some(Utc.with_ymd_and_hms(2025, 10, 9, 8, 0, 0).unwrap())
        );
    }

    #[test]
    fn articles_truncated_to_first_three_in_order() {
        let body = br#"[{"id": 1, "name": "A", "articles": [
            {"id": 1, "title": "one", "summary": ""},
            {"id": 2, "title": "two", "summary": ""},
            {"id": 3, "title": "three", "summary": ""},
            {"id": 4, "title": "four", "summary": ""}
        ]}]"#;

        let cards = parse_cards(body).unwrap();
        let titles: Vec<_> = cards[0].articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, ["one", "two", "three"]);
    }

    #[test]
    fn duplicate_person_keeps_first() {
        let body = br#"[
            {"id": 1, "name": "First", "articles": []},
            {"id": 1, "name": "Second", "articles": []}
        ]"#;
        let cards = parse_cards(body).unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].name, "First");
    }

    #[test]
    fn missing_optional_fields_default() {
        let body = br#"[{"id": 5, "name": "Nobody", "articles": [{"id": 9, "title": "T"}]}]"#;
        let cards = parse_cards(body).unwrap();
        assert_eq!(cards[0].image_url, None);
        assert_eq!(cards[0].articles[0].summary, "");
        assert_eq!(cards[0].articles[0].link, None);
    }

    #[test]
    fn unparseable_date_becomes_none() {
        assert_eq!(parse_published("not-a-date"), None);
        assert_eq!(parse_published(""), None);
    }

    #[test]
    fn fractional_seconds_are_accepted() {
        assert!(parse_published("2025-10-10T13:28:17.123456").is_some());
        assert!(parse_published("2025-10-10T13:28:17+02:00").is_some());
    }

    #[test]
    fn malformed_body_is_a_parse_error() {
        assert!(matches!(parse_cards(b"{\"detail\": \"nope\"}"), Err(FetchError::Parse(_))));
        assert!(matches!(parse_cards(b"<html>"), Err(FetchError::Parse(_))));
    }

    #[test]
    fn empty_array_is_empty_snapshot() {
        assert!(parse_cards(b"[]").unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetch_reads_cards_from_server() {
        let base = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 57\r\nConnection: close\r\n\r\n\
             [{\"id\":1,\"name\":\"Ada\",\"articles\":[{\"id\":2,\"title\":\"T\"}]}]",
        )
        .await;
        let src = HttpCardSource::new(format!("{base}/people/cards"), Duration::from_secs(2)).unwrap();

        let cards = src.fetch().await.unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].name, "Ada");
    }

    #[tokio::test]
    async fn fetch_maps_server_error_to_http_error() {
        let base = serve_once(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;
        let src = HttpCardSource::new(format!("{base}/people/cards"), Duration::from_secs(2)).unwrap();

        assert_eq!(src.fetch().await, Err(FetchError::Http(500)));
    }

    #[tokio::test]
    async fn fetch_maps_refused_connection_to_network_error() {
        let base = closed_port().await;
        let src = HttpCardSource::new(format!("{base}/people/cards"), Duration::from_secs(2)).unwrap();

        assert!(matches!(src.fetch().await, Err(FetchError::Network(_))));
    }

    #[test]
    fn name_returns_url() {
        let src = HttpCardSource::new("http://localhost:8000/people/cards", Duration::from_secs(1)).unwrap();
        assert_eq!(src.name(), "http://localhost:8000/people/cards");
    }
}
