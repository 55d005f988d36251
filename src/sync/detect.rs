//! Change detection between consecutive snapshots.
//!
//! Whole-snapshot structural equality: cheap for the few dozen cards the
//! backend serves, but linear in payload size on every fetch.  If snapshots
//! grow large this wants per-card hashing instead.

use crate::source::PersonCard;

/// `true` when `next` differs from `previous` in length, order, or any field
/// of any card or article.
pub fn has_changed(previous: &[PersonCard], next: &[PersonCard]) -> bool {
    previous != next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ArticleSummary;
    use chrono::{TimeZone, Utc};

    fn article(id: &str) -> ArticleSummary {
        ArticleSummary {
            article_id: id.to_string(),
            title: format!("Title {id}"),
            summary: "Summary".to_string(),
            link: Some(format!("https://example.com/{id}")),
            published_at: Some(Utc.with_ymd_and_hms(2025, 10, 10, 12, 0, 0).unwrap()),
        }
    }

    fn card(id: &str, articles: &[&str]) -> PersonCard {
        PersonCard {
            person_id: id.to_string(),
            name: format!("Person {id}"),
            image_url: None,
            articles: articles.iter().map(|a| article(a)).collect(),
        }
    }

    fn sample() -> Vec<PersonCard> {
        vec![card("1", &["a"]), card("2", &["b", "c"])]
    }

    #[test]
    fn identical_snapshots_are_unchanged() {
        let a = sample();
        assert!(!has_changed(&a, &a));
        assert!(!has_changed(&a, &a.clone()));
    }

    #[test]
    fn empty_snapshots_are_unchanged() {
        assert!(!has_changed(&[], &[]));
    }

    #[test]
    fn length_difference_is_a_change() {
        let a = sample();
        let mut b = a.clone();
        b.pop();
        assert!(has_changed(&a, &b));
        assert!(has_changed(&b, &a));
    }

    #[test]
    fn reordering_cards_is_a_change() {
        let a = sample();
        let mut b = a.clone();
        b.reverse();
        assert!(has_changed(&a, &b));
    }

    #[test]
    fn reordering_articles_is_a_change() {
        let a = sample();
        let mut b = a.clone();
        b[1].articles.reverse();
        assert!(has_changed(&a, &b));
    }

    #[test]
    fn any_card_field_is_a_change() {
        let a = sample();

        let mut b = a.clone();
        b[0].name.push('!');
        assert!(has_changed(&a, &b));

        let mut b = a.clone();
        b[0].image_url = Some("https://img/x.png".into());
        assert!(has_changed(&a, &b));
    }

    #[test]
    fn any_article_field_is_a_change() {
        let a = sample();

        let mut b = a.clone();
        b[1].articles[1].summary.push('.');
        assert!(has_changed(&a, &b));

        let mut b = a.clone();
        b[1].articles[0].link = None;
        assert!(has_changed(&a, &b));

        let mut b = a.clone();
        b[0].articles[0].published_at = None;
        assert!(has_changed(&a, &b));
    }
}
