//! New-listing detection.
//!
//! Compares a fresh fetch against the seen set. Only additions matter here:
//! a listing that disappears from the search page stays in the seen set so it
//! never alerts again if it comes back.

use std::collections::HashSet;

use crate::models::{Listing, SeenSet};

/// Return the candidates whose identifier is not in `seen`, in fetch order.
///
/// Repeated identifiers within `candidates` are collapsed to their first
/// occurrence.
pub fn diff(candidates: &[Listing], seen: &SeenSet) -> Vec<Listing> {
    let mut emitted = HashSet::new();
    candidates
        .iter()
        .filter(|listing| !seen.contains(&listing.id))
        .filter(|listing| emitted.insert(listing.id.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_listing(id: &str) -> Listing {
        Listing {
            id: id.to_string(),
            title: format!("Listing {id}"),
            price: None,
            url: format!("https://example.com/a/{id}"),
            first_seen: Utc::now(),
        }
    }

    fn ids(listings: &[Listing]) -> Vec<&str> {
        listings.iter().map(|l| l.id.as_str()).collect()
    }

    #[test]
    fn test_only_unseen_returned() {
        let seen: SeenSet = ["A", "B"].into_iter().collect();
        let candidates = vec![make_listing("A"), make_listing("B"), make_listing("C")];

        let result = diff(&candidates, &seen);
        assert_eq!(ids(&result), vec!["C"]);
    }

    #[test]
    fn test_preserves_fetch_order() {
        let seen: SeenSet = ["B"].into_iter().collect();
        let candidates = vec![
            make_listing("Z"),
            make_listing("B"),
            make_listing("A"),
            make_listing("M"),
        ];

        let result = diff(&candidates, &seen);
        assert_eq!(ids(&result), vec!["Z", "A", "M"]);
    }

    #[test]
    fn test_empty_seen_returns_everything() {
        let candidates = vec![make_listing("1"), make_listing("2")];
        let result = diff(&candidates, &SeenSet::new());
        assert_eq!(result, candidates);
    }

    #[test]
    fn test_all_seen_returns_nothing() {
        let seen: SeenSet = ["1", "2"].into_iter().collect();
        let candidates = vec![make_listing("2"), make_listing("1")];
        assert!(diff(&candidates, &seen).is_empty());
    }

    #[test]
    fn test_duplicate_candidates_collapsed() {
        let candidates = vec![make_listing("X"), make_listing("Y"), make_listing("X")];
        let result = diff(&candidates, &SeenSet::new());
        assert_eq!(ids(&result), vec!["X", "Y"]);
    }

    #[test]
    fn test_set_inclusion_holds_for_mixed_inputs() {
        let seen: SeenSet = ["2", "4", "6", "8"].into_iter().collect();
        let candidates: Vec<Listing> = (1..=10).map(|n| make_listing(&n.to_string())).collect();

        let result = diff(&candidates, &seen);
        for listing in &result {
            assert!(!seen.contains(&listing.id));
            assert!(candidates.contains(listing));
        }
        assert_eq!(ids(&result), vec!["1", "3", "5", "7", "9", "10"]);
    }

    #[test]
    fn test_does_not_touch_seen() {
        let seen: SeenSet = ["A"].into_iter().collect();
        let _ = diff(&[make_listing("B")], &seen);
        assert_eq!(seen.len(), 1);
        assert!(!seen.is_changed());
    }
}
