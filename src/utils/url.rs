// src/utils/url.rs

//! URL manipulation utilities.

use regex::Regex;
use url::Url;

/// Resolve a potentially relative URL against a base URL.
///
/// # Examples
/// ```
/// use listing_watch::utils::url::resolve;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/cars/search?zip=10001").unwrap();
/// assert_eq!(
///     resolve(&base, "/a/honda/civic/202401150042"),
///     Some("https://example.com/a/honda/civic/202401150042".to_string())
/// );
/// ```
pub fn resolve(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    base.join(href).ok().map(|u| u.to_string())
}

/// Extract a listing identifier from a URL using the first capture group of
/// `pattern`.
///
/// # Examples
/// ```
/// use listing_watch::utils::url::extract_listing_id;
/// use regex::Regex;
///
/// let pattern = Regex::new(r"[_/-]([0-9]{6,})").unwrap();
/// assert_eq!(
///     extract_listing_id("https://example.com/a/honda/civic/202401150042", &pattern),
///     Some("202401150042".to_string())
/// );
/// ```
pub fn extract_listing_id(url: &str, pattern: &Regex) -> Option<String> {
    pattern
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id_pattern() -> Regex {
        Regex::new(r"[_/-]([0-9]{6,})").unwrap()
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let base = Url::parse("https://example.com/cars/all/search").unwrap();
        assert_eq!(
            resolve(&base, "detail/123"),
            Some("https://example.com/cars/all/detail/123".to_string())
        );
        assert_eq!(
            resolve(&base, "https://other.com/x"),
            Some("https://other.com/x".to_string())
        );
    }

    #[test]
    fn test_resolve_skips_fragments_and_scripts() {
        let base = Url::parse("https://example.com/").unwrap();
        assert_eq!(resolve(&base, ""), None);
        assert_eq!(resolve(&base, "#top"), None);
        assert_eq!(resolve(&base, "javascript:void(0)"), None);
    }

    #[test]
    fn test_extract_listing_id_formats() {
        let pattern = id_pattern();
        // Path segment
        assert_eq!(
            extract_listing_id("https://example.com/a/toyota/rav4/1234567", &pattern),
            Some("1234567".to_string())
        );
        // Underscore-joined slug
        assert_eq!(
            extract_listing_id("https://example.com/a/toyota_rav4_7654321", &pattern),
            Some("7654321".to_string())
        );
        // Hyphen-joined slug with query
        assert_eq!(
            extract_listing_id("https://example.com/a/rav4-5555555?utm=x", &pattern),
            Some("5555555".to_string())
        );
    }

    #[test]
    fn test_extract_listing_id_rejects_short_numbers() {
        let pattern = id_pattern();
        assert_eq!(
            extract_listing_id("https://example.com/a/page/2", &pattern),
            None
        );
    }
}
