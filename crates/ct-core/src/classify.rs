//! Page classification for single-page-app locations
//!
//! Classification runs on every mutation batch, so these functions avoid
//! allocations and work directly on string slices.

use crate::types::PageCategory;

/// Literal path of the watch page.
pub const WATCH_PATH: &str = "/watch";
/// Literal path of the search results page.
pub const SEARCH_PATH: &str = "/results";
/// Prefix shared by the feed listings (subscriptions, history, ...).
pub const FEED_PREFIX: &str = "/feed/";

// =============================================================================
// Location Parsing
// =============================================================================

/// Get the position after "://".
#[inline]
fn get_scheme_end(url: &str) -> Option<usize> {
    let bytes = url.as_bytes();

    // Paths never carry a scheme
    if bytes.first() == Some(&b'/') {
        return None;
    }

    // The scheme ends before any path, query or fragment delimiter
    let colon_pos = bytes
        .iter()
        .position(|&b| matches!(b, b':' | b'/' | b'?' | b'#'))?;
    if bytes[colon_pos] != b':' {
        return None;
    }

    if bytes.len() > colon_pos + 2
        && bytes[colon_pos + 1] == b'/'
        && bytes[colon_pos + 2] == b'/'
    {
        return Some(colon_pos + 3);
    }

    None
}

/// Extract the path component of a location.
///
/// Accepts a full URL or a bare path. The query string and fragment are
/// never part of the result. Returns "/" when there is no path.
#[inline]
pub fn location_path(location: &str) -> &str {
    let bytes = location.as_bytes();

    let path_start = match get_scheme_end(location) {
        Some(scheme_end) => {
            // First '/' after the host
            let mut start = None;
            for (i, &b) in bytes[scheme_end..].iter().enumerate() {
                if b == b'/' {
                    start = Some(scheme_end + i);
                    break;
                }
                if b == b'?' || b == b'#' {
                    return "/";
                }
            }
            match start {
                Some(pos) => pos,
                None => return "/",
            }
        }
        None => 0,
    };

    let mut path_end = bytes.len();
    for (i, &b) in bytes[path_start..].iter().enumerate() {
        if b == b'?' || b == b'#' {
            path_end = path_start + i;
            break;
        }
    }

    let path = &location[path_start..path_end];
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Classify a location into a page category.
///
/// Total and pure: every input maps to exactly one category, with
/// `PageCategory::Other` as the catch-all. Rules are tested most specific
/// first: root, watch, search, feed prefix.
pub fn classify(location: &str) -> PageCategory {
    let path = location_path(location);

    if path == "/" {
        PageCategory::Home
    } else if is_literal(path, WATCH_PATH) {
        PageCategory::Watch
    } else if is_literal(path, SEARCH_PATH) {
        PageCategory::Search
    } else if path.starts_with(FEED_PREFIX) {
        PageCategory::Feed
    } else {
        PageCategory::Other
    }
}

/// Exact path match, tolerating one trailing slash.
#[inline]
fn is_literal(path: &str, literal: &str) -> bool {
    path == literal || path.strip_suffix('/') == Some(literal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_location_path() {
        assert_eq!(location_path("https://www.example.com/watch?v=abc"), "/watch");
        assert_eq!(location_path("https://www.example.com"), "/");
        assert_eq!(location_path("https://www.example.com?x=1"), "/");
        assert_eq!(location_path("https://www.example.com/#top"), "/");
        assert_eq!(location_path("/feed/subscriptions?flow=1"), "/feed/subscriptions");
        assert_eq!(location_path(""), "/");
        assert_eq!(location_path("?q=1"), "/");
    }

    #[test]
    fn test_classify_categories() {
        assert_eq!(classify("/"), PageCategory::Home);
        assert_eq!(classify(""), PageCategory::Home);
        assert_eq!(classify("https://www.example.com/"), PageCategory::Home);
        assert_eq!(classify("/watch"), PageCategory::Watch);
        assert_eq!(classify("/watch/"), PageCategory::Watch);
        assert_eq!(classify("https://www.example.com/watch?v=dQw4w9WgXcQ"), PageCategory::Watch);
        assert_eq!(classify("/results?search_query=rust"), PageCategory::Search);
        assert_eq!(classify("/feed/subscriptions"), PageCategory::Feed);
        assert_eq!(classify("/feed/history"), PageCategory::Feed);
    }

    #[test]
    fn test_classify_catch_all() {
        assert_eq!(classify("/feed"), PageCategory::Other);
        assert_eq!(classify("/watchlater"), PageCategory::Other);
        assert_eq!(classify("/shorts/abc"), PageCategory::Other);
        assert_eq!(classify("/@channel/videos"), PageCategory::Other);
        assert_eq!(classify("not a url"), PageCategory::Other);
    }

    #[test]
    fn test_url_in_query_is_not_a_scheme() {
        assert_eq!(location_path("watch?next=https://x"), "watch");
        assert_eq!(classify("watch?next=https://x"), PageCategory::Other);
        assert_eq!(classify("feed#https://x/watch"), PageCategory::Other);
        assert_eq!(classify("https://x/watch?next=https://y"), PageCategory::Watch);
    }

    #[test]
    fn test_classify_is_idempotent() {
        for input in ["/", "/watch?v=1", "/results", "/feed/x", "/elsewhere"] {
            assert_eq!(classify(input), classify(input));
        }
    }

    proptest! {
        #[test]
        fn classify_is_total(input in ".*") {
            let category = classify(&input);
            prop_assert!(PageCategory::ALL.contains(&category));
        }

        #[test]
        fn query_never_changes_category(path in "/[a-z/]{0,16}", query in "[a-z=&]{0,16}") {
            let with_query = format!("{path}?{query}");
            prop_assert_eq!(classify(&path), classify(&with_query));
        }
    }
}
