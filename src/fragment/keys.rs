//! Cache key and metric key normalisation.
//!
//! A fragment URL becomes both its default cache key and the prefix of every
//! metric it emits, so the transform must only produce characters a metrics
//! backend accepts as part of a name.

/// Strip a leading `scheme://` and flatten `. - : /` to `_`.
pub fn cache_key(url: &str) -> String {
    metric_key(strip_scheme(url))
}

/// Flatten `. - : /` to `_` so the key is safe to use as a metric name.
pub fn metric_key(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            '.' | '-' | ':' | '/' => '_',
            other => other,
        })
        .collect()
}

fn strip_scheme(url: &str) -> &str {
    match url.find("://") {
        Some(idx) if is_scheme(&url[..idx]) => &url[idx + 3..],
        _ => url,
    }
}

fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_strips_scheme() {
        assert_eq!(
            cache_key("http://localhost:5001/fragments/header.html"),
            "localhost_5001_fragments_header_html"
        );
        assert_eq!(cache_key("https://cdn.example-site.com/a"), "cdn_example_site_com_a");
    }

    #[test]
    fn test_cache_key_without_scheme() {
        assert_eq!(cache_key("cache"), "cache");
        assert_eq!(cache_key("/relative/path"), "_relative_path");
    }

    #[test]
    fn test_metric_key_is_idempotent() {
        let once = metric_key("page:home-v1.2/header");
        assert_eq!(once, "page_home_v1_2_header");
        assert_eq!(metric_key(&once), once);
    }
}
