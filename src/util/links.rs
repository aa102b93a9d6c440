use thiserror::Error;
use url::Url;

/// Errors that can occur while validating a subscription URL.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string was empty after trimming.
    #[error("URL is empty")]
    Empty,
    /// The URL string could not be parsed as an absolute URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
}

/// Validates a subscription URL and returns it trimmed.
///
/// The returned string is the caller's input minus surrounding whitespace, not
/// the re-serialized form, so duplicate detection stays an exact-match check.
///
/// # Examples
///
/// ```
/// use feedsync::util::validate_feed_url;
///
/// assert_eq!(
///     validate_feed_url("  https://example.com/feed.xml ").unwrap(),
///     "https://example.com/feed.xml"
/// );
/// assert!(validate_feed_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_feed_url(input: &str) -> Result<String, UrlValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlValidationError::Empty);
    }

    let url = Url::parse(trimmed)?;
    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }

    Ok(trimmed.to_string())
}

/// Resolves an entry link against the feed's own URL.
///
/// Absolute http(s) links are returned as-is (normalized by `url`), relative
/// links are joined onto `base`. Blank links, non-web schemes and links that
/// cannot be resolved yield `None`.
pub fn resolve_link(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let resolved = match Url::parse(href) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(base).ok()?.join(href).ok()?,
        Err(_) => return None,
    };

    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_urls() {
        assert!(validate_feed_url("https://example.com/feed.xml").is_ok());
        assert!(validate_feed_url("http://news.example.org").is_ok());
        assert!(validate_feed_url("http://127.0.0.1:8080/rss").is_ok());
    }

    #[test]
    fn test_trims_whitespace_only() {
        assert_eq!(
            validate_feed_url("\thttps://Example.com/Feed \n").unwrap(),
            "https://Example.com/Feed"
        );
    }

    #[test]
    fn test_empty_rejected() {
        assert!(matches!(
            validate_feed_url("   "),
            Err(UrlValidationError::Empty)
        ));
    }

    #[test]
    fn test_invalid_schemes() {
        assert!(matches!(
            validate_feed_url("file:///etc/passwd"),
            Err(UrlValidationError::UnsupportedScheme(s)) if s == "file"
        ));
        assert!(validate_feed_url("ftp://example.com").is_err());
    }

    #[test]
    fn test_relative_rejected() {
        assert!(matches!(
            validate_feed_url("/feed.xml"),
            Err(UrlValidationError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_resolve_absolute_link() {
        assert_eq!(
            resolve_link("https://example.com/rss", "https://other.org/post/1"),
            Some("https://other.org/post/1".to_string())
        );
    }

    #[test]
    fn test_resolve_relative_link() {
        assert_eq!(
            resolve_link("https://example.com/blog/rss.xml", "/posts/1"),
            Some("https://example.com/posts/1".to_string())
        );
        assert_eq!(
            resolve_link("https://example.com/blog/rss.xml", "post-2.html"),
            Some("https://example.com/blog/post-2.html".to_string())
        );
    }

    #[test]
    fn test_resolve_rejects_unusable_links() {
        assert_eq!(resolve_link("https://example.com/rss", "   "), None);
        assert_eq!(resolve_link("https://example.com/rss", "mailto:a@b.c"), None);
        assert_eq!(resolve_link("not a base", "relative/path"), None);
    }
}
