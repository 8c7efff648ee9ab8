use thiserror::Error;
use url::Url;

/// Errors that can occur while turning a raw navigation string into a [`Url`].
///
/// None of these are fatal to a checkout session: callers log them and let the
/// web view handle the load on its own.
#[derive(Error, Debug)]
pub enum UrlError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https are routed)")]
    UnsupportedScheme(String),
}

/// Parses a navigation URL and rejects anything that is not http(s).
///
/// # Examples
///
/// ```
/// use crowdflow::util::parse_web_url;
///
/// let url = parse_web_url("https://www.kickstarter.com/signup").unwrap();
/// assert_eq!(url.path(), "/signup");
///
/// assert!(parse_web_url("about:blank").is_err());
/// assert!(parse_web_url("not a url").is_err());
/// ```
pub fn parse_web_url(raw: &str) -> Result<Url, UrlError> {
    let url = Url::parse(raw)?;
    ensure_web_scheme(&url)?;
    Ok(url)
}

/// Rejects non-http(s) URLs that were already parsed elsewhere.
pub fn ensure_web_scheme(url: &Url) -> Result<(), UrlError> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(UrlError::UnsupportedScheme(scheme.to_owned())),
    }
}

/// Path without trailing slashes. The root path becomes the empty string.
pub fn trimmed_path(url: &Url) -> &str {
    url.path().trim_end_matches('/')
}

/// Non-empty path segments of `url` that follow `base`'s path, or `None` when
/// `url` lives on another host or outside `base`.
///
/// Hosts are compared case-insensitively (the `url` crate already lowercases
/// them) and the port must match. Query and fragment are ignored.
pub fn segments_under<'a>(url: &'a Url, base: &Url) -> Option<Vec<&'a str>> {
    if url.host_str() != base.host_str() || url.port_or_known_default() != base.port_or_known_default() {
        return None;
    }

    let base_path = trimmed_path(base);
    let path = trimmed_path(url);
    let rest = path.strip_prefix(base_path)?;

    // "/projects/foo-bar" must not match base "/projects/foo"
    if !rest.is_empty() && !rest.starts_with('/') {
        return None;
    }

    Some(rest.split('/').filter(|s| !s.is_empty()).collect())
}

/// True when the query carries `name` with a truthy value (`1` or `true`).
pub fn query_flag(url: &Url, name: &str) -> bool {
    url.query_pairs()
        .any(|(key, value)| key == name && matches!(value.as_ref(), "1" | "true"))
}

/// Same scheme, host, port and path, ignoring query and fragment.
pub fn same_resource(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
        && trimmed_path(a) == trimmed_path(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_parse_accepts_http_and_https() {
        assert!(parse_web_url("https://www.kickstarter.com").is_ok());
        assert!(parse_web_url("http://www.kickstarter.com/projects").is_ok());
    }

    #[test]
    fn test_parse_rejects_other_schemes() {
        let err = parse_web_url("mailto:someone@example.com").unwrap_err();
        assert!(matches!(err, UrlError::UnsupportedScheme(ref s) if s == "mailto"));
        assert!(parse_web_url("file:///etc/passwd").is_err());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_web_url("::::"),
            Err(UrlError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_segments_under_project() {
        let base = url("https://www.kickstarter.com/projects/creator/a-project");
        let pledge = url("https://www.kickstarter.com/projects/creator/a-project/pledge/edit?x=1");
        assert_eq!(segments_under(&pledge, &base), Some(vec!["pledge", "edit"]));
    }

    #[test]
    fn test_segments_under_root_is_empty() {
        let base = url("https://www.kickstarter.com/projects/creator/a-project");
        let root = url("https://www.kickstarter.com/projects/creator/a-project/");
        assert_eq!(segments_under(&root, &base), Some(vec![]));
    }

    #[test]
    fn test_segments_under_rejects_sibling_prefix() {
        let base = url("https://www.kickstarter.com/projects/creator/a-project");
        let other = url("https://www.kickstarter.com/projects/creator/a-project-two/pledge");
        assert_eq!(segments_under(&other, &base), None);
    }

    #[test]
    fn test_segments_under_rejects_other_host() {
        let base = url("https://www.kickstarter.com/projects/creator/a-project");
        let other = url("https://js.stripe.com/projects/creator/a-project");
        assert_eq!(segments_under(&other, &base), None);
    }

    #[test]
    fn test_query_flag() {
        assert!(query_flag(&url("https://a.com/x?racing=1"), "racing"));
        assert!(query_flag(&url("https://a.com/x?ref=y&modal=true"), "modal"));
        assert!(!query_flag(&url("https://a.com/x?modal=false"), "modal"));
        assert!(!query_flag(&url("https://a.com/x"), "modal"));
    }

    #[test]
    fn test_same_resource_ignores_query() {
        assert!(same_resource(
            &url("https://js.stripe.com/v2/channel.html?origin=x"),
            &url("https://js.stripe.com/v2/channel.html")
        ));
        assert!(!same_resource(
            &url("https://js.stripe.com/v3/channel.html"),
            &url("https://js.stripe.com/v2/channel.html")
        ));
    }
}
