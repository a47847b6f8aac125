use url::Url;

/// Extracts the lowercase host of a URL
///
/// The port is not part of the domain; pacing and health are tracked per host.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use quarry::url::extract_domain;
///
/// let url = Url::parse("https://Docs.Example.com:8443/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("docs.example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the robots.txt location for the origin serving `url`
pub fn robots_url(url: &Url) -> Option<Url> {
    url.host_str()?;
    url.join("/robots.txt").ok()
}
