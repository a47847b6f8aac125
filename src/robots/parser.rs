//! robots.txt rule evaluation
//!
//! Allow/disallow matching is delegated to the robotstxt crate. Crawl-delay is
//! not part of that crate's API, so it is read here from the group that names
//! our agent, falling back to the `*` group.

use robotstxt::DefaultMatcher;

/// Rules from one robots.txt body
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    body: String,
    allow_all: bool,
}

impl ParsedRobots {
    /// Wraps a fetched robots.txt body
    pub fn from_content(content: &str) -> Self {
        Self {
            body: content.to_string(),
            allow_all: content.trim().is_empty(),
        }
    }

    /// Rules that allow everything
    ///
    /// Used when robots.txt is missing or could not be fetched.
    pub fn allow_all() -> Self {
        Self {
            body: String::new(),
            allow_all: true,
        }
    }

    /// Returns true if nothing is restricted
    pub fn is_permissive(&self) -> bool {
        self.allow_all
    }

    /// Checks a URL against the rules for `user_agent`
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL or path to check
    /// * `user_agent` - Product token of the crawler, e.g. `QuarryBot`
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.allow_all {
            return true;
        }
        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.body, user_agent, url)
    }

    /// Crawl-delay in seconds for `user_agent`, if the file sets one
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        if self.allow_all {
            return None;
        }

        let agent = user_agent.to_lowercase();
        let mut group: Vec<String> = Vec::new();
        let mut group_open = false;
        let mut specific = None;
        let mut wildcard = None;

        for line in self.body.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match key.trim().to_lowercase().as_str() {
                "user-agent" => {
                    // A user-agent line after any rule starts a new group
                    if !group_open {
                        group.clear();
                        group_open = true;
                    }
                    group.push(value.to_lowercase());
                }
                "crawl-delay" => {
                    group_open = false;
                    let Ok(delay) = value.parse::<f64>() else {
                        continue;
                    };
                    if group.iter().any(|ua| ua != "*" && agent.contains(ua.as_str())) {
                        specific = Some(delay);
                    } else if group.iter().any(|ua| ua == "*") {
                        wildcard = Some(delay);
                    }
                }
                _ => group_open = false,
            }
        }

        specific.or(wildcard)
    }
}

/// Extracts the product token (`QuarryBot` from `QuarryBot/0.1 (+...)`)
pub fn product_token(user_agent: &str) -> &str {
    user_agent
        .split(|c: char| c == '/' || c.is_whitespace())
        .next()
        .unwrap_or(user_agent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_all() {
        let robots = ParsedRobots::allow_all();
        assert!(robots.is_permissive());
        assert!(robots.is_allowed("https://example.com/admin", "QuarryBot"));
    }

    #[test]
    fn test_empty_body_is_permissive() {
        let robots = ParsedRobots::from_content("  \n");
        assert!(robots.is_permissive());
    }

    #[test]
    fn test_disallow_prefix() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /private");
        assert!(robots.is_allowed("https://example.com/", "QuarryBot"));
        assert!(!robots.is_allowed("https://example.com/private", "QuarryBot"));
        assert!(!robots.is_allowed("https://example.com/private/page", "QuarryBot"));
    }

    #[test]
    fn test_allow_overrides_longer_match() {
        let robots =
            ParsedRobots::from_content("User-agent: *\nDisallow: /docs\nAllow: /docs/public");
        assert!(!robots.is_allowed("https://example.com/docs/internal", "QuarryBot"));
        assert!(robots.is_allowed("https://example.com/docs/public", "QuarryBot"));
    }

    #[test]
    fn test_agent_specific_group() {
        let robots =
            ParsedRobots::from_content("User-agent: QuarryBot\nDisallow: /\n\nUser-agent: *\nAllow: /");
        assert!(!robots.is_allowed("https://example.com/page", "QuarryBot"));
        assert!(robots.is_allowed("https://example.com/page", "OtherBot"));
    }

    #[test]
    fn test_crawl_delay_prefers_specific_group() {
        let robots = ParsedRobots::from_content(
            "User-agent: *\nCrawl-delay: 10\n\nUser-agent: QuarryBot\nCrawl-delay: 2.5",
        );
        assert_eq!(robots.crawl_delay("QuarryBot"), Some(2.5));
        assert_eq!(robots.crawl_delay("OtherBot"), Some(10.0));
    }

    #[test]
    fn test_crawl_delay_shared_group() {
        let robots =
            ParsedRobots::from_content("User-agent: BotA\nUser-agent: QuarryBot\nCrawl-delay: 3");
        assert_eq!(robots.crawl_delay("quarrybot"), Some(3.0));
        assert_eq!(robots.crawl_delay("BotC"), None);
    }

    #[test]
    fn test_crawl_delay_absent_or_garbage() {
        let robots = ParsedRobots::from_content("User-agent: *\nCrawl-delay: soon\nDisallow: /x");
        assert_eq!(robots.crawl_delay("QuarryBot"), None);
    }

    #[test]
    fn test_product_token() {
        assert_eq!(product_token("QuarryBot/0.1 (+https://example.com/bot)"), "QuarryBot");
        assert_eq!(product_token("plainbot"), "plainbot");
    }
}
