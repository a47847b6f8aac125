use crate::config::types::{Config, CrawlerConfig, OutputConfig, PipelineConfig, RetryConfig};
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_retry_config(&config.retry)?;
    validate_pipeline_config(&config.pipeline)?;
    validate_output_config(&config.output)?;
    validate_seeds(&config.seeds)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    validate_unit_interval("quality_threshold", config.quality_threshold)?;
    validate_unit_interval("duplicate_threshold", config.duplicate_threshold)?;

    if config.circuit_breaker_threshold < 1 {
        return Err(ConfigError::Validation(format!(
            "circuit_breaker_threshold must be >= 1, got {}",
            config.circuit_breaker_threshold
        )));
    }

    if config.max_file_size_bytes == 0 {
        return Err(ConfigError::Validation(
            "max_file_size_bytes must be greater than zero".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_secs == 0 || config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request and connect timeouts must be greater than zero".to_string(),
        ));
    }

    for pattern in config
        .include_patterns
        .iter()
        .chain(config.exclude_patterns.iter())
    {
        Regex::new(pattern).map_err(|e| {
            ConfigError::InvalidPattern(format!("Invalid pattern '{}': {}", pattern, e))
        })?;
    }

    Ok(())
}

/// Validates retry configuration
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.backoff_multiplier < 1.0 {
        return Err(ConfigError::Validation(format!(
            "backoff_multiplier must be >= 1.0, got {}",
            config.backoff_multiplier
        )));
    }

    if config.retry_delay_base < 1.0 {
        return Err(ConfigError::Validation(format!(
            "retry_delay_base must be >= 1.0, got {}",
            config.retry_delay_base
        )));
    }

    if config.max_delay_ms < config.base_delay_ms {
        return Err(ConfigError::Validation(format!(
            "max_delay_ms ({}) must be >= base_delay_ms ({})",
            config.max_delay_ms, config.base_delay_ms
        )));
    }

    Ok(())
}

/// Validates pipeline configuration
fn validate_pipeline_config(config: &PipelineConfig) -> Result<(), ConfigError> {
    validate_unit_interval("min_quality_score", config.min_quality_score)?;

    for language in &config.allowed_languages {
        if language.len() != 2 || !language.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "allowed_languages entries must be two-letter lowercase codes, got '{}'",
                language
            )));
        }
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates seed URLs
fn validate_seeds(seeds: &[String]) -> Result<(), ConfigError> {
    for seed in seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use HTTP or HTTPS",
                seed
            )));
        }
    }

    Ok(())
}

fn validate_unit_interval(name: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::Validation(format!(
            "{} must be between 0.0 and 1.0, got {}",
            name, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_threshold_out_of_range() {
        let mut config = Config::default();
        config.crawler.quality_threshold = 1.5;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));

        let mut config = Config::default();
        config.crawler.duplicate_threshold = -0.1;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_bad_pattern_rejected() {
        let mut config = Config::default();
        config.crawler.exclude_patterns = vec!["([unclosed".to_string()];
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_seed_scheme() {
        let mut config = Config::default();
        config.seeds = vec!["ftp://example.com/".to_string()];
        assert!(validate(&config).is_err());

        config.seeds = vec!["http://example.com/".to_string()];
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_language_codes() {
        let mut config = Config::default();
        config.pipeline.allowed_languages = vec!["english".to_string()];
        assert!(validate(&config).is_err());

        config.pipeline.allowed_languages = vec!["en".to_string(), "de".to_string()];
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_max_pages() {
        let mut config = Config::default();
        config.crawler.max_pages = 0;
        assert!(validate(&config).is_err());
    }
}
