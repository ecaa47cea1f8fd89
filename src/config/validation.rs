use crate::config::types::{Config, FetchConfig, OutputConfig, RetryConfig, ScrapeConfig};
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scrape_config(&config.scrape)?;
    validate_fetch_config(&config.fetch)?;
    validate_retry_config(&config.retry)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates a caller-supplied chapter limit against the accepted range
pub fn validate_chapter_limit(limit: u32) -> Result<(), ConfigError> {
    if !(1..=200).contains(&limit) {
        return Err(ConfigError::Validation(format!(
            "chapter limit must be between 1 and 200, got {limit}"
        )));
    }
    Ok(())
}

fn validate_scrape_config(config: &ScrapeConfig) -> Result<(), ConfigError> {
    validate_chapter_limit(config.max_chapters)
        .map_err(|_| ConfigError::Validation(format!(
            "max_chapters must be between 1 and 200, got {}",
            config.max_chapters
        )))?;

    if config.batch_size < 1 || config.batch_size > 16 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be between 1 and 16, got {}",
            config.batch_size
        )));
    }

    if config.min_chapter_links < 1 {
        return Err(ConfigError::Validation(
            "min_chapter_links must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.max_in_flight < 1 || config.max_in_flight > 64 {
        return Err(ConfigError::Validation(format!(
            "max_in_flight must be between 1 and 64, got {}",
            config.max_in_flight
        )));
    }

    if config.max_redirects > 20 {
        return Err(ConfigError::Validation(format!(
            "max_redirects must be <= 20, got {}",
            config.max_redirects
        )));
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.pass1_attempts < 1 {
        return Err(ConfigError::Validation(
            "pass1_attempts must be >= 1".to_string(),
        ));
    }

    if config.pass2_attempts < 1 {
        return Err(ConfigError::Validation(
            "pass2_attempts must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.document_dir.is_empty() {
        return Err(ConfigError::Validation(
            "document_dir cannot be empty".to_string(),
        ));
    }

    if config.progress_interval_secs < 1 {
        return Err(ConfigError::Validation(
            "progress_interval_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}
