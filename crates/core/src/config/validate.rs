use super::{types::Config, ConfigError};

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.remote.base_url.is_empty() {
        return Err(ConfigError::ValidationError(
            "remote.base_url cannot be empty".to_string(),
        ));
    }

    if config.remote.page_size == 0 {
        return Err(ConfigError::ValidationError(
            "remote.page_size must be at least 1".to_string(),
        ));
    }

    if config.ingest.batch_size == 0 {
        return Err(ConfigError::ValidationError(
            "ingest.batch_size must be at least 1".to_string(),
        ));
    }

    if config.ingest.max_consecutive_failures == 0 {
        return Err(ConfigError::ValidationError(
            "ingest.max_consecutive_failures must be at least 1".to_string(),
        ));
    }

    if config.ingest.start_page == 0 {
        return Err(ConfigError::ValidationError(
            "ingest.start_page must be at least 1".to_string(),
        ));
    }

    if config.search.default_page_size == 0 || config.search.max_page_size == 0 {
        return Err(ConfigError::ValidationError(
            "search page sizes must be at least 1".to_string(),
        ));
    }

    if config.search.default_page_size > config.search.max_page_size {
        return Err(ConfigError::ValidationError(
            "search.default_page_size cannot exceed search.max_page_size".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = Config::default();
        config.server.port = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_zero_page_size_fails() {
        let mut config = Config::default();
        config.remote.page_size = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_batch_size_fails() {
        let mut config = Config::default();
        config.ingest.batch_size = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_page_size_ordering() {
        let mut config = Config::default();
        config.search.default_page_size = 500;
        config.search.max_page_size = 250;
        assert!(validate_config(&config).is_err());
    }
}
