use std::path::Path;

use crate::config::schema::ClientConfig;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/client-config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ClientConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<ClientConfig, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: ClientConfig = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &ClientConfig) -> Result<(), ConfigError> {
    if config.poll_interval_ms == 0 {
        return Err(ConfigError::Validation {
            message: "poll_interval_ms must be greater than 0".to_string(),
        });
    }

    if config.max_poll_duration_secs == 0 {
        return Err(ConfigError::Validation {
            message: "max_poll_duration_secs must be greater than 0".to_string(),
        });
    }

    if config.request_timeout_secs == 0 || config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "HTTP timeouts must be greater than 0".to_string(),
        });
    }

    if config.event_capacity == 0 {
        return Err(ConfigError::Validation {
            message: "event_capacity must be greater than 0".to_string(),
        });
    }

    // An absent base URL is allowed here; the uploader reports it on first use.
    if config.has_base_url() {
        config.require_base_url()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_valid_config() {
        let config_json = r#"
        {
            "base_url": "http://localhost:8000",
            "poll_interval_ms": 500,
            "language": "Hindi"
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:8000"));
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.language, "Hindi");
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_load_empty_object_uses_defaults() {
        let config = load_config_from_str("{}").unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = load_config_from_str(r#"{"poll_interval_ms": 0}"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_bad_url_rejected() {
        let result = load_config_from_str(r#"{"base_url": "ftp://backend"}"#);
        assert!(matches!(result, Err(ConfigError::InvalidBaseUrl { .. })));
    }

    #[test]
    fn test_wrong_type_rejected_by_schema() {
        let result = load_config_from_str(r#"{"poll_interval_ms": "fast"}"#);
        match result {
            Err(ConfigError::SchemaValidation { errors }) => {
                assert!(errors.contains("fast"), "unexpected errors: {}", errors)
            }
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = load_config_from_str(r#"{"base_url": "http://localhost:8000", "api_key": "x"}"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_null_base_url_accepted() {
        let config = load_config_from_str(r#"{"base_url": null}"#).unwrap();
        assert!(config.base_url.is_none());
    }

    #[test]
    fn test_non_object_rejected() {
        let result = load_config_from_str("[]");
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_invalid_json() {
        let result = load_config_from_str("{ not json");
        assert!(matches!(result, Err(ConfigError::ParseJson(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"base_url": "https://fra.example.org/"}}"#).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(
            config.require_base_url().unwrap(),
            "https://fra.example.org"
        );
    }

    #[test]
    fn test_missing_file() {
        let result = load_config("/nonexistent/banrakshak.json");
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}
