use thiserror::Error;

use crate::agents::config::ProviderKind;
use crate::config::{EngineSettings, ProvidersSettings, ServerSettings, Settings};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

pub struct ConfigValidator;

impl ConfigValidator {
    /// Collect every problem rather than stopping at the first
    pub fn validate(settings: &Settings) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        errors.extend(Self::validate_server(&settings.server));
        errors.extend(Self::validate_providers(&settings.providers));
        errors.extend(Self::validate_engine(&settings.engine));

        if let Some(rate_limit) = &settings.rate_limit {
            if rate_limit.enabled && rate_limit.requests_per_second == 0 {
                errors.push(ValidationError::InvalidValue {
                    field: "rate_limit.requests_per_second".to_string(),
                    reason: "Must be greater than 0 when rate limiting is enabled".to_string(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_server(server: &ServerSettings) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if server.host.is_empty() {
            errors.push(ValidationError::MissingField("server.host".to_string()));
        }

        if server.port == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "server.port".to_string(),
                reason: "Port must be greater than 0".to_string(),
            });
        }

        errors
    }

    fn validate_providers(providers: &ProvidersSettings) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // a missing credential is allowed: calls to that provider fail on their own
        for kind in ProviderKind::ALL {
            let provider = providers.get(kind);

            if provider.requests_per_minute == 0 {
                errors.push(ValidationError::InvalidValue {
                    field: format!("providers.{}.requests_per_minute", kind),
                    reason: "Limit must be greater than 0".to_string(),
                });
            }

            if provider.base_url.trim().is_empty() {
                errors.push(ValidationError::MissingField(format!(
                    "providers.{}.base_url",
                    kind
                )));
            }
        }

        errors
    }

    fn validate_engine(engine: &EngineSettings) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if engine.memory_cap == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "engine.memory_cap".to_string(),
                reason: "Memory cap must be greater than 0".to_string(),
            });
        }

        if engine.default_iterations == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "engine.default_iterations".to_string(),
                reason: "Must be at least 1".to_string(),
            });
        }

        if engine.default_iterations > engine.max_iterations {
            errors.push(ValidationError::InvalidValue {
                field: "engine.default_iterations".to_string(),
                reason: format!(
                    "Default {} exceeds max_iterations {}",
                    engine.default_iterations, engine.max_iterations
                ),
            });
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ConfigValidator::validate(&Settings::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut settings = Settings::default();
        settings.server.host = String::new();
        settings.server.port = 0;
        settings.providers.anthropic.requests_per_minute = 0;
        settings.engine.memory_cap = 0;

        let errors = ConfigValidator::validate(&settings).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors
            .iter()
            .any(|e| e.to_string().contains("providers.anthropic.requests_per_minute")));
    }

    #[test]
    fn test_default_iterations_above_max_is_rejected() {
        let mut settings = Settings::default();
        settings.engine.default_iterations = 12;
        settings.engine.max_iterations = 10;

        let errors = ConfigValidator::validate(&settings).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            ValidationError::InvalidValue { field, .. } if field == "engine.default_iterations"
        ));
    }

    #[test]
    fn test_missing_credentials_are_not_an_error() {
        let mut settings = Settings::default();
        settings.providers.openai.api_key = None;
        settings.providers.openai.api_key_env = None;
        assert!(ConfigValidator::validate(&settings).is_ok());
    }
}
