//! Query builder configuration
//!
//! Settings are passed into the builder explicitly. They can be built in
//! code, deserialized from JSON, or read from the environment:
//!
//! | Variable                            | Field                       |
//! |-------------------------------------|-----------------------------|
//! | `METAQUERY_DIALECT`                 | `dialect`                   |
//! | `METAQUERY_QUOTE_IDENTIFIERS`       | `quote_identifiers`         |
//! | `METAQUERY_ENCRYPTION_KEY`          | `encryption.key_name`       |
//! | `METAQUERY_ENCRYPTION_CERTIFICATE`  | `encryption.certificate_name` |

use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

use crate::backends::DialectKind;
use crate::security::validate_identifier;

pub const DIALECT_VAR: &str = "METAQUERY_DIALECT";
pub const QUOTE_IDENTIFIERS_VAR: &str = "METAQUERY_QUOTE_IDENTIFIERS";
pub const ENCRYPTION_KEY_VAR: &str = "METAQUERY_ENCRYPTION_KEY";
pub const ENCRYPTION_CERTIFICATE_VAR: &str = "METAQUERY_ENCRYPTION_CERTIFICATE";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {field}. {hint}")]
    MissingRequired { field: String, hint: String },

    #[error("Invalid value for field '{field}': '{value}'. Expected: {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Configuration validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Symmetric key and certificate protecting encrypted columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionConfig {
    pub key_name: String,
    pub certificate_name: String,
}

impl EncryptionConfig {
    pub fn new(key_name: &str, certificate_name: &str) -> Self {
        Self {
            key_name: key_name.to_string(),
            certificate_name: certificate_name.to_string(),
        }
    }
}

/// Query builder configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryBuilderConfig {
    #[serde(default)]
    pub dialect: DialectKind,
    /// Quote table and column names in the dialect's style
    #[serde(default)]
    pub quote_identifiers: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<EncryptionConfig>,
}

impl QueryBuilderConfig {
    pub fn new(dialect: DialectKind) -> Self {
        Self {
            dialect,
            quote_identifiers: false,
            encryption: None,
        }
    }

    pub fn sql_server() -> Self {
        Self::new(DialectKind::SqlServer)
    }

    pub fn oracle() -> Self {
        Self::new(DialectKind::Oracle)
    }

    pub fn with_quoted_identifiers(mut self) -> Self {
        self.quote_identifiers = true;
        self
    }

    pub fn with_encryption(mut self, key_name: &str, certificate_name: &str) -> Self {
        self.encryption = Some(EncryptionConfig::new(key_name, certificate_name));
        self
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(dialect) = env::var(DIALECT_VAR) {
            config.dialect = dialect.parse().map_err(|_| ConfigError::InvalidValue {
                field: "dialect".to_string(),
                value: dialect.clone(),
                expected: "sqlserver or oracle".to_string(),
            })?;
        }

        if let Ok(quote) = env::var(QUOTE_IDENTIFIERS_VAR) {
            config.quote_identifiers = parse_flag(&quote).ok_or_else(|| ConfigError::InvalidValue {
                field: "quote_identifiers".to_string(),
                value: quote.clone(),
                expected: "true or false".to_string(),
            })?;
        }

        let key = env::var(ENCRYPTION_KEY_VAR).ok();
        let certificate = env::var(ENCRYPTION_CERTIFICATE_VAR).ok();
        config.encryption = match (key, certificate) {
            (Some(key), Some(certificate)) => Some(EncryptionConfig {
                key_name: key,
                certificate_name: certificate,
            }),
            (Some(_), None) => {
                return Err(ConfigError::MissingRequired {
                    field: "encryption.certificate_name".to_string(),
                    hint: format!(
                        "{} is required when {} is set",
                        ENCRYPTION_CERTIFICATE_VAR, ENCRYPTION_KEY_VAR
                    ),
                })
            }
            (None, Some(_)) => {
                return Err(ConfigError::MissingRequired {
                    field: "encryption.key_name".to_string(),
                    hint: format!(
                        "{} is required when {} is set",
                        ENCRYPTION_KEY_VAR, ENCRYPTION_CERTIFICATE_VAR
                    ),
                })
            }
            (None, None) => None,
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(encryption) = &self.encryption {
            if self.dialect == DialectKind::Oracle {
                return Err(ConfigError::ValidationFailed {
                    message: "column encryption is only available with the sqlserver dialect"
                        .to_string(),
                });
            }

            for (field, value) in [
                ("encryption.key_name", &encryption.key_name),
                ("encryption.certificate_name", &encryption.certificate_name),
            ] {
                validate_identifier(value).map_err(|e| ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.clone(),
                    expected: format!("a valid SQL identifier ({})", e),
                })?;
            }
        }

        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
