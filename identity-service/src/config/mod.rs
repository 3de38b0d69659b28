use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

use crate::models::CodeChallengeMode;

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub allowed_origins: Vec<String>,
    pub authorization: AuthorizationConfig,
    pub providers: ProvidersConfig,
    pub signing: SigningConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizationConfig {
    /// Public URI of the authorize endpoint. External providers call back to
    /// `{authorize_uri}/callback/{provider}`.
    pub authorize_uri: String,
    pub consent_uri: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidersConfig {
    pub msal: Option<MsalConfig>,
    pub oauth: Option<GenericOAuthConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MsalConfig {
    pub client_id: String,
    pub client_secret: String,
    pub instance: String,
    pub tenant_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenericOAuthConfig {
    pub name: String,
    pub client_id: String,
    pub client_secret: String,
    pub instance: String,
    pub code_challenge_method: CodeChallengeMode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SigningConfig {
    pub key_name: String,
    /// PEM encoded RSA keys imported at startup, oldest first. A key is
    /// generated when empty.
    pub key_paths: Vec<String>,
    pub key_ttl_days: i64,
}

impl SigningConfig {
    /// Expiry of keys imported at `now`.
    pub fn key_expiry(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, AppError> {
        Duration::try_days(self.key_ttl_days)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!(
                    "SIGNING_KEY_TTL_DAYS {} is out of range",
                    self.key_ttl_days
                ))
            })
    }
}

impl IdentityConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = IdentityConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("identity-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            allowed_origins: split_list(&get_env(
                "ALLOWED_ORIGINS",
                Some("http://localhost:3000"),
                is_prod,
            )?),
            authorization: AuthorizationConfig {
                authorize_uri: get_env(
                    "AUTHORIZE_URI",
                    Some("http://localhost:8080/oauth2/v1/authorize"),
                    is_prod,
                )?,
                consent_uri: get_env("CONSENT_URI", Some("http://localhost:3000/consent"), is_prod)?,
            },
            providers: ProvidersConfig {
                msal: match env::var("MSAL_CLIENT_ID") {
                    Ok(client_id) => Some(MsalConfig {
                        client_id,
                        client_secret: get_env("MSAL_CLIENT_SECRET", None, is_prod)?,
                        instance: get_env(
                            "MSAL_INSTANCE",
                            Some("login.microsoftonline.com"),
                            is_prod,
                        )?,
                        tenant_id: get_env("MSAL_TENANT_ID", Some("common"), is_prod)?,
                    }),
                    Err(_) => None,
                },
                oauth: match env::var("OAUTH_PROVIDER_NAME") {
                    Ok(name) => Some(GenericOAuthConfig {
                        name,
                        client_id: get_env("OAUTH_CLIENT_ID", None, is_prod)?,
                        client_secret: get_env("OAUTH_CLIENT_SECRET", None, is_prod)?,
                        instance: get_env("OAUTH_INSTANCE", None, is_prod)?,
                        code_challenge_method: get_env(
                            "OAUTH_CODE_CHALLENGE_METHOD",
                            Some("S256"),
                            is_prod,
                        )?
                        .parse()
                        .map_err(|e: crate::services::IdentityError| {
                            AppError::ConfigError(anyhow::anyhow!(e.to_string()))
                        })?,
                    }),
                    Err(_) => None,
                },
            },
            signing: SigningConfig {
                key_name: get_env("SIGNING_KEY_NAME", Some("ozone-token-signing"), is_prod)?,
                key_paths: split_list(&env::var("SIGNING_KEY_PATHS").unwrap_or_default()),
                key_ttl_days: get_env("SIGNING_KEY_TTL_DAYS", Some("90"), is_prod)?
                    .parse()
                    .map_err(|e: std::num::ParseIntError| {
                        AppError::ConfigError(anyhow::anyhow!(e.to_string()))
                    })?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.signing.key_name.trim().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SIGNING_KEY_NAME must not be empty"
            )));
        }

        if self.signing.key_ttl_days <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SIGNING_KEY_TTL_DAYS must be positive"
            )));
        }
        self.signing.key_expiry(Utc::now())?;

        if self.environment == Environment::Prod {
            if !self.authorization.authorize_uri.starts_with("https://") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "AUTHORIZE_URI must use https in production"
                )));
            }

            if self.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if self.signing.key_paths.is_empty() {
                tracing::error!("No signing keys configured in production - tokens will be signed with an ephemeral key");
            }
        }

        Ok(())
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
