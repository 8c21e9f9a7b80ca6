use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid value for environment variable {var}: {reason}")]
    InvalidEnvValue { var: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl std::str::FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Self::Development),
            "staging" | "stage" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ConfigError::InvalidEnvValue {
                var: "APP_ENV".into(),
                reason: format!("unknown environment `{other}`"),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub enum DatabaseConfig {
    Url(String),
    Parts {
        host: String,
        port: u16,
        user: String,
        password: String,
        name: String,
    },
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub public_base_url: String,
    pub upload_ttl_secs: u64,
}

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub credentials_path: String,
    pub project_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub identity: IdentityConfig,
    pub frontend_url: Option<String>,
    /// Email domain -> institution name. Empty allows every domain.
    pub allowed_email_domains: BTreeMap<String, String>,
    pub max_active_listings: i64,
    pub seed: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let env = optional("APP_ENV")
            .map(|v| v.parse())
            .transpose()?
            .unwrap_or(Environment::Development);

        let database = match optional("DATABASE_URL") {
            Some(url) => DatabaseConfig::Url(url),
            None => DatabaseConfig::Parts {
                host: required("DB_HOST")?,
                port: parsed("DB_PORT", 5432)?,
                user: required("DB_USER")?,
                password: optional("DB_PASSWORD").unwrap_or_default(),
                name: required("DB_NAME")?,
            },
        };

        let bucket = required("STORAGE_BUCKET")?;
        let region = optional("STORAGE_REGION").unwrap_or_else(|| "us-east-1".into());
        let endpoint = optional("STORAGE_ENDPOINT");
        let public_base_url = optional("STORAGE_PUBLIC_URL")
            .unwrap_or_else(|| default_public_base_url(&bucket, endpoint.as_deref()));
        let storage = StorageConfig {
            bucket,
            region,
            endpoint,
            access_key: optional("STORAGE_ACCESS_KEY"),
            secret_key: optional("STORAGE_SECRET_KEY"),
            public_base_url,
            upload_ttl_secs: parsed("UPLOAD_URL_TTL_SECS", 15 * 60)?,
        };

        let identity = IdentityConfig {
            credentials_path: required("CREDENTIALS_PATH")?,
            project_id: optional("PROJECT_ID"),
        };

        Ok(Self {
            env,
            database,
            storage,
            identity,
            frontend_url: optional("FRONTEND_URL"),
            allowed_email_domains: parse_email_domains(
                &optional("ALLOWED_EMAIL_DOMAINS").unwrap_or_default(),
            )?,
            max_active_listings: parsed("MAX_ACTIVE_LISTINGS", 10)?,
            seed: parsed("SEED", false)?,
        })
    }
}

fn optional(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn required(var: &str) -> Result<String, ConfigError> {
    optional(var).ok_or_else(|| ConfigError::MissingEnvVar(var.into()))
}

fn parsed<T>(var: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match optional(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidEnvValue {
            var: var.into(),
            reason: e.to_string(),
        }),
    }
}

fn default_public_base_url(bucket: &str, endpoint: Option<&str>) -> String {
    match endpoint {
        Some(ep) => format!("{}/{}", ep.trim_end_matches('/'), bucket),
        None => format!("https://{bucket}.s3.amazonaws.com"),
    }
}

/// Parses `domain=Institution;other.domain=Other` pairs.
pub fn parse_email_domains(raw: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut out = BTreeMap::new();
    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (domain, name) = entry.split_once('=').ok_or_else(|| ConfigError::InvalidEnvValue {
            var: "ALLOWED_EMAIL_DOMAINS".into(),
            reason: format!("expected `domain=name`, got `{entry}`"),
        })?;
        out.insert(domain.trim().to_ascii_lowercase(), name.trim().to_string());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_environment_aliases() {
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("Development".parse::<Environment>().unwrap(), Environment::Development);
        assert!("qa".parse::<Environment>().is_err());
        assert!(Environment::Production.is_production());
        assert!(!Environment::Staging.is_production());
    }

    #[test]
    fn parses_domain_pairs() {
        let map = parse_email_domains("usp.br=Universidade de Sao Paulo; Estudante.UFSCar.br = UFSCar").unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["usp.br"], "Universidade de Sao Paulo");
        assert_eq!(map["estudante.ufscar.br"], "UFSCar");
        assert!(parse_email_domains("").unwrap().is_empty());
        assert!(parse_email_domains("usp.br").is_err());
    }

    #[test]
    fn public_url_follows_endpoint() {
        assert_eq!(
            default_public_base_url("uploads", None),
            "https://uploads.s3.amazonaws.com"
        );
        assert_eq!(
            default_public_base_url("uploads", Some("http://minio:9000/")),
            "http://minio:9000/uploads"
        );
    }
}
