use crate::application_port::SessionConfig;
use anyhow::{Result, anyhow};
use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub auth: Auth,
    pub users: Backend,
    pub refresh_tokens: Backend,
    pub mysql: Option<MySql>,
    pub redis: Option<Redis>,
    pub http: Http,
    #[serde(default)]
    pub cookie: Cookie,
    pub log: Log,
}

#[derive(Deserialize)]
pub struct Auth {
    pub signing_secret: String,
    #[serde(default = "default_access_ttl_secs")]
    pub access_ttl_secs: u64,
    #[serde(default = "default_refresh_ttl_secs")]
    pub refresh_ttl_secs: u64,
    #[serde(default = "default_min_password_len")]
    pub min_password_len: usize,
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auth")
            .field("signing_secret", &"<redacted>")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("min_password_len", &self.min_password_len)
            .finish()
    }
}

impl Auth {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            access_ttl: Duration::from_secs(self.access_ttl_secs),
            refresh_ttl: Duration::from_secs(self.refresh_ttl_secs),
            min_password_len: self.min_password_len,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Backend {
    pub backend: String, // "memory", "mysql" or (refresh tokens only) "redis"
}

#[derive(Deserialize)]
pub struct MySql {
    pub url: String,
}

impl fmt::Debug for MySql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The url usually carries a password.
        f.debug_struct("MySql").field("url", &"<redacted>").finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct Redis {
    pub url: String,
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Cookie {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cookie_name")]
    pub name: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    pub domain: Option<String>,
    #[serde(default)]
    pub secure: bool,
}

impl Default for Cookie {
    fn default() -> Self {
        Cookie {
            enabled: true,
            name: default_cookie_name(),
            path: default_cookie_path(),
            domain: None,
            secure: false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

fn default_access_ttl_secs() -> u64 {
    15 * 60
}

fn default_refresh_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_min_password_len() -> usize {
    8
}

fn default_redis_prefix() -> String {
    "authcore:refresh".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_cookie_name() -> String {
    "refresh_token".to_string()
}

fn default_cookie_path() -> String {
    "/api/v1/auth".to_string()
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

const ENV_PREFIX: &str = "AUTHCORE";

/// Ten years.
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);
    let builder = Config::builder().add_source(File::with_name(path));
    build_settings(builder)
}

fn build_settings(builder: ConfigBuilder<DefaultState>) -> Result<Settings> {
    let settings: Settings = builder
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    settings.validate()?;
    Ok(settings)
}

impl Settings {
    fn validate(&self) -> Result<()> {
        if self.auth.signing_secret.is_empty() {
            return Err(anyhow!("auth.signing_secret must not be empty"));
        }
        if self.auth.access_ttl_secs == 0 || self.auth.refresh_ttl_secs == 0 {
            return Err(anyhow!("token lifetimes must be positive"));
        }
        if self.auth.access_ttl_secs > MAX_TTL_SECS || self.auth.refresh_ttl_secs > MAX_TTL_SECS {
            return Err(anyhow!(
                "token lifetimes must not exceed {} seconds",
                MAX_TTL_SECS
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    const MINIMAL: &str = r#"
[auth]
signing_secret = "dev-secret"

[users]
backend = "memory"

[refresh_tokens]
backend = "memory"

[http]
address = "127.0.0.1:8080"

[log]
filter = "info"
"#;

    fn parse_str(toml: &str) -> Result<Settings> {
        build_settings(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
    }

    #[test]
    fn test_defaults() {
        let settings = parse_str(MINIMAL).expect("Failed to parse settings");

        let session = settings.auth.session_config();
        assert_eq!(session.access_ttl, Duration::from_secs(900));
        assert_eq!(session.refresh_ttl, Duration::from_secs(604800));
        assert_eq!(session.min_password_len, 8);
        assert_eq!(settings.http.request_timeout_secs, 10);
        assert!(settings.cookie.enabled);
        assert_eq!(settings.cookie.path, "/api/v1/auth");
        assert!(settings.mysql.is_none());
    }

    #[test]
    fn test_missing_secret_is_an_error() {
        let toml = MINIMAL.replace("signing_secret = \"dev-secret\"", "");
        assert!(parse_str(&toml).is_err());
    }

    #[test]
    fn test_empty_secret_is_an_error() {
        let toml = MINIMAL.replace("\"dev-secret\"", "\"\"");
        assert!(parse_str(&toml).is_err());
    }

    #[test]
    fn test_ttl_bounds() {
        let zero = MINIMAL.replace(
            "signing_secret = \"dev-secret\"",
            "signing_secret = \"dev-secret\"\naccess_ttl_secs = 0",
        );
        assert!(parse_str(&zero).is_err());

        let huge = MINIMAL.replace(
            "signing_secret = \"dev-secret\"",
            "signing_secret = \"dev-secret\"\nrefresh_ttl_secs = 10000000000000",
        );
        assert!(parse_str(&huge).is_err());

        let max = MINIMAL.replace(
            "signing_secret = \"dev-secret\"",
            &format!("signing_secret = \"dev-secret\"\nrefresh_ttl_secs = {}", MAX_TTL_SECS),
        );
        assert!(parse_str(&max).is_ok());
    }

    #[test]
    fn test_secret_is_not_printed() {
        let settings = parse_str(MINIMAL).unwrap();
        assert!(!format!("{:?}", settings).contains("dev-secret"));
    }
}
