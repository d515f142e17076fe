use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    pub oauth: OAuthProviderConfig,
    pub state: StateConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub algorithm: String,
    /// Session token lifetime. Long-lived by design, the token is the only
    /// server-side-stateless credential a browser holds.
    pub token_ttl_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub authorization_url: String,
    pub token_url: String,
    pub user_info_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Anti-forgery state token lifetime in seconds.
    pub ttl_seconds: i64,
    /// Period of the background sweep that reclaims expired states.
    pub sweep_interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            jwt: JwtConfig {
                secret: "your-jwt-secret".to_string(),
                algorithm: "HS256".to_string(),
                token_ttl_days: 90,
            },
            oauth: OAuthProviderConfig {
                client_id: String::new(),
                client_secret: String::new(),
                redirect_uri: "http://localhost:3000/auth/google/callback".to_string(),
                scopes: vec![
                    "openid".to_string(),
                    "email".to_string(),
                    "profile".to_string(),
                ],
                authorization_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
                token_url: "https://oauth2.googleapis.com/token".to_string(),
                user_info_url: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
            },
            state: StateConfig {
                ttl_seconds: 180,
                sweep_interval_seconds: 30,
            },
            metrics: MetricsConfig { enabled: false },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder =
            ConfigBuilder::builder().add_source(config::Config::try_from(&Config::default())?);

        if Path::new("config.yaml").exists() {
            builder = builder.add_source(File::with_name("config"));
        }

        builder = builder.add_source(
            Environment::with_prefix("SSO")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut builder =
            ConfigBuilder::builder().add_source(config::Config::try_from(&Config::default())?);

        if path.as_ref().exists() {
            builder = builder.add_source(File::from(path.as_ref()));
        }

        builder = builder.add_source(
            Environment::with_prefix("SSO")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.jwt.algorithm, "HS256");
        assert_eq!(config.jwt.token_ttl_days, 90);
        assert_eq!(config.state.ttl_seconds, 180);
        assert_eq!(config.state.sweep_interval_seconds, 30);
        assert_eq!(config.oauth.scopes, vec!["openid", "email", "profile"]);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_load_from_yaml_file() {
        let yaml_content = r#"
server:
  host: "127.0.0.1"
  port: 4000
jwt:
  secret: "file-secret"
  token_ttl_days: 7
oauth:
  client_id: "cid"
  client_secret: "cs"
state:
  ttl_seconds: 300
logging:
  level: "warn"
"#;

        let mut temp_file = NamedTempFile::with_suffix(".yaml").unwrap();
        temp_file.write_all(yaml_content.as_bytes()).unwrap();

        let config = Config::load_from_file(temp_file.path()).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.jwt.secret, "file-secret");
        assert_eq!(config.jwt.token_ttl_days, 7);
        assert_eq!(config.oauth.client_id, "cid");
        assert_eq!(config.state.ttl_seconds, 300);
        // Values absent from the file keep their defaults.
        assert_eq!(config.state.sweep_interval_seconds, 30);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_config_env_override() {
        // Tests run in parallel; only override fields no other test asserts.
        std::env::set_var("SSO_OAUTH__REDIRECT_URI", "https://env.example.com/cb");
        std::env::set_var("SSO_METRICS__ENABLED", "true");

        let config = Config::load().unwrap();
        assert_eq!(config.oauth.redirect_uri, "https://env.example.com/cb");
        assert!(config.metrics.enabled);

        std::env::remove_var("SSO_OAUTH__REDIRECT_URI");
        std::env::remove_var("SSO_METRICS__ENABLED");
    }

    #[test]
    fn test_config_load_nonexistent_file() {
        let config = Config::load_from_file("nonexistent.yaml").unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
    }
}
