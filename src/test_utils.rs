//! Deterministic collaborator doubles shared by unit and integration tests.

use crate::{
    auth::{IdentityProvider, JwtService, JwtServiceImpl, RemoteIdentity, parse_algorithm},
    config::{Config, StateConfig},
    error::AppError,
    server::Server,
    users::{MemoryUserDirectory, UserDirectory},
};
use async_trait::async_trait;
use jsonwebtoken::Algorithm;
use std::sync::Arc;
use tokio::time::Duration;

pub fn test_jwt_service() -> Arc<dyn JwtService> {
    Arc::new(JwtServiceImpl::new("test-secret", Algorithm::HS256, 3600).unwrap())
}

pub fn test_state_config() -> StateConfig {
    StateConfig {
        ttl_seconds: 180,
        sweep_interval_seconds: 30,
    }
}

pub fn test_identity() -> RemoteIdentity {
    RemoteIdentity {
        id: "u1".to_string(),
        full_name: "Test User".to_string(),
        email: "test@example.com".to_string(),
        avatar_url: "https://example.com/p.png".to_string(),
    }
}

/// Identity provider double: never touches the network.
pub struct StubIdentityProvider {
    pub identity: RemoteIdentity,
    pub fail_exchange: bool,
}

impl StubIdentityProvider {
    pub fn with_identity(identity: RemoteIdentity) -> Self {
        Self {
            identity,
            fail_exchange: false,
        }
    }

    /// A provider whose code exchange always fails.
    pub fn failing() -> Self {
        Self {
            identity: test_identity(),
            fail_exchange: true,
        }
    }
}

impl Default for StubIdentityProvider {
    fn default() -> Self {
        Self::with_identity(test_identity())
    }
}

#[async_trait]
impl IdentityProvider for StubIdentityProvider {
    fn authorize_url(&self, state: &str) -> String {
        format!(
            "https://accounts.example.com/o/oauth2/auth?client_id=stub&state={}",
            state
        )
    }

    async fn exchange_code(&self, _code: &str) -> Result<RemoteIdentity, AppError> {
        if self.fail_exchange {
            return Err(AppError::Provider("stub exchange failure".to_string()));
        }
        Ok(self.identity.clone())
    }
}

/// Identity provider double whose code exchange outlasts any deadline a
/// caller would impose.
pub struct SlowIdentityProvider {
    pub delay: Duration,
}

#[async_trait]
impl IdentityProvider for SlowIdentityProvider {
    fn authorize_url(&self, state: &str) -> String {
        format!(
            "https://accounts.example.com/o/oauth2/auth?client_id=stub&state={}",
            state
        )
    }

    async fn exchange_code(&self, _code: &str) -> Result<RemoteIdentity, AppError> {
        tokio::time::sleep(self.delay).await;
        Ok(test_identity())
    }
}

/// Token service double whose signing always fails.
pub struct BrokenJwtService;

impl JwtService for BrokenJwtService {
    fn generate(&self, _subject: &str) -> Result<String, AppError> {
        Err(AppError::Internal("stub signing failure".to_string()))
    }

    fn validate(&self, _token: &str) -> Result<String, AppError> {
        Err(AppError::Unauthorized("stub validation failure".to_string()))
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::HS256
    }
}

pub struct TestServerBuilder {
    config: Config,
    provider: Arc<dyn IdentityProvider>,
    users: Arc<dyn UserDirectory>,
}

impl TestServerBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            provider: Arc::new(StubIdentityProvider::default()),
            users: Arc::new(MemoryUserDirectory::new()),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_users(mut self, users: Arc<dyn UserDirectory>) -> Self {
        self.users = users;
        self
    }

    /// Build a server around the configured doubles. Must run inside a tokio
    /// runtime, since construction starts the state sweeper.
    pub fn build(self) -> Server {
        let algorithm = parse_algorithm(&self.config.jwt.algorithm).unwrap();
        let jwt: Arc<dyn JwtService> = Arc::new(
            JwtServiceImpl::new(
                &self.config.jwt.secret,
                algorithm,
                self.config.jwt.token_ttl_days * 24 * 60 * 60,
            )
            .unwrap(),
        );

        Server::from_parts(self.config, self.provider, self.users, jwt, None)
    }
}

impl Default for TestServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
