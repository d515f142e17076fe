use crate::{config::OAuthProviderConfig, error::AppError};
use async_trait::async_trait;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    RedirectUrl, Scope, TokenResponse, TokenUrl, basic::BasicClient,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::error;

// Avoid oauth2 type madness
type OAuthClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Upper bound on any single round trip to the provider.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(5);

/// Verified identity returned by the provider's userinfo endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteIdentity {
    pub id: String,
    #[serde(rename = "name", default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "picture", default)]
    pub avatar_url: String,
}

/// Gateway to the third-party OAuth2 identity provider. The login core only
/// ever sees this interface; all wire-protocol detail stays behind it.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Provider authorization URL embedding the anti-forgery state. Pure URL
    /// construction, no network I/O.
    fn authorize_url(&self, state: &str) -> String;

    /// Exchange an authorization code for the verified remote identity.
    async fn exchange_code(&self, code: &str) -> Result<RemoteIdentity, AppError>;
}

pub struct OAuth2Gateway {
    client: OAuthClient,
    scopes: Vec<String>,
    user_info_url: String,
    http_client: reqwest::Client,
}

impl OAuth2Gateway {
    pub fn new(config: &OAuthProviderConfig) -> Result<Self, AppError> {
        let auth_url = AuthUrl::new(config.authorization_url.clone())
            .map_err(|e| AppError::Config(config::ConfigError::Message(format!(
                "Invalid authorization URL: {}",
                e
            ))))?;
        let token_url = TokenUrl::new(config.token_url.clone())
            .map_err(|e| AppError::Config(config::ConfigError::Message(format!(
                "Invalid token URL: {}",
                e
            ))))?;
        let redirect_url = RedirectUrl::new(config.redirect_uri.clone())
            .map_err(|e| AppError::Config(config::ConfigError::Message(format!(
                "Invalid redirect URI: {}",
                e
            ))))?;

        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(config.client_secret.clone()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url);

        let http_client = reqwest::ClientBuilder::new()
            // Following redirects would open up SSRF against the exchange.
            .redirect(reqwest::redirect::Policy::none())
            .timeout(PROVIDER_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            scopes: config.scopes.clone(),
            user_info_url: config.user_info_url.clone(),
            http_client,
        })
    }
}

#[async_trait]
impl IdentityProvider for OAuth2Gateway {
    fn authorize_url(&self, state: &str) -> String {
        let state = state.to_string();
        let (url, _csrf_token) = self
            .client
            .authorize_url(move || CsrfToken::new(state))
            .add_scopes(self.scopes.iter().cloned().map(Scope::new))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();

        url.to_string()
    }

    async fn exchange_code(&self, code: &str) -> Result<RemoteIdentity, AppError> {
        let token = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| {
                error!(error = %e, "authorization code exchange failed");
                AppError::Provider(format!("Code exchange failed: {}", e))
            })?;

        let response = self
            .http_client
            .get(&self.user_info_url)
            .bearer_auth(token.access_token().secret())
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "userinfo request failed");
                AppError::Provider(format!("Failed to fetch user info: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(AppError::Provider(format!(
                "User info request failed with status: {}",
                response.status()
            )));
        }

        response
            .json::<RemoteIdentity>()
            .await
            .map_err(|e| AppError::Provider(format!("Failed to decode user info: {}", e)))
    }
}
