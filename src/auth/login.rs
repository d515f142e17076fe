use crate::{
    auth::{
        jwt::JwtService,
        provider::IdentityProvider,
        state::{StateStore, spawn_sweeper},
    },
    config::StateConfig,
    error::AppError,
    metrics::LoginMetrics,
    users::{User, UserDirectory},
};
use std::sync::Arc;
use tokio::{sync::watch, task::JoinHandle, time::Duration};
use tracing::{debug, error};

/// Orchestrates the two-phase login protocol: `begin_login` hands out a
/// provider redirect URL carrying a fresh anti-forgery state, and
/// `complete_login` turns the provider callback into a signed session token.
///
/// Owns the pending-state store and the background task reclaiming expired
/// entries; [`LoginService::shutdown`] cancels that task and awaits its exit.
pub struct LoginService {
    provider: Arc<dyn IdentityProvider>,
    users: Arc<dyn UserDirectory>,
    jwt: Arc<dyn JwtService>,
    states: Arc<StateStore>,
    metrics: Arc<LoginMetrics>,
    shutdown_tx: watch::Sender<bool>,
    sweeper: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl LoginService {
    /// Construct the service and start its reclamation loop. Must run inside
    /// a tokio runtime.
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        users: Arc<dyn UserDirectory>,
        jwt: Arc<dyn JwtService>,
        metrics: Arc<LoginMetrics>,
        state_config: &StateConfig,
    ) -> Self {
        let states = Arc::new(StateStore::new(state_config.ttl_seconds, metrics.clone()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sweeper = spawn_sweeper(
            states.clone(),
            Duration::from_secs(state_config.sweep_interval_seconds),
            shutdown_rx,
        );

        Self {
            provider,
            users,
            jwt,
            states,
            metrics,
            shutdown_tx,
            sweeper: tokio::sync::Mutex::new(Some(sweeper)),
        }
    }

    /// Begin phase: issue a pending state and return the provider
    /// authorization URL to redirect the user to. No provider I/O happens
    /// here.
    pub fn begin_login(&self) -> String {
        let state = self.states.issue();
        self.provider.authorize_url(&state)
    }

    /// Complete phase: consume the state, exchange the authorization code,
    /// sign a session token and persist the identity. Any failure increments
    /// the failed-login counter exactly once and leaves no pending state
    /// behind; the caller must restart from `begin_login`.
    pub async fn complete_login(&self, state: &str, code: &str) -> Result<String, AppError> {
        if !self.states.try_consume(state) {
            debug!("callback presented an invalid state token");
            self.metrics.record_login_failure();
            return Err(AppError::InvalidState);
        }

        let identity = match self.provider.exchange_code(code).await {
            Ok(identity) => identity,
            Err(e) => {
                error!(error = %e, "identity provider exchange failed");
                self.metrics.record_login_failure();
                return Err(e);
            }
        };

        let token = match self.jwt.generate(&identity.id) {
            Ok(token) => token,
            Err(e) => {
                error!(error = %e, "session token signing failed");
                self.metrics.record_login_failure();
                return Err(e);
            }
        };

        // A duplicate insert aborts the login even though the identity is
        // valid; see DESIGN.md for why this is kept.
        if let Err(e) = self
            .users
            .add(User::new(
                identity.id,
                identity.full_name,
                identity.email,
                identity.avatar_url,
            ))
            .await
        {
            error!(error = %e, "user persistence failed");
            self.metrics.record_login_failure();
            return Err(e);
        }

        debug!("login completed");
        self.metrics.record_login_success();
        Ok(token)
    }

    /// Verify a session token and return its subject id.
    pub fn validate(&self, token: &str) -> Result<String, AppError> {
        self.jwt.validate(token)
    }

    pub fn metrics(&self) -> &LoginMetrics {
        &self.metrics
    }

    /// Number of currently pending states. Observability only.
    pub fn pending_states(&self) -> usize {
        self.states.len()
    }

    /// Stop the reclamation loop and wait for it to exit. Idempotent.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.sweeper.lock().await.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "state sweeper failed during shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        BrokenJwtService, StubIdentityProvider, test_jwt_service, test_state_config,
    };
    use crate::users::MemoryUserDirectory;

    fn test_service_with(provider: StubIdentityProvider) -> LoginService {
        LoginService::new(
            Arc::new(provider),
            Arc::new(MemoryUserDirectory::new()),
            test_jwt_service(),
            Arc::new(LoginMetrics::new()),
            &test_state_config(),
        )
    }

    fn state_from_url(url: &str) -> String {
        url.split("state=")
            .nth(1)
            .unwrap()
            .split('&')
            .next()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_begin_login_embeds_fresh_state() {
        let service = test_service_with(StubIdentityProvider::default());

        let url = service.begin_login();
        assert!(url.contains("state="));
        assert_eq!(service.pending_states(), 1);
        assert_eq!(service.metrics().snapshot().states_issued, 1);

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_complete_login_success() {
        let service = test_service_with(StubIdentityProvider::default());
        let state = state_from_url(&service.begin_login());

        let token = service.complete_login(&state, "auth-code").await.unwrap();
        assert!(!token.is_empty());
        assert_eq!(service.validate(&token).unwrap(), "u1");

        let snapshot = service.metrics().snapshot();
        assert_eq!(snapshot.logins_succeeded, 1);
        assert_eq!(snapshot.logins_failed, 0);
        assert_eq!(service.pending_states(), 0);

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_complete_login_unknown_state() {
        let service = test_service_with(StubIdentityProvider::default());

        let err = service
            .complete_login("never-issued", "auth-code")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState));

        let snapshot = service.metrics().snapshot();
        assert_eq!(snapshot.logins_succeeded, 0);
        assert_eq!(snapshot.logins_failed, 1);

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_state_is_single_use() {
        let service = test_service_with(StubIdentityProvider::default());
        let state = state_from_url(&service.begin_login());

        service.complete_login(&state, "auth-code").await.unwrap();
        // Reusing the consumed state must fail, even though the user exists.
        let err = service.complete_login(&state, "auth-code").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState));

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_provider_failure_counts_once() {
        let service = test_service_with(StubIdentityProvider::failing());
        let state = state_from_url(&service.begin_login());

        let err = service.complete_login(&state, "auth-code").await.unwrap_err();
        assert!(matches!(err, AppError::Provider(_)));

        let snapshot = service.metrics().snapshot();
        assert_eq!(snapshot.logins_failed, 1);
        // The state was still consumed and is not re-inserted.
        assert_eq!(service.pending_states(), 0);

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_signing_failure_is_fatal_to_the_call() {
        let service = LoginService::new(
            Arc::new(StubIdentityProvider::default()),
            Arc::new(MemoryUserDirectory::new()),
            Arc::new(BrokenJwtService),
            Arc::new(LoginMetrics::new()),
            &test_state_config(),
        );
        let state = state_from_url(&service.begin_login());

        let err = service.complete_login(&state, "auth-code").await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(service.metrics().snapshot().logins_failed, 1);

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplicate_identity_aborts_login() {
        let directory = Arc::new(MemoryUserDirectory::new());
        directory
            .add(crate::users::User::new(
                "u1".to_string(),
                String::new(),
                String::new(),
                String::new(),
            ))
            .await
            .unwrap();

        let service = LoginService::new(
            Arc::new(StubIdentityProvider::default()),
            directory,
            test_jwt_service(),
            Arc::new(LoginMetrics::new()),
            &test_state_config(),
        );
        let state = state_from_url(&service.begin_login());

        let err = service.complete_login(&state, "auth-code").await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateUser(_)));

        let snapshot = service.metrics().snapshot();
        assert_eq!(snapshot.logins_succeeded, 0);
        assert_eq!(snapshot.logins_failed, 1);

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let service = test_service_with(StubIdentityProvider::default());
        service.shutdown().await;
        service.shutdown().await;
    }
}
