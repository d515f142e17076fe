use crate::{
    auth::{JwtService, JwtServiceImpl, LoginService, OAuth2Gateway, auth_middleware, parse_algorithm},
    config::Config,
    error::AppError,
    metrics::{LoginMetrics, init_metrics},
    routes::{create_auth_routes, create_health_routes, create_user_api_routes},
    users::{MemoryUserDirectory, UserDirectory},
};
use axum::{Router, middleware, routing::get};
use metrics_exporter_prometheus::PrometheusHandle;
use std::{net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, signal};
use tracing::info;

use crate::auth::IdentityProvider;

#[derive(Clone)]
pub struct Server {
    pub config: Arc<Config>,
    pub login_service: Arc<LoginService>,
    pub users: Arc<dyn UserDirectory>,
    pub metrics: Arc<LoginMetrics>,
    prometheus: Option<PrometheusHandle>,
}

impl Server {
    pub async fn new(config: Config) -> Result<Self, AppError> {
        let prometheus = if config.metrics.enabled {
            let handle = init_metrics()
                .map_err(|e| AppError::Internal(format!("Failed to install metrics recorder: {}", e)))?;
            Some(handle)
        } else {
            None
        };

        let algorithm = parse_algorithm(&config.jwt.algorithm)?;
        let jwt: Arc<dyn JwtService> = Arc::new(JwtServiceImpl::new(
            &config.jwt.secret,
            algorithm,
            config.jwt.token_ttl_days * 24 * 60 * 60,
        )?);

        let provider: Arc<dyn IdentityProvider> = Arc::new(OAuth2Gateway::new(&config.oauth)?);
        let users: Arc<dyn UserDirectory> = Arc::new(MemoryUserDirectory::new());

        Ok(Self::from_parts(config, provider, users, jwt, prometheus))
    }

    /// Assemble a server from explicit collaborators. Used by `new` and by
    /// tests substituting deterministic doubles.
    pub fn from_parts(
        config: Config,
        provider: Arc<dyn IdentityProvider>,
        users: Arc<dyn UserDirectory>,
        jwt: Arc<dyn JwtService>,
        prometheus: Option<PrometheusHandle>,
    ) -> Self {
        info!(algorithm = ?jwt.algorithm(), "session token service ready");

        let metrics = Arc::new(LoginMetrics::new());
        let login_service = Arc::new(LoginService::new(
            provider,
            users.clone(),
            jwt,
            metrics.clone(),
            &config.state,
        ));

        Self {
            config: Arc::new(config),
            login_service,
            users,
            metrics,
            prometheus,
        }
    }

    pub async fn run(&self) -> Result<(), AppError> {
        let app = self.create_app();

        let addr: SocketAddr = format!("{}:{}", self.config.server.host, self.config.server.port)
            .parse()
            .map_err(|e| AppError::Internal(format!("Invalid listen address: {}", e)))?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to bind to address: {}", e)))?;

        info!("Server listening on http://{}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

        // The sweeper outlives the listener; stop it before reporting a
        // clean exit.
        self.login_service.shutdown().await;
        info!("Server shutdown complete");

        Ok(())
    }

    pub fn create_app(&self) -> Router {
        let mut app = Router::new()
            .nest("/auth", create_auth_routes())
            .nest("/api", self.user_api_routes())
            .nest("/health", create_health_routes());

        if let Some(handle) = &self.prometheus {
            let handle = handle.clone();
            app = app.route("/metrics", get(move || async move { handle.render() }));
        }

        app.with_state(self.clone())
    }

    fn user_api_routes(&self) -> Router<Server> {
        create_user_api_routes().layer(middleware::from_fn_with_state(
            self.clone(),
            auth_middleware,
        ))
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestServerBuilder;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_check_without_token() {
        let server = TestServerBuilder::new().build();
        let app = server.create_app();

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_user_api_requires_token() {
        let server = TestServerBuilder::new().build();
        let app = server.create_app();

        let request = Request::builder()
            .uri("/api/users/me")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_prometheus_route_absent_when_disabled() {
        let server = TestServerBuilder::new().build();
        let app = server.create_app();

        let request = Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
