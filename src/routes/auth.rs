use crate::{error::AppError, server::Server};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Redirect},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

/// Deadline for the whole callback exchange: provider round trips plus
/// persistence.
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(5);

pub fn create_auth_routes() -> Router<Server> {
    Router::new()
        .route("/google/login", get(login_redirect))
        .route("/google/callback", get(login_callback))
}

async fn login_redirect(State(server): State<Server>) -> Redirect {
    Redirect::temporary(&server.login_service.begin_login())
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    state: String,
    code: String,
}

#[derive(Debug, Serialize)]
struct TokenBody {
    token: String,
}

async fn login_callback(
    State(server): State<Server>,
    Query(params): Query<CallbackParams>,
) -> Result<impl IntoResponse, AppError> {
    let token = match timeout(
        CALLBACK_TIMEOUT,
        server.login_service.complete_login(&params.state, &params.code),
    )
    .await
    {
        Ok(result) => result?,
        Err(_) => {
            // The orchestrator future was dropped before it could count the
            // failure itself.
            warn!("login callback exceeded its deadline");
            server.metrics.record_login_failure();
            return Err(AppError::Provider(
                "Login did not complete within the deadline".to_string(),
            ));
        }
    };

    let max_age = server.config.jwt.token_ttl_days * 24 * 60 * 60;
    let cookie = format!("token={}; HttpOnly; Path=/; Max-Age={}", token, max_age);

    Ok(([(header::SET_COOKIE, cookie)], Json(TokenBody { token })))
}
