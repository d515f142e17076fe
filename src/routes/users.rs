use crate::{auth::CurrentUser, error::AppError, server::Server};
use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

pub fn create_user_api_routes() -> Router<Server> {
    Router::new().route("/users/me", get(get_me))
}

#[derive(Debug, Serialize)]
struct GetUserResponse {
    id: String,
    fullname: String,
    email: String,
    picture: String,
}

async fn get_me(
    State(server): State<Server>,
    CurrentUser(subject): CurrentUser,
) -> Result<Json<GetUserResponse>, AppError> {
    let user = server.users.get_by_id(&subject).await?;

    Ok(Json(GetUserResponse {
        id: user.id,
        fullname: user.full_name,
        email: user.email,
        picture: user.avatar_url,
    }))
}
