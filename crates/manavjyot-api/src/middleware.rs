use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::debug;

use manavjyot_types::api::Claims;
use manavjyot_types::models::User;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_blocking;

/// The authenticated caller, loaded fresh from the store for each request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Verify the bearer JWT and attach the account it names as [`CurrentUser`].
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let unauthorized = || ApiError::Unauthorized("Failed to authenticate".into());

    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("No token provided".into()))?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(unauthorized)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        debug!("Rejected token: {}", e);
        unauthorized()
    })?;

    let db = Arc::clone(&state.db);
    let user_id = token_data.claims.sub.to_string();
    let row = run_blocking(move || db.get_user_by_id(&user_id))
        .await?
        .ok_or_else(unauthorized)?;

    req.extensions_mut().insert(CurrentUser(row.to_user()?));
    Ok(next.run(req).await)
}

/// Must run after [`require_auth`].
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    let is_admin = req
        .extensions()
        .get::<CurrentUser>()
        .is_some_and(|CurrentUser(user)| user.profile.is_admin);

    if !is_admin {
        return Err(ApiError::Forbidden("You are not allowed here!".into()));
    }
    Ok(next.run(req).await)
}
