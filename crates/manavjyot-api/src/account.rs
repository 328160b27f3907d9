use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::info;

use manavjyot_db::ProfileUpdate;
use manavjyot_types::api::{
    AccountResponse, ChangePasswordRequest, ForgotPasswordRequest, MessageResponse,
    ResetPasswordRequest, ResetTokenStatus, UpdateProfileRequest,
};
use manavjyot_types::models::Place;

use crate::auth::{AppState, hash_password};
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::reset::{ConsumeOutcome, IssueOutcome, TokenCheck};
use crate::run_blocking;
use crate::validation::Checks;

const INVALID_RESET_TOKEN: &str = "Password reset token is invalid or has expired.";

pub async fn get_account(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> impl IntoResponse {
    Json(AccountResponse { error: false, user })
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Checks::new()
        .email(&req.email, "Please enter a valid email address.")
        .not_empty(&req.name, "Name should not be empty.")
        .finish()?;

    let mut profile = user.profile;
    profile.name = req.name.trim().to_string();
    profile.gender = req.gender;
    profile.address = Place {
        address: req.address,
        city: req.city,
        pin: req.pin,
        state: req.state,
    };

    let db = Arc::clone(&state.db);
    let id = user.id.to_string();
    let email = req.email;
    let outcome = run_blocking(move || db.update_profile(&id, &email, &profile)).await?;

    match outcome {
        ProfileUpdate::Updated => Ok(Json(MessageResponse::ok("Profile information has been updated."))),
        ProfileUpdate::EmailTaken => Err(ApiError::Conflict(
            "The email address you have entered is already associated with an account.".into(),
        )),
        ProfileUpdate::NotFound => Err(ApiError::Unauthorized("Failed to authenticate".into())),
    }
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Checks::new()
        .length(&req.password, 4, usize::MAX, "Password must be at least 4 characters long")
        .equals(&req.confirm_password, &req.password, "Passwords do not match")
        .finish()?;

    let db = Arc::clone(&state.db);
    let id = user.id.to_string();
    let password = req.password;
    let updated = run_blocking(move || {
        let password_hash = hash_password(&password)?;
        db.set_password(&id, &password_hash)
    })
    .await?;

    if !updated {
        return Err(ApiError::Unauthorized("Failed to authenticate".into()));
    }
    info!("Password changed for {}", user.id);
    Ok(Json(MessageResponse::ok("Password has been changed.")))
}

pub async fn delete_account(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let db = Arc::clone(&state.db);
    let id = user.id.to_string();
    run_blocking(move || db.delete_user(&id)).await?;
    info!("Account {} deleted", user.id);
    Ok(Json(MessageResponse::ok("Your account has been deleted.")))
}

// -- Password reset --

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Checks::new()
        .email(&req.email, "Please enter a valid email address.")
        .finish()?;

    match state.reset.issue_token(&req.email).await? {
        IssueOutcome::Issued(_) => Ok(Json(MessageResponse::ok(
            "An e-mail has been sent to your e-mail with further instructions.",
        ))),
        IssueOutcome::UserNotFound => Err(ApiError::NotFound(
            "Account with that email address does not exist.".into(),
        )),
    }
}

pub async fn check_reset_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    match state.reset.validate_token(&token).await? {
        TokenCheck::Valid(_) => Ok(Json(ResetTokenStatus { valid: true })),
        TokenCheck::InvalidOrExpired => Err(ApiError::BadRequest(INVALID_RESET_TOKEN.into())),
    }
}

pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Checks::new()
        .length(&req.password, 4, usize::MAX, "Password must be at least 4 characters long.")
        .equals(&req.confirm, &req.password, "Passwords must match.")
        .finish()?;

    match state.reset.consume_token(&token, &req.password).await? {
        ConsumeOutcome::Reset(_) => Ok(Json(MessageResponse::ok(
            "Success! Your password has been changed.",
        ))),
        ConsumeOutcome::InvalidOrExpired => Err(ApiError::BadRequest(INVALID_RESET_TOKEN.into())),
    }
}
