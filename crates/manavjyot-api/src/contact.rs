use axum::{Json, extract::State, response::IntoResponse};
use tracing::info;

use manavjyot_mail::templates;
use manavjyot_types::api::{ContactRequest, MessageResponse};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::validation::Checks;

/// Unlike account notifications, delivery is the whole point here, so a
/// failed send fails the request.
pub async fn contact(
    State(state): State<AppState>,
    Json(req): Json<ContactRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Checks::new()
        .not_empty(&req.name, "Name cannot be blank")
        .email(&req.email, "Email is not valid")
        .not_empty(&req.message, "Message cannot be blank")
        .finish()?;

    let mail = templates::contact(&state.site_email, req.name.trim(), req.email.trim(), &req.message);
    state.mailer.send(&mail).await?;
    info!("Contact message from {} forwarded", req.email.trim());

    Ok(Json(MessageResponse::ok(
        "Your message has been sent. We will reach to you soon!",
    )))
}
