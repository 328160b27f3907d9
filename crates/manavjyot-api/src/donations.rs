use std::sync::Arc;

use axum::{Extension, Json, extract::State, response::IntoResponse};
use tracing::{error, info};
use uuid::Uuid;

use manavjyot_types::api::{DonateRequest, MessageResponse};
use manavjyot_types::models::Donation;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::payments::{Charge, ChargeOutcome};
use crate::run_blocking;
use crate::validation::Checks;

pub async fn donate(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<DonateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Checks::new()
        .not_empty(&req.stripe_token, "Token not provided")
        .check(req.amount > 0, "Enter valid amount")
        .not_empty(&req.card_holder_name, "Card holder's name should not be empty")
        .finish()?;

    let gateway = state
        .payments
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("Donations are not accepted right now.".into()))?;

    let charge = Charge {
        amount: req.amount,
        source: req.stripe_token,
        description: format!("Donation from {}({})", req.card_holder_name.trim(), user.email),
    };

    if let ChargeOutcome::Declined(_) = gateway.charge(&charge).await? {
        return Err(ApiError::PaymentDeclined("Your card has been declined.".into()));
    }

    let donation = Donation {
        id: Uuid::new_v4(),
        donor_id: user.id,
        amount: req.amount,
        donated_at: state.clock.utc(),
    };
    let db = Arc::clone(&state.db);
    let record = donation.clone();
    // The money has moved at this point, so a failed write is logged for
    // reconciliation rather than reported as a failed donation.
    match run_blocking(move || db.insert_donation(&record)).await {
        Ok(()) => info!("Recorded donation {} of {} from {}", donation.id, donation.amount, user.id),
        Err(e) => error!(
            "Charged donation of {} from {} but failed to record it: {:#}",
            donation.amount, user.id, e
        ),
    }

    Ok(Json(MessageResponse::ok(format!(
        "You have successfully donated {}. Thank you.",
        req.amount
    ))))
}

pub async fn list_donations(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let db = Arc::clone(&state.db);
    let donor = user.id.to_string();
    let donations = run_blocking(move || db.get_donations_by_donor(&donor)).await?;
    Ok(Json(donations))
}
