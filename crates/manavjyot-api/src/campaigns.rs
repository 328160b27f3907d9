use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use manavjyot_db::{Mutation, UpdateOutcome};
use manavjyot_types::api::{
    CampaignListResponse, CampaignRequest, CampaignResponse, MessageResponse,
    RegisterCampaignRequest, RegistrationResponse,
};
use manavjyot_types::models::{Campaign, Place};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::registration::{self, RegistrationOutcome};
use crate::run_blocking;
use crate::validation::Checks;

pub async fn list_campaigns(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let db = Arc::clone(&state.db);
    let campaigns = run_blocking(move || db.list_campaigns()).await?;
    Ok(Json(CampaignListResponse {
        error: false,
        campaigns,
    }))
}

pub async fn get_campaign(
    State(state): State<AppState>,
    Path(campaign_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let db = Arc::clone(&state.db);
    let record = run_blocking(move || db.get_campaign(&campaign_id))
        .await?
        .ok_or_else(campaign_not_found)?;

    Ok(Json(CampaignResponse {
        error: false,
        campaign: record.campaign,
    }))
}

pub async fn create_campaign(
    State(state): State<AppState>,
    Json(req): Json<CampaignRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_campaign(&req)?;

    let now = state.clock.utc();
    let campaign = Campaign {
        id: Uuid::new_v4(),
        title: req.title.trim().to_string(),
        description: req.description.trim().to_string(),
        event_date: req.event_date,
        place: place_of(&req),
        doctors: vec![],
        patients: vec![],
        created_at: now,
        updated_at: now,
    };

    let db = Arc::clone(&state.db);
    let stored = campaign.clone();
    run_blocking(move || db.insert_campaign(&stored)).await?;
    info!("Campaign {} '{}' created", campaign.id, campaign.title);

    Ok((
        StatusCode::CREATED,
        Json(CampaignResponse {
            error: false,
            campaign,
        }),
    ))
}

/// Edits the descriptive fields. Rosters are left exactly as stored.
pub async fn update_campaign(
    State(state): State<AppState>,
    Path(campaign_id): Path<String>,
    Json(req): Json<CampaignRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_campaign(&req)?;

    let db = Arc::clone(&state.db);
    let id = campaign_id.clone();
    let outcome = run_blocking(move || {
        db.update_campaign(&id, |campaign| {
            campaign.title = req.title.trim().to_string();
            campaign.description = req.description.trim().to_string();
            campaign.event_date = req.event_date;
            campaign.place = place_of(&req);
            Mutation::Commit(())
        })
    })
    .await?;

    match outcome {
        UpdateOutcome::Committed(..) => {
            info!("Campaign {} updated", campaign_id);
            Ok(Json(MessageResponse::ok("Campaign saved successfully!")))
        }
        UpdateOutcome::NotFound => Err(campaign_not_found()),
        UpdateOutcome::Aborted(()) | UpdateOutcome::Contended => Err(ApiError::Internal(
            anyhow::anyhow!("campaign {} could not be saved", campaign_id),
        )),
    }
}

pub async fn register_for_campaign(
    State(state): State<AppState>,
    Path(campaign_id): Path<String>,
    Extension(CurrentUser(caller)): Extension<CurrentUser>,
    Json(req): Json<RegisterCampaignRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (role, participant) = registration::resolve_role(&req)?;
    info!("{} registers {} {} for campaign {}", caller.id, role, participant, campaign_id);

    let db = Arc::clone(&state.db);
    let outcome = tokio::task::spawn_blocking(move || {
        registration::register(&db, &campaign_id, &participant, role)
    })
    .await
    .map_err(anyhow::Error::from)??;

    let response = match outcome {
        RegistrationOutcome::Registered(campaign) => RegistrationResponse {
            error: false,
            registered: true,
            message: "Success!".into(),
            campaign: Some(campaign),
        },
        RegistrationOutcome::AlreadyRegistered => RegistrationResponse {
            error: true,
            registered: false,
            message: "Already registered.".into(),
            campaign: None,
        },
    };
    Ok(Json(response))
}

fn validate_campaign(req: &CampaignRequest) -> Result<(), ApiError> {
    Checks::new()
        .not_empty(&req.title, "Campaign title should not be empty.")
        .not_empty(&req.description, "Description should not be empty")
        .not_empty(&req.address, "Address should not be empty.")
        .not_empty(&req.city, "City name should not be empty.")
        .not_empty(&req.pin, "Pin should not be empty.")
        .not_empty(&req.state, "State name should not be empty.")
        .finish()
}

fn place_of(req: &CampaignRequest) -> Place {
    Place {
        address: req.address.trim().to_string(),
        city: req.city.trim().to_string(),
        pin: req.pin.trim().to_string(),
        state: req.state.trim().to_string(),
    }
}

fn campaign_not_found() -> ApiError {
    ApiError::NotFound("Campaign Not Found!".into())
}
