//! Adding a doctor or patient to a campaign roster.
//!
//! The duplicate scan and the append run as one versioned read-modify-write
//! on the campaign document. If another registration lands between the read
//! and the write, the write is rejected and the scan repeats against the
//! fresh roster, so a participant can never be appended twice.

use manavjyot_db::{Database, Mutation, UpdateOutcome};
use manavjyot_types::api::RegisterCampaignRequest;
use manavjyot_types::models::{Campaign, ParticipantId, Role};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug)]
pub enum RegistrationOutcome {
    Registered(Campaign),
    AlreadyRegistered,
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("campaign not found")]
    NotFound,
    #[error("exactly one of doctor_id or patient_id must be given")]
    AmbiguousRole,
    #[error("campaign roster kept changing under concurrent registrations")]
    Contention,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Picks the role from whichever id field is filled in. Blank ids count as
/// absent; both or neither is rejected.
pub fn resolve_role(req: &RegisterCampaignRequest) -> Result<(Role, ParticipantId), RegistrationError> {
    let doctor = req.doctor_id.as_deref().and_then(ParticipantId::parse);
    let patient = req.patient_id.as_deref().and_then(ParticipantId::parse);

    match (doctor, patient) {
        (Some(id), None) => Ok((Role::Doctor, id)),
        (None, Some(id)) => Ok((Role::Patient, id)),
        _ => Err(RegistrationError::AmbiguousRole),
    }
}

pub fn register(
    db: &Database,
    campaign_id: &str,
    participant: &ParticipantId,
    role: Role,
) -> Result<RegistrationOutcome, RegistrationError> {
    let outcome = db.update_campaign(campaign_id, |campaign| {
        let roster = campaign.roster_mut(role);
        if roster.iter().any(|entry| participant.matches(entry)) {
            Mutation::Abort(())
        } else {
            roster.push(participant.as_str().to_string());
            Mutation::Commit(())
        }
    })?;

    match outcome {
        UpdateOutcome::Committed(campaign, ()) => {
            info!("Registered {} {} for campaign {}", role, participant, campaign_id);
            Ok(RegistrationOutcome::Registered(campaign))
        }
        UpdateOutcome::Aborted(()) => Ok(RegistrationOutcome::AlreadyRegistered),
        UpdateOutcome::NotFound => Err(RegistrationError::NotFound),
        UpdateOutcome::Contended => {
            warn!("Giving up registering {} {} for campaign {}", role, participant, campaign_id);
            Err(RegistrationError::Contention)
        }
    }
}
