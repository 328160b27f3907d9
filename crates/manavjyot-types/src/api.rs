use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Campaign, User};

// -- JWT Claims --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

// -- Generic envelope --

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub error: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            error: false,
            message: message.into(),
        }
    }
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub address: String,
    pub city: String,
    pub pin: String,
    pub state: String,
    pub gender: String,
    pub phone: String,
    #[serde(default)]
    pub is_doctor: bool,
    #[serde(default)]
    pub is_patient: bool,
    #[serde(default)]
    pub is_donor: bool,
    pub specialism: Option<String>,
    pub experience: Option<String>,
    pub disease: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub message: String,
}

// -- Account --

#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub error: bool,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub pin: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChangePasswordRequest {
    pub password: String,
    pub confirm_password: String,
}

// -- Password reset --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetPasswordRequest {
    pub password: String,
    pub confirm: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetTokenStatus {
    pub valid: bool,
}

// -- Contact --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub message: String,
}

// -- Donations --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DonateRequest {
    pub stripe_token: String,
    pub amount: u64,
    pub card_holder_name: String,
}

// -- Campaigns --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CampaignRequest {
    pub title: String,
    pub description: String,
    pub address: String,
    pub city: String,
    pub pin: String,
    pub state: String,
    pub event_date: DateTime<Utc>,
}

/// Exactly one of the two ids must be present.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterCampaignRequest {
    pub doctor_id: Option<String>,
    pub patient_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CampaignResponse {
    pub error: bool,
    pub campaign: Campaign,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CampaignListResponse {
    pub error: bool,
    pub campaigns: Vec<Campaign>,
}

/// Result of a roster registration. `registered == false` means the
/// participant was already on the roster; nothing was written.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegistrationResponse {
    pub error: bool,
    pub registered: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign: Option<Campaign>,
}
