use std::sync::Arc;

use anyhow::anyhow;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;

use manavjyot_db::Database;
use manavjyot_mail::Mailer;
use manavjyot_types::api::{AuthResponse, Claims, LoginRequest, MessageResponse, SignupRequest};
use manavjyot_types::models::{DoctorFields, PatientFields, Place, Profile};

use crate::error::ApiError;
use crate::payments::PaymentGateway;
use crate::reset::ResetTokenManager;
use crate::validation::Checks;
use crate::{SharedClock, run_blocking};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub mailer: Arc<dyn Mailer>,
    /// `None` when no payment provider is configured; donations are refused.
    pub payments: Option<Arc<dyn PaymentGateway>>,
    pub reset: ResetTokenManager,
    pub clock: SharedClock,
    /// Sender of outgoing mail and inbox for the contact form.
    pub site_email: String,
}

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_signup(&req)?;

    let profile = Profile {
        name: req.name.trim().to_string(),
        gender: req.gender,
        phone: req.phone,
        address: Place {
            address: req.address,
            city: req.city,
            pin: req.pin,
            state: req.state,
        },
        ..signup_roles(req.is_doctor, req.is_patient, req.is_donor, req.specialism, req.experience, req.disease)
    };

    let user_id = Uuid::new_v4();
    let email = req.email.trim().to_lowercase();
    let password = req.password;

    let db = Arc::clone(&state.db);
    let id = user_id.to_string();
    let insert_email = email.clone();
    let created = run_blocking(move || {
        let password_hash = hash_password(&password)?;
        db.create_user(&id, &insert_email, &password_hash, &profile)
    })
    .await?;

    if !created {
        return Err(ApiError::Conflict("Account with that email address already exists.".into()));
    }
    info!("New account {} for {}", user_id, email);

    let token = create_token(&state.jwt_secret, user_id, &email)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            message: "Success! You are Signup and logged in.".into(),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Checks::new()
        .email(&req.email, "Email is not valid")
        .not_empty(&req.password, "Password cannot be blank")
        .finish()?;

    let db = Arc::clone(&state.db);
    let email = req.email.clone();
    let password = req.password;
    let user = run_blocking(move || {
        let Some(user) = db.get_user_by_email(&email)? else {
            return Ok(None);
        };
        Ok(verify_password(&password, &user.password)?.then_some(user))
    })
    .await?
    .ok_or_else(|| ApiError::Unauthorized("Invalid email or password.".into()))?;

    let user_id: Uuid = user.id.parse().map_err(|e| anyhow!("corrupt user id '{}': {}", user.id, e))?;
    let token = create_token(&state.jwt_secret, user_id, &user.email)?;

    Ok(Json(AuthResponse {
        token,
        message: "Success! You are logged in.".into(),
    }))
}

/// Tokens are stateless; the client forgets its token.
pub async fn logout() -> impl IntoResponse {
    Json(MessageResponse::ok("Successfully logged out."))
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

/// `Ok(false)` on mismatch; `Err` only if the stored hash is unreadable.
pub fn verify_password(password: &str, stored_hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| anyhow!("corrupt password hash: {}", e))?;
    Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

pub fn create_token(secret: &str, user_id: Uuid, email: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

fn validate_signup(req: &SignupRequest) -> Result<(), ApiError> {
    let mut checks = Checks::new();
    checks
        .not_empty(&req.name, "Name should not be empty.")
        .email(&req.email, "Email is not valid")
        .length(&req.password, 4, 20, "Password must be at least 4 to 20 characters long")
        .equals(&req.confirm_password, &req.password, "Passwords do not match")
        .not_empty(&req.address, "Address should not be empty.")
        .not_empty(&req.city, "City should not be empty.")
        .digits(&req.pin, 3, 6, "Pin should be valid")
        .not_empty(&req.state, "State should be specified.")
        .not_empty(&req.gender, "Gender should be specified.")
        .length(req.phone.trim(), 10, 10, "Phone number should be valid number");

    if req.is_doctor {
        checks
            .not_empty(req.specialism.as_deref().unwrap_or(""), "Speciality must not be empty.")
            .digits(req.experience.as_deref().unwrap_or(""), 1, 2, "Experience must be valid number");
    } else if req.is_patient {
        checks.not_empty(req.disease.as_deref().unwrap_or(""), "Disease should not be empty.");
    }

    checks.finish()
}

/// An account takes one role: doctor wins over patient, patient over donor.
fn signup_roles(
    is_doctor: bool,
    is_patient: bool,
    is_donor: bool,
    specialism: Option<String>,
    experience: Option<String>,
    disease: Option<String>,
) -> Profile {
    if is_doctor {
        Profile {
            is_doctor: true,
            doctor_fields: Some(DoctorFields {
                specialism: specialism.unwrap_or_default(),
                experience: experience.and_then(|e| e.parse().ok()).unwrap_or_default(),
            }),
            ..Profile::default()
        }
    } else if is_patient {
        Profile {
            is_patient: true,
            patient_fields: Some(PatientFields {
                disease: disease.unwrap_or_default(),
            }),
            ..Profile::default()
        }
    } else {
        Profile {
            is_donor,
            ..Profile::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("hunter22").unwrap();
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("hunter23", &hash).unwrap());
        assert!(verify_password("x", "not-a-phc-string").is_err());
    }

    #[test]
    fn doctor_role_takes_precedence() {
        let profile = signup_roles(true, true, true, Some("ENT".into()), Some("12".into()), Some("flu".into()));
        assert!(profile.is_doctor);
        assert!(!profile.is_patient);
        assert!(!profile.is_donor);
        assert_eq!(profile.doctor_fields.unwrap().experience, 12);
        assert!(profile.patient_fields.is_none());
    }

    #[test]
    fn patient_keeps_disease() {
        let profile = signup_roles(false, true, false, None, None, Some("asthma".into()));
        assert!(profile.is_patient);
        assert_eq!(profile.patient_fields.unwrap().disease, "asthma");
    }

    #[test]
    fn signup_validation_requires_role_fields() {
        let req: SignupRequest = serde_json::from_value(serde_json::json!({
            "name": "Dr. Rao",
            "email": "rao@example.com",
            "password": "secret1",
            "confirmPassword": "secret1",
            "address": "1 Main St",
            "city": "Nagpur",
            "pin": "440001",
            "state": "Maharashtra",
            "gender": "female",
            "phone": "9876543210",
            "isDoctor": true
        }))
        .unwrap();

        let ApiError::Validation(errors) = validate_signup(&req).unwrap_err() else {
            panic!("expected validation failure");
        };
        assert_eq!(errors, ["Speciality must not be empty.", "Experience must be valid number"]);
    }
}
