use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
    pub address: String,
    pub city: String,
    pub pin: String,
    pub state: String,
}

/// A medical camp with its doctor and patient rosters.
///
/// Rosters hold canonical participant ids (see [`ParticipantId`]) and never
/// contain the same id twice within one role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub event_date: DateTime<Utc>,
    pub place: Place,
    pub doctors: Vec<String>,
    pub patients: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    pub fn roster(&self, role: Role) -> &[String] {
        match role {
            Role::Doctor => &self.doctors,
            Role::Patient => &self.patients,
        }
    }

    pub fn roster_mut(&mut self, role: Role) -> &mut Vec<String> {
        match role {
            Role::Doctor => &mut self.doctors,
            Role::Patient => &mut self.patients,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Doctor,
    Patient,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Doctor => f.write_str("doctor"),
            Self::Patient => f.write_str("patient"),
        }
    }
}

/// Identifier of a campaign participant in canonical string form.
///
/// UUIDs are normalized to lowercase hyphenated form, so `{A1B2...}`,
/// `a1b2...` (simple) and `urn:uuid:...` all compare equal. Anything else is
/// kept verbatim after trimming.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let canonical = match Uuid::parse_str(trimmed) {
            Ok(id) => id.hyphenated().to_string(),
            Err(_) => trimmed.to_string(),
        };
        Some(Self(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value equality against a stored roster entry, whatever form it was stored in.
    pub fn matches(&self, stored: &str) -> bool {
        Self::parse(stored).is_some_and(|other| other == *self)
    }
}

impl From<Uuid> for ParticipantId {
    fn from(id: Uuid) -> Self {
        Self(id.hyphenated().to_string())
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorFields {
    pub specialism: String,
    pub experience: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientFields {
    pub disease: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    pub gender: String,
    pub phone: String,
    pub address: Place,
    pub is_doctor: bool,
    pub is_patient: bool,
    pub is_donor: bool,
    pub is_admin: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_fields: Option<DoctorFields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_fields: Option<PatientFields>,
}

/// Public view of an account. Credential and reset-token fields never leave the DB layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub profile: Profile,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
    pub id: Uuid,
    pub donor_id: Uuid,
    /// Whole rupees.
    pub amount: u64,
    pub donated_at: DateTime<Utc>,
}
