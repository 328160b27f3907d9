//! Campaigns are stored as versioned documents. Every write is conditional on
//! the version the writer read, so read-modify-write cycles that race each
//! other are detected instead of silently overwriting one another.

use anyhow::{Context, Result};
use chrono::Utc;
use manavjyot_types::models::{Campaign, Place};
use rusqlite::{Connection, Row};
use tracing::{debug, warn};

use crate::Database;
use crate::models::{CampaignRecord, format_timestamp, parse_timestamp};
use crate::queries::OptionalExt;

/// Upper bound on read-modify-write attempts for a single update.
pub const MAX_UPDATE_ATTEMPTS: usize = 16;

const CAMPAIGN_COLUMNS: &str = "id, title, description, event_date, address, city, pin, state, \
                                doctors, patients, version, created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The stored version moved on since the document was read.
    Conflict,
}

/// Decision a mutator makes about the document it was handed.
#[derive(Debug)]
pub enum Mutation<T> {
    /// Persist the mutated document.
    Commit(T),
    /// Leave the stored document as it is.
    Abort(T),
}

#[derive(Debug)]
pub enum UpdateOutcome<T> {
    Committed(Campaign, T),
    Aborted(T),
    NotFound,
    /// Every attempt lost to a concurrent writer.
    Contended,
}

impl Database {
    pub fn insert_campaign(&self, campaign: &Campaign) -> Result<()> {
        let doctors = serde_json::to_string(&campaign.doctors)?;
        let patients = serde_json::to_string(&campaign.patients)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO campaigns (id, title, description, event_date, address, city, pin, state,
                                        doctors, patients, version, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, ?11, ?12)",
                rusqlite::params![
                    campaign.id.to_string(),
                    campaign.title,
                    campaign.description,
                    format_timestamp(&campaign.event_date),
                    campaign.place.address,
                    campaign.place.city,
                    campaign.place.pin,
                    campaign.place.state,
                    doctors,
                    patients,
                    format_timestamp(&campaign.created_at),
                    format_timestamp(&campaign.updated_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_campaign(&self, id: &str) -> Result<Option<CampaignRecord>> {
        let raw = self.with_conn(|conn| {
            let sql = format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?1");
            conn.query_row(&sql, [id], RawCampaign::from_row).optional()
        })?;
        raw.map(RawCampaign::into_record).transpose()
    }

    /// All campaigns, newest first.
    pub fn list_campaigns(&self) -> Result<Vec<Campaign>> {
        let rows = self.with_conn(|conn| query_campaigns(conn))?;
        rows.into_iter()
            .map(|raw| raw.into_record().map(|record| record.campaign))
            .collect()
    }

    /// Overwrites the stored document if it is still at `expected_version`,
    /// bumping the version on success.
    pub fn replace_campaign(&self, campaign: &Campaign, expected_version: i64) -> Result<SaveOutcome> {
        let doctors = serde_json::to_string(&campaign.doctors)?;
        let patients = serde_json::to_string(&campaign.patients)?;
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE campaigns
                 SET title = ?3, description = ?4, event_date = ?5, address = ?6, city = ?7,
                     pin = ?8, state = ?9, doctors = ?10, patients = ?11, updated_at = ?12,
                     version = version + 1
                 WHERE id = ?1 AND version = ?2",
                rusqlite::params![
                    campaign.id.to_string(),
                    expected_version,
                    campaign.title,
                    campaign.description,
                    format_timestamp(&campaign.event_date),
                    campaign.place.address,
                    campaign.place.city,
                    campaign.place.pin,
                    campaign.place.state,
                    doctors,
                    patients,
                    format_timestamp(&campaign.updated_at),
                ],
            )?;
            Ok(if updated == 1 { SaveOutcome::Saved } else { SaveOutcome::Conflict })
        })
    }

    /// Read-modify-write of one campaign document.
    ///
    /// The mutator sees a freshly read copy on every attempt and may run more
    /// than once, so it must not carry side effects between calls. A committed
    /// write only lands if nobody else wrote the document in between; otherwise
    /// the document is re-read and the mutator applied again.
    pub fn update_campaign<F, T>(&self, id: &str, mut mutator: F) -> Result<UpdateOutcome<T>>
    where
        F: FnMut(&mut Campaign) -> Mutation<T>,
    {
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let Some(CampaignRecord { mut campaign, version }) = self.get_campaign(id)? else {
                return Ok(UpdateOutcome::NotFound);
            };

            let value = match mutator(&mut campaign) {
                Mutation::Abort(value) => return Ok(UpdateOutcome::Aborted(value)),
                Mutation::Commit(value) => value,
            };

            campaign.updated_at = Utc::now();
            match self.replace_campaign(&campaign, version)? {
                SaveOutcome::Saved => return Ok(UpdateOutcome::Committed(campaign, value)),
                SaveOutcome::Conflict => {
                    debug!("Campaign {} changed under attempt {}, retrying", id, attempt);
                }
            }
        }

        warn!("Campaign {} update gave up after {} attempts", id, MAX_UPDATE_ATTEMPTS);
        Ok(UpdateOutcome::Contended)
    }
}

fn query_campaigns(conn: &Connection) -> Result<Vec<RawCampaign>> {
    let sql = format!(
        "SELECT {CAMPAIGN_COLUMNS} FROM campaigns ORDER BY created_at DESC, event_date DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], RawCampaign::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Column values as stored; decoding happens outside the connection lock.
struct RawCampaign {
    id: String,
    title: String,
    description: String,
    event_date: String,
    place: Place,
    doctors: String,
    patients: String,
    version: i64,
    created_at: String,
    updated_at: String,
}

impl RawCampaign {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            event_date: row.get(3)?,
            place: Place {
                address: row.get(4)?,
                city: row.get(5)?,
                pin: row.get(6)?,
                state: row.get(7)?,
            },
            doctors: row.get(8)?,
            patients: row.get(9)?,
            version: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }

    fn into_record(self) -> Result<CampaignRecord> {
        let campaign = Campaign {
            id: self.id.parse().with_context(|| format!("corrupt campaign id '{}'", self.id))?,
            title: self.title,
            description: self.description,
            event_date: parse_timestamp(&self.event_date)
                .with_context(|| format!("event date on campaign '{}'", self.id))?,
            place: self.place,
            doctors: serde_json::from_str(&self.doctors)
                .with_context(|| format!("corrupt doctors roster on campaign '{}'", self.id))?,
            patients: serde_json::from_str(&self.patients)
                .with_context(|| format!("corrupt patients roster on campaign '{}'", self.id))?,
            created_at: parse_timestamp(&self.created_at)
                .with_context(|| format!("created at on campaign '{}'", self.id))?,
            updated_at: parse_timestamp(&self.updated_at)
                .with_context(|| format!("updated at on campaign '{}'", self.id))?,
        };
        Ok(CampaignRecord {
            campaign,
            version: self.version,
        })
    }
}
