//! Meets and groups: records with an embedded participant list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::post::Lifecycle;
use super::validate::{normalize_email, normalize_required, same_email};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub email: String,
    pub name: String,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meet {
    pub id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub starts_at: DateTime<Utc>,
    pub organizer_email: String,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub attendees: Vec<Participant>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub lifecycle: Lifecycle,
}

impl Meet {
    pub(crate) fn new(id: String, req: NewMeetRequest, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: req.title,
            description: req.description,
            location: req.location,
            starts_at: req.starts_at,
            organizer_email: req.organizer_email,
            capacity: req.capacity,
            attendees: Vec::new(),
            created_at: now,
            lifecycle: Lifecycle::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle == Lifecycle::Active
    }

    pub fn is_full(&self) -> bool {
        self.capacity
            .is_some_and(|capacity| self.attendees.len() >= capacity as usize)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMeetRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub location: String,
    pub starts_at: DateTime<Utc>,
    pub organizer_email: String,
    #[serde(default)]
    pub capacity: Option<u32>,
}

impl NewMeetRequest {
    pub(crate) fn validate(self) -> Result<Self, DomainError> {
        if self.capacity == Some(0) {
            return Err(DomainError::Validation {
                field: "capacity",
                message: "must be > 0",
            });
        }
        Ok(Self {
            title: normalize_required("title", &self.title, 255, "must be 1..255 chars")?,
            description: self.description.trim().to_string(),
            location: normalize_required("location", &self.location, 255, "must be 1..255 chars")?,
            starts_at: self.starts_at,
            organizer_email: normalize_email("organizer_email", &self.organizer_email)?,
            capacity: self.capacity,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
    pub description: String,
    pub owner_email: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub members: Vec<Participant>,
    pub created_at: DateTime<Utc>,
}

impl Group {
    pub(crate) fn new(id: String, req: NewGroupRequest, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: req.name,
            description: req.description,
            owner_email: req.owner_email,
            private: req.private,
            members: Vec::new(),
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGroupRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub owner_email: String,
    /// Display name the owner is listed under as the first member.
    pub owner_name: String,
    #[serde(default)]
    pub private: bool,
}

impl NewGroupRequest {
    pub(crate) fn validate(self) -> Result<Self, DomainError> {
        Ok(Self {
            name: normalize_required("name", &self.name, 64, "must be 1..64 chars")?,
            description: self.description.trim().to_string(),
            owner_email: normalize_email("owner_email", &self.owner_email)?,
            owner_name: normalize_required(
                "owner_name",
                &self.owner_name,
                64,
                "must be 1..64 chars",
            )?,
            private: self.private,
        })
    }
}

/// Append a participant unless the email is already present. Returns `false` on duplicates.
pub(crate) fn add_participant(list: &mut Vec<Participant>, participant: Participant) -> bool {
    if list.iter().any(|p| same_email(&p.email, &participant.email)) {
        return false;
    }
    list.push(participant);
    true
}

/// Returns `false` when the email was not in the list.
pub(crate) fn remove_participant(list: &mut Vec<Participant>, email: &str) -> bool {
    let before = list.len();
    list.retain(|p| !same_email(&p.email, email));
    list.len() != before
}

pub(crate) fn new_participant(
    email: &str,
    name: &str,
    now: DateTime<Utc>,
) -> Result<Participant, DomainError> {
    Ok(Participant {
        email: normalize_email("email", email)?,
        name: normalize_required("name", name, 64, "must be 1..64 chars")?,
        joined_at: now,
    })
}
