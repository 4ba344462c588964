use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::validate::{normalize_email, normalize_required};

const DEFAULT_COLOR: &str = "#3b82f6";
const DEFAULT_ICON: &str = "message-circle";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: String,
    pub color: String,
    pub icon: String,
    #[serde(default)]
    pub private: bool,
    /// Moderator emails.
    #[serde(default)]
    pub moderators: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Category {
    pub(crate) fn new(id: String, req: NewCategoryRequest, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: req.name,
            description: req.description,
            color: req.color.unwrap_or_else(|| DEFAULT_COLOR.to_string()),
            icon: req.icon.unwrap_or_else(|| DEFAULT_ICON.to_string()),
            private: req.private,
            moderators: req.moderators,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub color: Option<String>,
    pub icon: Option<String>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub moderators: Vec<String>,
}

impl NewCategoryRequest {
    pub(crate) fn validate(self) -> Result<Self, DomainError> {
        Ok(Self {
            name: normalize_name(&self.name)?,
            description: self.description.trim().to_string(),
            color: self.color.as_deref().map(normalize_color).transpose()?,
            icon: self
                .icon
                .map(|icon| icon.trim().to_string())
                .filter(|icon| !icon.is_empty()),
            private: self.private,
            moderators: normalize_moderators(self.moderators)?,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub private: Option<bool>,
    pub moderators: Option<Vec<String>>,
}

impl CategoryPatch {
    pub(crate) fn validate(self) -> Result<Self, DomainError> {
        Ok(Self {
            name: self.name.as_deref().map(normalize_name).transpose()?,
            description: self.description.map(|d| d.trim().to_string()),
            color: self.color.as_deref().map(normalize_color).transpose()?,
            icon: self.icon.map(|icon| icon.trim().to_string()),
            private: self.private,
            moderators: self.moderators.map(normalize_moderators).transpose()?,
        })
    }

    pub(crate) fn apply_to(self, category: &mut Category) {
        if let Some(name) = self.name {
            category.name = name;
        }
        if let Some(description) = self.description {
            category.description = description;
        }
        if let Some(color) = self.color {
            category.color = color;
        }
        if let Some(icon) = self.icon {
            category.icon = icon;
        }
        if let Some(private) = self.private {
            category.private = private;
        }
        if let Some(moderators) = self.moderators {
            category.moderators = moderators;
        }
    }
}

fn normalize_name(name: &str) -> Result<String, DomainError> {
    normalize_required("name", name, 64, "must be 1..64 chars")
}

fn normalize_color(color: &str) -> Result<String, DomainError> {
    let color = color.trim();
    let hex = color.strip_prefix('#').unwrap_or_default();
    if !(hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit())) {
        return Err(DomainError::Validation {
            field: "color",
            message: "must be a #rrggbb hex color",
        });
    }
    Ok(color.to_lowercase())
}

fn normalize_moderators(moderators: Vec<String>) -> Result<Vec<String>, DomainError> {
    let mut out = Vec::with_capacity(moderators.len());
    for email in moderators {
        let email = normalize_email("moderators", &email)?;
        if !out.contains(&email) {
            out.push(email);
        }
    }
    Ok(out)
}
