use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Presentation theme attached to a context. The set is closed; unknown
/// values coming from the API fall back to `Simple`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum SkinId {
    #[default]
    Simple,
    Geo,
    Tide,
}

impl SkinId {
    pub const ALL: [Self; 3] = [Self::Simple, Self::Geo, Self::Tide];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Geo => "geo",
            Self::Tide => "tide",
        }
    }

    /// Parse a skin identifier, mapping anything unrecognised to the default
    /// skin.
    #[must_use]
    pub fn parse_lossy(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl FromStr for SkinId {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "simple" => Ok(Self::Simple),
            "geo" => Ok(Self::Geo),
            "tide" => Ok(Self::Tide),
            other => Err(format!("unknown skin id: {other}")),
        }
    }
}

impl fmt::Display for SkinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The state a context was in when it was moved to the wastebasket, so that
/// restoring it puts it back where it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum DeletedFromState {
    Active,
    Archived,
}

/// A workspace the user can select.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ContextRow {
    /// Positive for real rows. Non-positive ids are placeholders.
    pub id: i64,
    pub name: String,
    pub skin_id: SkinId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    pub is_archived: bool,
    pub is_deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_from_state: Option<DeletedFromState>,
}

impl ContextRow {
    /// Id of the row shown while the context list has not been loaded yet.
    pub const LOADING_ID: i64 = -1;

    pub fn new(id: i64, name: impl Into<String>, skin_id: SkinId) -> Self {
        Self {
            id,
            name: name.into(),
            skin_id,
            order: None,
            is_archived: false,
            is_deleted: false,
            deleted_at: None,
            deleted_from_state: None,
        }
    }

    #[must_use]
    pub fn with_order(mut self, order: i64) -> Self {
        self.order = Some(order);
        self
    }

    /// The placeholder row standing in for the context list until it is
    /// hydrated. It must never be selected.
    #[must_use]
    pub fn loading() -> Self {
        Self::new(Self::LOADING_ID, "Loading…", SkinId::Simple).with_order(0)
    }

    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.id <= 0
    }

    /// A context is visible when it is a real row that is neither archived
    /// nor in the wastebasket.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        !self.is_placeholder() && !self.is_deleted && !self.is_archived
    }
}

/// A named entity scoped to one context. Owned by the API; clients only cache
/// read results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct Persona {
    pub id: i64,
    pub display_name: String,
    pub slug: String,
    #[serde(default)]
    pub task_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<i64>,
}

/// How long deleted contexts stay in the wastebasket. `None` keeps them
/// forever. Advisory only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct WastebasketPolicy {
    pub retention_days: Option<u32>,
}
