use serde::{Deserialize, Serialize, Serializer};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::resolutions::error::{ResolutionError, validation};

pub type ResolutionId = i64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub id: ResolutionId,
    pub title: ResolutionTitle,
    pub is_done: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
}

/// A title that has been trimmed and is known to be non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionTitle(String);

impl ResolutionTitle {
    pub fn parse(raw: Option<&str>) -> Result<Self, ResolutionError> {
        match raw.map(str::trim) {
            Some(trimmed) if !trimmed.is_empty() => Ok(Self(trimmed.to_string())),
            _ => Err(validation("title is required")),
        }
    }

    pub(crate) fn from_static(text: &'static str) -> Self {
        debug_assert!(!text.trim().is_empty());
        Self(text.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionFilter {
    pub is_done: Option<bool>,
    pub title: Option<String>,
}

impl ResolutionFilter {
    pub fn matches(&self, resolution: &Resolution) -> bool {
        if let Some(is_done) = self.is_done
            && resolution.is_done != is_done
        {
            return false;
        }

        match &self.title {
            Some(needle) => resolution
                .title
                .as_str()
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            None => true,
        }
    }
}

/// Incoming body for create and replace. Absent and `null` fields both land as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionPayload {
    #[serde(default)]
    pub id: Option<ResolutionId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub is_done: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionSummary {
    pub id: ResolutionId,
    pub title: String,
    pub is_done: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionList {
    pub items: Vec<ResolutionSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionDetail {
    pub id: ResolutionId,
    pub title: String,
    pub is_done: bool,
    #[serde(serialize_with = "serialize_rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionUpdated {
    pub id: ResolutionId,
    pub title: String,
    pub is_done: bool,
    #[serde(serialize_with = "serialize_optional_rfc3339")]
    pub updated_at: Option<OffsetDateTime>,
}

impl From<&Resolution> for ResolutionSummary {
    fn from(value: &Resolution) -> Self {
        Self {
            id: value.id,
            title: value.title.as_str().to_string(),
            is_done: value.is_done,
        }
    }
}

impl From<&Resolution> for ResolutionDetail {
    fn from(value: &Resolution) -> Self {
        Self {
            id: value.id,
            title: value.title.as_str().to_string(),
            is_done: value.is_done,
            created_at: value.created_at,
        }
    }
}

impl From<&Resolution> for ResolutionUpdated {
    fn from(value: &Resolution) -> Self {
        Self {
            id: value.id,
            title: value.title.as_str().to_string(),
            is_done: value.is_done,
            updated_at: value.updated_at,
        }
    }
}

fn serialize_rfc3339<S: Serializer>(
    value: &OffsetDateTime,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let text = value.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&text)
}

fn serialize_optional_rfc3339<S: Serializer>(
    value: &Option<OffsetDateTime>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(value) => serialize_rfc3339(value, serializer),
        None => serializer.serialize_none(),
    }
}
