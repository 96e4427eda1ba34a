use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::AppError;

/// A stored quote. Field order is the wire order, and the serialized form is
/// what removal matches against, so keep it stable.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Quote {
    pub id: String,
    pub author_id: String,

    #[serde(rename = "str")]
    pub text: String,

    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stenographer_id: Option<String>,
}

/// A quote as a client sends it, before defaults are filled in.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct QuoteDraft {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub author_id: Option<String>,

    #[serde(default, rename = "str")]
    pub text: Option<String>,

    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,

    #[serde(default)]
    pub stenographer_id: Option<String>,
}

impl Quote {
    /// Validates a draft and fills in server-side defaults. `default_author`
    /// is used when the draft has no (or an empty) `author_id`.
    pub fn from_draft(draft: QuoteDraft, default_author: &str) -> Result<Self, AppError> {
        let text = match draft.text {
            Some(text) if !text.is_empty() => text,
            _ => return Err(AppError::BadRequest("no quote string provided".to_string())),
        };

        Ok(Self {
            id: draft
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            author_id: draft
                .author_id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| default_author.to_string()),
            text,
            date: draft.date.unwrap_or_else(now_utc),
            stenographer_id: draft.stenographer_id,
        })
    }

    /// Decodes and normalizes a request body.
    pub fn from_json(body: &[u8], default_author: &str) -> Result<Self, AppError> {
        let draft: QuoteDraft = serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("invalid request, {e}")))?;

        Self::from_draft(draft, default_author)
    }
}

/// Current UTC time truncated to whole seconds.
pub fn now_utc() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(0).unwrap_or(now)
}
