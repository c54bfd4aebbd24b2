//! crates/notes_core/src/domain.rs
//!
//! Defines the pure, core data structures for the notes client.
//! These structs describe what the remote service sends and accepts; they do
//! no I/O of their own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

//=========================================================================================
// Identity
//=========================================================================================

/// Identity assigned by the remote service. Depending on the deployment the
/// service hands out numeric or string ids, so both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{}", n),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        RecordId::Number(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        RecordId::Text(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        RecordId::Text(value)
    }
}

impl FromStr for RecordId {
    type Err = std::convert::Infallible;

    /// All-digit input becomes a numeric id, anything else is kept as text.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Ok(match trimmed.parse::<i64>() {
            Ok(n) => RecordId::Number(n),
            Err(_) => RecordId::Text(trimmed.to_string()),
        })
    }
}

//=========================================================================================
// Users and Sessions
//=========================================================================================

/// A user as reported by the `/auth/*` endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Who is logged in, as far as the last credential check is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: RecordId,
    pub display_name: String,
    pub email: Option<String>,
    pub authenticated: bool,
}

impl Session {
    /// Builds a session from a user the remote service has just vouched for.
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            display_name: user.name.clone(),
            email: user.email.clone(),
            authenticated: true,
        }
    }
}

/// Login payload.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Registration payload.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Which credential transports accompany every outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthPolicy {
    pub cookie_auth: bool,
    pub bearer_auth: bool,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self {
            cookie_auth: true,
            bearer_auth: true,
        }
    }
}

//=========================================================================================
// Notes
//=========================================================================================

/// A note as stored by the remote service. `id` is `None` until the service
/// has created it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    #[serde(default)]
    pub id: Option<RecordId>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, alias = "isPublic")]
    pub is_public: bool,
    #[serde(default, alias = "isDraft")]
    pub is_draft: bool,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Note {
    /// A blank, uncommitted note.
    pub fn new_draft() -> Self {
        Self {
            id: None,
            title: String::new(),
            content: String::new(),
            is_public: false,
            is_draft: true,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn to_input(&self) -> NoteInput {
        NoteInput {
            title: self.title.clone(),
            content: self.content.clone(),
            is_public: self.is_public,
            is_draft: self.is_draft,
        }
    }
}

/// Client-side validation failures for note writes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NoteValidationError {
    #[error("Title is required")]
    MissingTitle,
    #[error("Content is required")]
    MissingContent,
    #[error("Title or content is required to save a draft")]
    EmptyDraft,
}

/// Request body for creating or replacing a note.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteInput {
    pub title: String,
    pub content: String,
    pub is_public: bool,
    pub is_draft: bool,
}

impl NoteInput {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    /// A full save needs both a title and some content.
    pub fn validate_for_save(&self) -> Result<(), NoteValidationError> {
        if self.title.trim().is_empty() {
            return Err(NoteValidationError::MissingTitle);
        }
        if self.content.trim().is_empty() {
            return Err(NoteValidationError::MissingContent);
        }
        Ok(())
    }

    /// A draft only needs one of the two.
    pub fn validate_for_draft(&self) -> Result<(), NoteValidationError> {
        if self.title.trim().is_empty() && self.content.trim().is_empty() {
            return Err(NoteValidationError::EmptyDraft);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    All,
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::All => "all",
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

/// Listing parameters for `GET /notes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteQuery {
    pub page: u32,
    pub limit: u32,
    pub search: Option<String>,
    pub sort_by: String,
    pub sort_order: SortOrder,
    pub visibility: Option<Visibility>,
}

impl Default for NoteQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            search: None,
            sort_by: "updated_at".to_string(),
            sort_order: SortOrder::Desc,
            visibility: None,
        }
    }
}

impl NoteQuery {
    /// Key/value pairs in the order the service documents them. Blank
    /// searches are left out.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("limit", self.limit.to_string()),
        ];
        if let Some(search) = self.search.as_deref().map(str::trim) {
            if !search.is_empty() {
                pairs.push(("search", search.to_string()));
            }
        }
        pairs.push(("sortBy", self.sort_by.clone()));
        pairs.push(("sortOrder", self.sort_order.as_str().to_string()));
        if let Some(visibility) = self.visibility {
            pairs.push(("visibility", visibility.as_str().to_string()));
        }
        pairs
    }
}

fn one_page() -> u32 {
    1
}

/// One page of a note listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NotePage {
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default = "one_page", rename = "totalPages", alias = "total_pages")]
    pub total_pages: u32,
}

//=========================================================================================
// Autosave
//=========================================================================================

/// Body of `POST /notes/{id}/autosave`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AutosavePayload {
    pub title: String,
    pub content: String,
}

impl AutosavePayload {
    /// Autosave only writes notes whose title and content are both non-blank.
    pub fn is_saveable(&self) -> bool {
        !self.title.trim().is_empty() && !self.content.trim().is_empty()
    }
}

/// A partial edit to an open note. Fields left as `None` keep their
/// previous buffered value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EditPatch {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl EditPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            content: None,
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self {
            title: None,
            content: Some(content.into()),
        }
    }

    pub fn full(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            content: Some(content.into()),
        }
    }

    pub fn apply_to(self, buffer: &mut AutosavePayload) {
        if let Some(title) = self.title {
            buffer.title = title;
        }
        if let Some(content) = self.content {
            buffer.content = content;
        }
    }
}

/// What to do with an autosave that comes due while an earlier autosave for
/// the same note is still waiting on the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutosaveOverlap {
    /// Hold on to the newest payload and write it once the outstanding write
    /// has returned.
    #[default]
    Queue,
    /// Discard it; the next edit schedules a fresh write.
    Drop,
}
