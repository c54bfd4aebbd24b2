//! services/client/src/notes.rs
//!
//! Typed calls for the `/notes`, `/stats` and `/features` endpoints.
//! Input is validated here before anything goes out on the wire.

use crate::error::ClientError;
use crate::transport::{to_body, CredentialTransport};
use async_trait::async_trait;
use notes_core::ports::{AutosaveTarget, HttpMethod, PortResult};
use notes_core::{AutosavePayload, Note, NoteInput, NotePage, NoteQuery, RecordId, Visibility};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};
use url::form_urlencoded;

const NOTES_PATH: &str = "/notes";
const PUBLIC_NOTES_PATH: &str = "/notes/public";
const STATS_PATH: &str = "/stats";
const FEATURES_PATH: &str = "/features";

/// Single-note responses come either bare or wrapped in `{ "note": … }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum NoteEnvelope {
    Wrapped { note: Note },
    Bare(Note),
}

impl From<NoteEnvelope> for Note {
    fn from(envelope: NoteEnvelope) -> Self {
        match envelope {
            NoteEnvelope::Wrapped { note } | NoteEnvelope::Bare(note) => note,
        }
    }
}

fn note_path(id: &RecordId) -> String {
    format!("{}/{}", NOTES_PATH, id)
}

fn with_query(path: &str, query: &NoteQuery) -> String {
    let encoded = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(query.query_pairs())
        .finish();
    format!("{}?{}", path, encoded)
}

pub struct NotesApi {
    transport: Arc<CredentialTransport>,
}

impl NotesApi {
    pub fn new(transport: Arc<CredentialTransport>) -> Self {
        Self { transport }
    }

    pub async fn list_notes(&self, query: &NoteQuery) -> Result<NotePage, ClientError> {
        self.transport.get_json(&with_query(NOTES_PATH, query)).await
    }

    pub async fn list_public_notes(&self, query: &NoteQuery) -> Result<NotePage, ClientError> {
        self.transport
            .get_json(&with_query(PUBLIC_NOTES_PATH, query))
            .await
    }

    /// Drafts have no endpoint of their own: fetch every note on the page and
    /// keep the drafts. Page count is recomputed from what survived.
    pub async fn list_drafts(&self, query: &NoteQuery) -> Result<NotePage, ClientError> {
        let query = NoteQuery {
            visibility: Some(Visibility::All),
            ..query.clone()
        };
        let page = self.list_notes(&query).await?;
        let notes: Vec<Note> = page.notes.into_iter().filter(|n| n.is_draft).collect();
        let limit = query.limit.max(1) as usize;
        let total_pages = notes.len().div_ceil(limit).max(1) as u32;
        Ok(NotePage { notes, total_pages })
    }

    pub async fn get_note(&self, id: &RecordId) -> Result<Note, ClientError> {
        let envelope: NoteEnvelope = self.transport.get_json(&note_path(id)).await?;
        Ok(envelope.into())
    }

    /// Creates a note. Title and content are both required.
    pub async fn create_note(&self, input: &NoteInput) -> Result<Note, ClientError> {
        input.validate_for_save()?;
        let envelope: NoteEnvelope = self.transport.post_json(NOTES_PATH, input).await?;
        let note: Note = envelope.into();
        info!("Created note {:?}", note.id);
        Ok(note)
    }

    /// Creates a draft. Either a title or some content is enough.
    pub async fn save_draft(&self, input: &NoteInput) -> Result<Note, ClientError> {
        let input = NoteInput {
            is_draft: true,
            ..input.clone()
        };
        input.validate_for_draft()?;
        let envelope: NoteEnvelope = self.transport.post_json(NOTES_PATH, &input).await?;
        Ok(envelope.into())
    }

    pub async fn update_note(&self, id: &RecordId, input: &NoteInput) -> Result<Note, ClientError> {
        input.validate_for_save()?;
        let envelope: NoteEnvelope = self.transport.put_json(&note_path(id), input).await?;
        info!("Updated note {}", id);
        Ok(envelope.into())
    }

    pub async fn delete_note(&self, id: &RecordId) -> Result<(), ClientError> {
        self.transport.delete(&note_path(id)).await?;
        info!("Deleted note {}", id);
        Ok(())
    }

    /// Best-effort background save. The response body is ignored.
    pub async fn autosave(
        &self,
        id: &RecordId,
        payload: &AutosavePayload,
    ) -> Result<(), ClientError> {
        let path = format!("{}/autosave", note_path(id));
        self.transport
            .request(HttpMethod::Post, &path, Some(to_body(payload)?), &[])
            .await?;
        debug!("Autosaved note {}", id);
        Ok(())
    }

    pub async fn stats(&self) -> Result<Value, ClientError> {
        self.transport.get_json(STATS_PATH).await
    }

    pub async fn features(&self) -> Result<Value, ClientError> {
        self.transport.get_json(FEATURES_PATH).await
    }
}

#[async_trait]
impl AutosaveTarget for NotesApi {
    async fn autosave(&self, note_id: &RecordId, payload: &AutosavePayload) -> PortResult<()> {
        NotesApi::autosave(self, note_id, payload)
            .await
            .map_err(Into::into)
    }
}
