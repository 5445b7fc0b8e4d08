use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::EditError;
use crate::payload::ImagePayload;

/// One accepted edit. Created once when a generation succeeds and never
/// changed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditRecord {
    id: String,
    image: ImagePayload,
    instruction: String,
    created_at: DateTime<Utc>,
    high_quality: bool,
}

impl EditRecord {
    pub fn new(image: ImagePayload, instruction: impl Into<String>, high_quality: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            image,
            instruction: instruction.into(),
            created_at: Utc::now(),
            high_quality,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn image(&self) -> &ImagePayload {
        &self.image
    }

    /// The instruction as the user typed it, without quality augmentation.
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn high_quality(&self) -> bool {
        self.high_quality
    }
}

/// Append-only, newest-first log of the edits made on the current source
/// image.
#[derive(Debug, Clone, Default)]
pub struct EditHistory {
    records: VecDeque<EditRecord>,
}

impl EditHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: EditRecord) -> &EditRecord {
        self.records.push_front(record);
        &self.records[0]
    }

    /// Drops every record. Called when the source image changes.
    pub fn reset(&mut self) {
        self.records.clear();
    }

    pub fn select(&self, id: &str) -> Result<&ImagePayload, EditError> {
        self.get(id)
            .map(EditRecord::image)
            .ok_or_else(|| EditError::NotFound(id.to_string()))
    }

    pub fn get(&self, id: &str) -> Option<&EditRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn latest(&self) -> Option<&EditRecord> {
        self.records.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EditRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains_image(&self, image: &ImagePayload) -> bool {
        self.records.iter().any(|record| &record.image == image)
    }
}
