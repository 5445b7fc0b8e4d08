use retouch_contracts::events::{EventWriter, SessionEvent};
use retouch_contracts::{EditError, EditHistory, EditRecord, ImagePayload, Phase};
use uuid::Uuid;

use crate::client::GenerationClient;
use crate::request::{build_edit_request, EditRequest};

/// Ticket for the one outstanding edit. Hand it back to
/// [`EditSession::complete_edit`] or [`EditSession::cancel_edit`] on the
/// session that issued it; any other session refuses it.
#[derive(Debug)]
pub struct PendingEdit {
    ticket: Uuid,
    request: EditRequest,
    instruction: String,
}

impl PendingEdit {
    pub fn ticket(&self) -> Uuid {
        self.ticket
    }

    pub fn request(&self) -> &EditRequest {
        &self.request
    }

    /// The instruction as typed, before any quality suffix.
    pub fn instruction(&self) -> &str {
        &self.instruction
    }
}

/// One editing conversation: a source image, the image currently shown, and
/// the edits made since the source was uploaded.
///
/// At most one edit is in flight. Operations that would start a second one
/// are refused with `InvalidTransition` and leave the session as it was.
#[derive(Debug, Default)]
pub struct EditSession {
    source_image: Option<ImagePayload>,
    active_image: Option<ImagePayload>,
    history: EditHistory,
    phase: Phase,
    last_error: Option<EditError>,
    pending: Option<Uuid>,
    events: Option<EventWriter>,
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn source_image(&self) -> Option<&ImagePayload> {
        self.source_image.as_ref()
    }

    pub fn active_image(&self) -> Option<&ImagePayload> {
        self.active_image.as_ref()
    }

    pub fn history(&self) -> &EditHistory {
        &self.history
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn last_error(&self) -> Option<&EditError> {
        self.last_error.as_ref()
    }

    pub fn is_processing(&self) -> bool {
        self.phase.is_processing()
    }

    /// Replaces the source image. History is cleared and the new image
    /// becomes active.
    pub fn upload_source(
        &mut self,
        bytes: &[u8],
        declared_mime: &str,
    ) -> Result<&ImagePayload, EditError> {
        self.guard_idle("upload a source image")?;
        let image = match ImagePayload::from_raw_file(bytes, declared_mime) {
            Ok(image) => image,
            Err(err) => {
                self.fail(&err);
                self.emit(SessionEvent::SourceRejected {
                    mime_type: declared_mime.to_string(),
                    error_kind: err.kind(),
                    error: err.to_string(),
                });
                return Err(err);
            }
        };

        self.history.reset();
        self.source_image = Some(image.clone());
        self.last_error = None;
        self.phase = Phase::Idle;
        self.emit(SessionEvent::SourceUploaded {
            mime_type: image.mime_type().to_string(),
            bytes: image.byte_len(),
        });
        Ok(&*self.active_image.insert(image))
    }

    /// Runs one edit against the active image through `client`, blocking
    /// until the model answers.
    pub fn request_edit(
        &mut self,
        client: &GenerationClient,
        instruction: &str,
        high_quality: bool,
    ) -> Result<&EditRecord, EditError> {
        let pending = self.begin_edit(instruction, high_quality)?;
        let outcome = client.invoke(pending.request());
        self.complete_edit(pending, outcome)
    }

    /// Validates the instruction against the active image and moves to
    /// `Processing`. The caller performs the remote call with
    /// [`PendingEdit::request`].
    pub fn begin_edit(
        &mut self,
        instruction: &str,
        high_quality: bool,
    ) -> Result<PendingEdit, EditError> {
        self.guard_idle("request an edit")?;
        let request = match build_edit_request(self.active_image.as_ref(), instruction, high_quality)
        {
            Ok(request) => request,
            Err(err) => {
                self.fail(&err);
                self.emit_edit_failed(None, &err);
                return Err(err);
            }
        };

        let ticket = Uuid::new_v4();
        self.pending = Some(ticket);
        self.last_error = None;
        self.phase = Phase::Processing;
        let instruction = instruction.trim().to_string();
        self.emit(SessionEvent::EditStarted {
            ticket,
            instruction: instruction.clone(),
            high_quality,
            mime_type: request.image().mime_type().to_string(),
        });
        Ok(PendingEdit {
            ticket,
            request,
            instruction,
        })
    }

    /// Applies the outcome of the remote call started by `pending`.
    pub fn complete_edit(
        &mut self,
        pending: PendingEdit,
        outcome: Result<ImagePayload, EditError>,
    ) -> Result<&EditRecord, EditError> {
        self.take_ticket(&pending, "complete an edit")?;
        let image = match outcome {
            Ok(image) => image,
            Err(err) => {
                self.fail(&err);
                self.emit_edit_failed(Some(pending.ticket), &err);
                return Err(err);
            }
        };

        let record = EditRecord::new(
            image.clone(),
            pending.instruction,
            pending.request.high_quality(),
        );
        self.active_image = Some(image);
        self.last_error = None;
        self.phase = Phase::Idle;
        self.emit(SessionEvent::EditSucceeded {
            ticket: pending.ticket,
            record_id: record.id().to_string(),
            high_quality: record.high_quality(),
            mime_type: record.image().mime_type().to_string(),
            bytes: record.image().byte_len(),
            history_len: self.history.len() + 1,
        });
        Ok(self.history.append(record))
    }

    /// Abandons the outstanding edit. A result that arrives for it later is
    /// refused by [`EditSession::complete_edit`].
    pub fn cancel_edit(&mut self, pending: &PendingEdit) -> Result<(), EditError> {
        self.take_ticket(pending, "cancel an edit")?;
        self.fail(&EditError::Cancelled);
        self.emit(SessionEvent::EditCancelled {
            ticket: pending.ticket,
        });
        Ok(())
    }

    /// Shows an earlier edit. Phase and history are left alone.
    pub fn select_history_item(&mut self, id: &str) -> Result<&ImagePayload, EditError> {
        let image = self.history.select(id)?.clone();
        self.emit(SessionEvent::HistorySelected {
            record_id: id.to_string(),
        });
        Ok(&*self.active_image.insert(image))
    }

    pub fn revert_to_source(&mut self) -> Result<&ImagePayload, EditError> {
        let source = self.source_image.clone().ok_or(EditError::MissingImage)?;
        self.emit(SessionEvent::RevertedToSource {
            history_len: self.history.len(),
        });
        Ok(&*self.active_image.insert(source))
    }

    fn guard_idle(&self, operation: &'static str) -> Result<(), EditError> {
        if self.phase.is_processing() {
            return Err(EditError::InvalidTransition {
                operation,
                phase: self.phase,
            });
        }
        Ok(())
    }

    fn take_ticket(
        &mut self,
        pending: &PendingEdit,
        operation: &'static str,
    ) -> Result<(), EditError> {
        if self.pending != Some(pending.ticket) {
            return Err(EditError::InvalidTransition {
                operation,
                phase: self.phase,
            });
        }
        self.pending = None;
        Ok(())
    }

    fn fail(&mut self, err: &EditError) {
        self.last_error = Some(err.clone());
        self.phase = Phase::Error;
    }

    fn emit_edit_failed(&self, ticket: Option<Uuid>, err: &EditError) {
        self.emit(SessionEvent::EditFailed {
            ticket,
            error_kind: err.kind(),
            error: err.to_string(),
        });
    }

    fn emit(&self, event: SessionEvent) {
        let Some(events) = &self.events else {
            return;
        };
        if let Err(err) = events.record(&event) {
            eprintln!("retouch: failed to record {} event: {err:#}", event.name());
        }
    }
}
