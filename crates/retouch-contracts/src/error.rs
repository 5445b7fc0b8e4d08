use thiserror::Error;

use crate::state::Phase;

/// Every failure an edit session can surface to the presentation layer.
///
/// None of these are fatal: the session stays usable after any of them and
/// the last good image is kept.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("malformed image payload: {0}")]
    MalformedPayload(String),
    #[error("unsupported file type '{0}': please upload an image file")]
    UnsupportedFileType(String),
    #[error("please enter an edit instruction")]
    EmptyInstruction,
    #[error("please upload an image first")]
    MissingImage,
    #[error("no candidates returned from the model")]
    NoCandidates,
    #[error("model returned text instead of image: {0}")]
    TextOnlyResponse(String),
    #[error("model did not return a valid image")]
    EmptyResponse,
    #[error("{0}")]
    TransportError(String),
    #[error("edit request was cancelled")]
    Cancelled,
    #[error("cannot {operation} while {phase}")]
    InvalidTransition {
        operation: &'static str,
        phase: Phase,
    },
    #[error("no history entry with id '{0}'")]
    NotFound(String),
}

impl EditError {
    /// Stable tag used in event logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EditError::MalformedPayload(_) => "malformed_payload",
            EditError::UnsupportedFileType(_) => "unsupported_file_type",
            EditError::EmptyInstruction => "empty_instruction",
            EditError::MissingImage => "missing_image",
            EditError::NoCandidates => "no_candidates",
            EditError::TextOnlyResponse(_) => "text_only_response",
            EditError::EmptyResponse => "empty_response",
            EditError::TransportError(_) => "transport_error",
            EditError::Cancelled => "cancelled",
            EditError::InvalidTransition { .. } => "invalid_transition",
            EditError::NotFound(_) => "not_found",
        }
    }

    /// Input problems caught before any outbound request is built.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EditError::EmptyInstruction
                | EditError::MissingImage
                | EditError::UnsupportedFileType(_)
                | EditError::MalformedPayload(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::EditError;
    use crate::state::Phase;

    #[test]
    fn text_only_response_surfaces_model_text() {
        let err = EditError::TextOnlyResponse("cannot process this image".to_string());
        assert_eq!(
            err.to_string(),
            "model returned text instead of image: cannot process this image"
        );
        assert_eq!(err.kind(), "text_only_response");
    }

    #[test]
    fn transport_error_message_is_passed_through() {
        let err = EditError::TransportError("Gemini request failed (429): quota".to_string());
        assert_eq!(err.to_string(), "Gemini request failed (429): quota");
    }

    #[test]
    fn invalid_transition_names_operation_and_phase() {
        let err = EditError::InvalidTransition {
            operation: "request an edit",
            phase: Phase::Processing,
        };
        assert_eq!(err.to_string(), "cannot request an edit while processing");
        assert!(!err.is_validation());
        assert!(EditError::EmptyInstruction.is_validation());
    }
}
