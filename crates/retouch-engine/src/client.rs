use retouch_contracts::{EditError, ImagePayload};
use serde::Deserialize;

use crate::request::EditRequest;

const DEFAULT_RESPONSE_MIME: &str = "image/png";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResponsePart {
    #[serde(default, rename = "inlineData", alias = "inline_data")]
    pub inline_data: Option<InlineBlob>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InlineBlob {
    #[serde(default, rename = "mimeType", alias = "mime_type")]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub data: String,
}

impl ResponsePart {
    pub fn image(mime_type: Option<&str>, data: impl Into<String>) -> Self {
        Self {
            inline_data: Some(InlineBlob {
                mime_type: mime_type.map(str::to_string),
                data: data.into(),
            }),
            text: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            inline_data: None,
            text: Some(text.into()),
        }
    }
}

impl GenerateContentResponse {
    /// A response with a single candidate holding `parts`.
    pub fn with_parts(parts: Vec<ResponsePart>) -> Self {
        Self {
            candidates: vec![Candidate {
                content: Some(CandidateContent { parts }),
            }],
        }
    }
}

/// Transport to a hosted generation model. Implementations send the request
/// and hand back the structured response; they never interpret it.
pub trait GenerationBackend: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;
    fn generate_content(
        &self,
        request: &EditRequest,
    ) -> Result<GenerateContentResponse, EditError>;
}

/// Pulls the edited image out of a response.
///
/// Only the first candidate is read. Its parts are scanned in order for the
/// first one carrying inline image data; if there is none, the first text
/// part becomes a `TextOnlyResponse` failure.
pub fn extract_edited_image(response: &GenerateContentResponse) -> Result<ImagePayload, EditError> {
    let candidate = response.candidates.first().ok_or(EditError::NoCandidates)?;
    let parts = candidate
        .content
        .as_ref()
        .map(|content| content.parts.as_slice())
        .unwrap_or_default();

    if let Some(inline) = parts
        .iter()
        .filter_map(|part| part.inline_data.as_ref())
        .find(|inline| !inline.data.is_empty())
    {
        let mime_type = inline
            .mime_type
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_RESPONSE_MIME);
        return ImagePayload::from_base64(mime_type, inline.data.as_str());
    }

    if let Some(text) = parts
        .iter()
        .filter_map(|part| part.text.as_deref())
        .find(|text| !text.is_empty())
    {
        return Err(EditError::TextOnlyResponse(text.to_string()));
    }

    Err(EditError::EmptyResponse)
}

pub struct GenerationClient {
    backend: Box<dyn GenerationBackend>,
}

impl GenerationClient {
    pub fn new(backend: Box<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn model(&self) -> &str {
        self.backend.model()
    }

    pub fn invoke(&self, request: &EditRequest) -> Result<ImagePayload, EditError> {
        let response = self.backend.generate_content(request)?;
        extract_edited_image(&response)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use retouch_contracts::{EditError, ImagePayload};
    use serde_json::json;

    use super::{
        extract_edited_image, Candidate, CandidateContent, GenerateContentResponse, GenerationBackend,
        GenerationClient, ResponsePart,
    };
    use crate::request::{build_edit_request, EditRequest};

    struct CannedBackend {
        response: Result<GenerateContentResponse, EditError>,
        calls: Arc<AtomicUsize>,
    }

    impl GenerationBackend for CannedBackend {
        fn name(&self) -> &str {
            "canned"
        }

        fn model(&self) -> &str {
            "canned-image-1"
        }

        fn generate_content(
            &self,
            _request: &EditRequest,
        ) -> Result<GenerateContentResponse, EditError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone()
        }
    }

    #[test]
    fn first_image_part_wins_over_interleaved_text() -> anyhow::Result<()> {
        let response = GenerateContentResponse::with_parts(vec![
            ResponsePart::text("Here is your edit"),
            ResponsePart::image(Some("image/jpeg"), "AAAA"),
            ResponsePart::image(Some("image/png"), "BBBB"),
        ]);
        let image = extract_edited_image(&response)?;
        assert_eq!(image, ImagePayload::from_base64("image/jpeg", "AAAA")?);
        Ok(())
    }

    #[test]
    fn missing_mime_defaults_to_png() -> anyhow::Result<()> {
        let response = GenerateContentResponse::with_parts(vec![ResponsePart::image(None, "AAAA")]);
        assert_eq!(extract_edited_image(&response)?.mime_type(), "image/png");
        Ok(())
    }

    #[test]
    fn only_first_candidate_is_considered() {
        let mut response =
            GenerateContentResponse::with_parts(vec![ResponsePart::text("refused")]);
        response.candidates.push(Candidate {
            content: Some(CandidateContent {
                parts: vec![ResponsePart::image(None, "AAAA")],
            }),
        });
        assert_eq!(
            extract_edited_image(&response),
            Err(EditError::TextOnlyResponse("refused".to_string()))
        );
    }

    #[test]
    fn no_candidates_fails() {
        assert_eq!(
            extract_edited_image(&GenerateContentResponse::default()),
            Err(EditError::NoCandidates)
        );
    }

    #[test]
    fn text_only_response_surfaces_text() {
        let response = GenerateContentResponse::with_parts(vec![
            ResponsePart::text(""),
            ResponsePart::text("cannot process this image"),
        ]);
        assert_eq!(
            extract_edited_image(&response),
            Err(EditError::TextOnlyResponse(
                "cannot process this image".to_string()
            ))
        );
    }

    #[test]
    fn empty_parts_and_missing_content_are_empty_responses() {
        assert_eq!(
            extract_edited_image(&GenerateContentResponse::with_parts(Vec::new())),
            Err(EditError::EmptyResponse)
        );
        let response = GenerateContentResponse {
            candidates: vec![Candidate { content: None }],
        };
        assert_eq!(extract_edited_image(&response), Err(EditError::EmptyResponse));
    }

    #[test]
    fn empty_inline_data_is_skipped() {
        let response = GenerateContentResponse::with_parts(vec![
            ResponsePart::image(Some("image/png"), ""),
            ResponsePart::text("no image today"),
        ]);
        assert_eq!(
            extract_edited_image(&response),
            Err(EditError::TextOnlyResponse("no image today".to_string()))
        );
    }

    #[test]
    fn undecodable_inline_data_is_malformed() {
        let response =
            GenerateContentResponse::with_parts(vec![ResponsePart::image(None, "not base64!")]);
        assert!(matches!(
            extract_edited_image(&response),
            Err(EditError::MalformedPayload(_))
        ));
    }

    #[test]
    fn response_json_accepts_both_field_spellings() -> anyhow::Result<()> {
        let camel: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [
                {"text": "ok"},
                {"inlineData": {"mimeType": "image/webp", "data": "AAAA"}}
            ]}}],
            "usageMetadata": {"totalTokenCount": 10}
        }))?;
        let snake: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [
                {"inline_data": {"mime_type": "image/webp", "data": "AAAA"}}
            ]}}]
        }))?;
        assert_eq!(extract_edited_image(&camel)?, extract_edited_image(&snake)?);
        assert_eq!(extract_edited_image(&camel)?.mime_type(), "image/webp");
        Ok(())
    }

    #[test]
    fn client_invokes_backend_once_and_extracts() -> anyhow::Result<()> {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = GenerationClient::new(Box::new(CannedBackend {
            response: Ok(GenerateContentResponse::with_parts(vec![ResponsePart::image(
                Some("image/png"),
                "BBBB",
            )])),
            calls: Arc::clone(&calls),
        }));
        let source = ImagePayload::from_base64("image/png", "AAAA")?;
        let request = build_edit_request(Some(&source), "add a hat", false)?;

        let image = client.invoke(&request)?;
        assert_eq!(image.base64_data(), "BBBB");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.backend_name(), "canned");
        assert_eq!(client.model(), "canned-image-1");
        Ok(())
    }

    #[test]
    fn client_passes_transport_errors_through() -> anyhow::Result<()> {
        let client = GenerationClient::new(Box::new(CannedBackend {
            response: Err(EditError::TransportError("connection reset".to_string())),
            calls: Arc::new(AtomicUsize::new(0)),
        }));
        let source = ImagePayload::from_base64("image/png", "AAAA")?;
        let request = build_edit_request(Some(&source), "add a hat", false)?;
        assert_eq!(
            client.invoke(&request),
            Err(EditError::TransportError("connection reset".to_string()))
        );
        Ok(())
    }
}
