use anyhow::Context;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use retouch_contracts::EditError;

use crate::client::{GenerateContentResponse, GenerationBackend};
use crate::config::GeminiConfig;
use crate::request::EditRequest;

const ERROR_BODY_MAX_CHARS: usize = 512;
const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiBackend {
    config: GeminiConfig,
    http: HttpClient,
}

impl GeminiBackend {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            config,
            http: HttpClient::new(),
        }
    }

    pub fn endpoint(&self) -> String {
        let trimmed = self.config.model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.config.api_base, model_path)
    }
}

impl GenerationBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn generate_content(
        &self,
        request: &EditRequest,
    ) -> Result<GenerateContentResponse, EditError> {
        let endpoint = self.endpoint();
        let response = self
            .http
            .post(&endpoint)
            .header(API_KEY_HEADER, self.config.api_key.as_str())
            .timeout(self.config.request_timeout)
            .json(&request.body())
            .send()
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("Gemini request failed ({})", self.config.model))
            .map_err(|err| EditError::TransportError(error_chain_text(&err, 1024)))?;
        response_or_error("Gemini", response)
    }
}

fn response_or_error(
    provider: &str,
    response: HttpResponse,
) -> Result<GenerateContentResponse, EditError> {
    let status = response.status();
    let code = status.as_u16();
    let body = response.text().map_err(|err| {
        EditError::TransportError(format!(
            "{provider} response body read failed: {}",
            err.without_url()
        ))
    })?;
    if !status.is_success() {
        return Err(EditError::TransportError(format!(
            "{provider} request failed ({code}): {}",
            truncate_text(&body, ERROR_BODY_MAX_CHARS)
        )));
    }
    serde_json::from_str(&body).map_err(|err| {
        EditError::TransportError(format!("{provider} returned invalid JSON payload: {err}"))
    })
}

/// Flattens an error and its causes into one line, skipping repeats.
pub(crate) fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts
            .last()
            .map(|existing| existing == trimmed)
            .unwrap_or(false)
        {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use anyhow::anyhow;
    use retouch_contracts::events::EventWriter;
    use retouch_contracts::{EditError, ImagePayload};

    use super::{error_chain_text, truncate_text, GeminiBackend};
    use crate::client::{GenerationBackend, GenerationClient};
    use crate::config::GeminiConfig;
    use crate::request::build_edit_request;
    use crate::session::EditSession;

    #[test]
    fn endpoint_prefixes_models_path() {
        let backend = GeminiBackend::new(GeminiConfig::new("key"));
        assert_eq!(
            backend.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-image:generateContent"
        );

        let prefixed = GeminiBackend::new(
            GeminiConfig::new("key")
                .with_api_base("http://localhost:9/v1beta/")
                .with_model("models/gemini-3-pro-image-preview"),
        );
        assert_eq!(
            prefixed.endpoint(),
            "http://localhost:9/v1beta/models/gemini-3-pro-image-preview:generateContent"
        );
        assert_eq!(prefixed.name(), "gemini");
        assert_eq!(prefixed.model(), "models/gemini-3-pro-image-preview");
    }

    #[test]
    fn unreachable_host_is_a_transport_error() -> anyhow::Result<()> {
        // Port 9 (discard) on localhost refuses connections in test sandboxes.
        let mut config = GeminiConfig::new("key").with_api_base("http://127.0.0.1:9/v1beta");
        config.request_timeout = Duration::from_secs(2);
        let client = GenerationClient::new(Box::new(GeminiBackend::new(config)));
        let source = ImagePayload::from_base64("image/png", "AAAA")?;
        let request = build_edit_request(Some(&source), "add a hat", false)?;

        match client.invoke(&request) {
            Err(EditError::TransportError(message)) => {
                assert!(message.starts_with("Gemini request failed"), "{message}");
            }
            other => panic!("expected transport error, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn api_key_stays_out_of_errors_and_event_log() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let events = temp.path().join("events.jsonl");
        let mut config =
            GeminiConfig::new("SECRET-KEY-123").with_api_base("http://127.0.0.1:9/v1beta");
        config.request_timeout = Duration::from_secs(2);
        let client = GenerationClient::new(Box::new(GeminiBackend::new(config)));
        let mut session = EditSession::new().with_events(EventWriter::new(&events, "session-1"));
        session.upload_source(&[1, 2, 3], "image/png")?;

        let err = session.request_edit(&client, "add a hat", false).unwrap_err();
        assert!(matches!(err, EditError::TransportError(_)));
        assert!(!err.to_string().contains("SECRET-KEY-123"), "{err}");
        assert!(!err.to_string().contains("key="), "{err}");

        let log = fs::read_to_string(&events)?;
        assert!(log.contains("edit_failed"));
        assert!(!log.contains("SECRET-KEY-123"));
        Ok(())
    }

    #[test]
    fn error_chain_text_preserves_nested_contexts() {
        let err = anyhow!("connection refused")
            .context("Gemini request failed (gemini-2.5-flash-image)");
        assert_eq!(
            error_chain_text(&err, 1024),
            "Gemini request failed (gemini-2.5-flash-image) | caused by: connection refused"
        );
    }

    #[test]
    fn truncate_text_marks_cut() {
        assert_eq!(truncate_text("abcdef", 3), "abc…");
        assert_eq!(truncate_text("abc", 3), "abc");
    }
}
