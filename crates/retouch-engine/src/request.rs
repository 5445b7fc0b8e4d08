use retouch_contracts::{EditError, ImagePayload};
use serde::Serialize;
use serde_json::{Map, Value};

/// Appended to the instruction in high-quality mode. The edit model only
/// takes prompt-level quality hints, never an output size.
pub const HIGH_QUALITY_SUFFIX: &str =
    " . High quality, 4k resolution, highly detailed, sharp focus, masterpiece.";

/// A single outbound edit: one image attachment followed by one text
/// instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct EditRequest {
    image: ImagePayload,
    prompt: String,
    high_quality: bool,
}

impl EditRequest {
    pub fn image(&self) -> &ImagePayload {
        &self.image
    }

    /// The prompt as sent, including any quality suffix.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn high_quality(&self) -> bool {
        self.high_quality
    }

    pub fn parts(&self) -> Vec<RequestPart> {
        vec![
            RequestPart::InlineData(InlineData {
                mime_type: self.image.mime_type().to_string(),
                data: self.image.base64_data().to_string(),
            }),
            RequestPart::Text(self.prompt.clone()),
        ]
    }

    /// `generateContent` request body.
    pub fn body(&self) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![RequestContent {
                role: "user".to_string(),
                parts: self.parts(),
            }],
            generation_config: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<RequestContent>,
    pub generation_config: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestContent {
    pub role: String,
    pub parts: Vec<RequestPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestPart {
    InlineData(InlineData),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

pub fn build_edit_request(
    image: Option<&ImagePayload>,
    instruction: &str,
    high_quality: bool,
) -> Result<EditRequest, EditError> {
    let instruction = instruction.trim();
    if instruction.is_empty() {
        return Err(EditError::EmptyInstruction);
    }
    let image = image.ok_or(EditError::MissingImage)?;
    let prompt = if high_quality {
        format!("{instruction}{HIGH_QUALITY_SUFFIX}")
    } else {
        instruction.to_string()
    };
    Ok(EditRequest {
        image: image.clone(),
        prompt,
        high_quality,
    })
}
