use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{ImageFormat, Rgb, RgbImage};
use retouch_contracts::EditError;
use sha2::{Digest, Sha256};

use crate::client::{GenerateContentResponse, GenerationBackend, ResponsePart};
use crate::request::EditRequest;

const FALLBACK_DIMS: (u32, u32) = (256, 256);

/// Offline stand-in for the hosted model. Answers every request with a note
/// and a flat PNG the size of the input, coloured from the prompt.
#[derive(Debug, Clone)]
pub struct DryrunBackend {
    model: String,
}

impl DryrunBackend {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

impl Default for DryrunBackend {
    fn default() -> Self {
        Self::new("dryrun-image-1")
    }
}

impl GenerationBackend for DryrunBackend {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn generate_content(
        &self,
        request: &EditRequest,
    ) -> Result<GenerateContentResponse, EditError> {
        let (width, height) = input_dims(&request.image().to_bytes());
        let png = render_placeholder(width, height, request.prompt())?;
        Ok(GenerateContentResponse::with_parts(vec![
            ResponsePart::text(format!("dryrun edit: {}", request.prompt())),
            ResponsePart::image(Some("image/png"), BASE64.encode(png)),
        ]))
    }
}

fn input_dims(bytes: &[u8]) -> (u32, u32) {
    image::load_from_memory(bytes)
        .map(|decoded| (decoded.width().max(1), decoded.height().max(1)))
        .unwrap_or(FALLBACK_DIMS)
}

fn render_placeholder(width: u32, height: u32, prompt: &str) -> Result<Vec<u8>, EditError> {
    let (r, g, b) = color_from_prompt(prompt);
    let image = RgbImage::from_pixel(width, height, Rgb([r, g, b]));
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|err| EditError::TransportError(format!("dryrun render failed: {err}")))?;
    Ok(out.into_inner())
}

fn color_from_prompt(prompt: &str) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}
