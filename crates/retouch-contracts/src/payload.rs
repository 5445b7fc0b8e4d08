use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Serialize;

use crate::error::EditError;

const DATA_URL_SCHEME: &str = "data:";
const BASE64_MARKER: &str = ";base64";

/// An image as a MIME type plus base64 text, ready to be sent to the model
/// or shown directly as a data URL.
///
/// Constructors validate both halves, so a value of this type always holds an
/// `image/*` MIME type and a non-empty, decodable body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImagePayload {
    mime_type: String,
    data: String,
}

impl ImagePayload {
    /// Wraps base64 text received from elsewhere (e.g. a model response part).
    pub fn from_base64(
        mime_type: impl Into<String>,
        data: impl Into<String>,
    ) -> Result<Self, EditError> {
        let mime_type = mime_type.into();
        let data = data.into();
        if !is_image_mime(&mime_type) {
            return Err(EditError::MalformedPayload(format!(
                "'{mime_type}' is not an image MIME type"
            )));
        }
        if data.is_empty() {
            return Err(EditError::MalformedPayload("empty image body".to_string()));
        }
        BASE64
            .decode(data.as_bytes())
            .map_err(|err| EditError::MalformedPayload(format!("invalid base64 body: {err}")))?;
        Ok(Self { mime_type, data })
    }

    /// Builds a payload from raw file contents and the MIME type the file
    /// picker declared for it.
    pub fn from_raw_file(bytes: &[u8], declared_mime: &str) -> Result<Self, EditError> {
        let mime_type = declared_mime.trim();
        if !is_image_mime(mime_type) {
            return Err(EditError::UnsupportedFileType(mime_type.to_string()));
        }
        if bytes.is_empty() {
            return Err(EditError::MalformedPayload("empty image file".to_string()));
        }
        Ok(Self {
            mime_type: mime_type.to_string(),
            data: BASE64.encode(bytes),
        })
    }

    /// Parses `data:<mime>;base64,<body>`.
    pub fn decode(embedded: &str) -> Result<Self, EditError> {
        let rest = embedded
            .trim()
            .strip_prefix(DATA_URL_SCHEME)
            .ok_or_else(|| EditError::MalformedPayload("missing 'data:' scheme".to_string()))?;
        let (header, body) = rest
            .split_once(',')
            .ok_or_else(|| EditError::MalformedPayload("missing ',' separator".to_string()))?;
        let mime_type = header.strip_suffix(BASE64_MARKER).ok_or_else(|| {
            EditError::MalformedPayload("missing ';base64' format tag".to_string())
        })?;
        Self::from_base64(mime_type, body)
    }

    pub fn encode(&self) -> String {
        format!(
            "{DATA_URL_SCHEME}{}{BASE64_MARKER},{}",
            self.mime_type, self.data
        )
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn base64_data(&self) -> &str {
        &self.data
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        // Validated at construction.
        BASE64.decode(self.data.as_bytes()).unwrap_or_default()
    }

    /// Decoded size without materialising the bytes.
    pub fn byte_len(&self) -> usize {
        let padding = self.data.bytes().rev().take_while(|b| *b == b'=').count();
        (self.data.len() / 4) * 3 - padding
    }

    pub fn file_extension(&self) -> &'static str {
        let lowered = self.mime_type.to_ascii_lowercase();
        if lowered.contains("jpeg") || lowered.contains("jpg") {
            return "jpg";
        }
        if lowered.contains("webp") {
            return "webp";
        }
        if lowered.contains("gif") {
            return "gif";
        }
        "png"
    }
}

fn is_image_mime(mime: &str) -> bool {
    let lowered = mime.to_ascii_lowercase();
    lowered
        .strip_prefix("image/")
        .map(|subtype| !subtype.trim().is_empty())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::ImagePayload;
    use crate::error::EditError;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    #[test]
    fn raw_file_round_trips_through_data_url() -> anyhow::Result<()> {
        let payload = ImagePayload::from_raw_file(PNG_MAGIC, "image/png")?;
        let embedded = payload.encode();
        assert!(embedded.starts_with("data:image/png;base64,"));
        assert_eq!(ImagePayload::decode(&embedded)?, payload);
        assert_eq!(payload.to_bytes(), PNG_MAGIC);
        assert_eq!(payload.byte_len(), PNG_MAGIC.len());
        Ok(())
    }

    #[test]
    fn decode_reads_mime_and_body() -> anyhow::Result<()> {
        let payload = ImagePayload::decode("data:image/jpeg;base64,/9j/4AAQ")?;
        assert_eq!(payload.mime_type(), "image/jpeg");
        assert_eq!(payload.base64_data(), "/9j/4AAQ");
        assert_eq!(payload.file_extension(), "jpg");
        Ok(())
    }

    #[test]
    fn decode_rejects_strings_without_format_tag() {
        for raw in [
            "",
            "iVBORw0KGgo=",
            "data:image/png,iVBORw0KGgo=",
            "data:image/png;base64",
            "data:text/plain;base64,aGVsbG8=",
            "data:image/png;base64,",
            "data:image/png;base64,not base64!",
        ] {
            assert!(
                matches!(
                    ImagePayload::decode(raw),
                    Err(EditError::MalformedPayload(_))
                ),
                "expected MalformedPayload for {raw:?}"
            );
        }
    }

    #[test]
    fn raw_file_requires_image_mime() {
        assert_eq!(
            ImagePayload::from_raw_file(PNG_MAGIC, "application/pdf"),
            Err(EditError::UnsupportedFileType("application/pdf".to_string()))
        );
        assert!(matches!(
            ImagePayload::from_raw_file(PNG_MAGIC, "image/"),
            Err(EditError::UnsupportedFileType(_))
        ));
        assert!(ImagePayload::from_raw_file(PNG_MAGIC, " IMAGE/PNG ").is_ok());
    }

    #[test]
    fn raw_file_rejects_empty_bytes() {
        assert!(matches!(
            ImagePayload::from_raw_file(&[], "image/png"),
            Err(EditError::MalformedPayload(_))
        ));
    }

    #[test]
    fn equality_requires_both_fields() -> anyhow::Result<()> {
        let png = ImagePayload::from_base64("image/png", "AAAA")?;
        let jpeg = ImagePayload::from_base64("image/jpeg", "AAAA")?;
        let other = ImagePayload::from_base64("image/png", "AAAB")?;
        assert_ne!(png, jpeg);
        assert_ne!(png, other);
        assert_eq!(png, ImagePayload::from_base64("image/png", "AAAA")?);
        Ok(())
    }
}
