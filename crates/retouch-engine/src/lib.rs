pub mod client;
pub mod config;
pub mod dryrun;
pub mod gemini;
pub mod request;
pub mod session;

use anyhow::{bail, Result};
use retouch_contracts::models::{EditModel, Provider};

pub use client::{extract_edited_image, GenerateContentResponse, GenerationBackend, GenerationClient};
pub use config::GeminiConfig;
pub use dryrun::DryrunBackend;
pub use gemini::GeminiBackend;
pub use request::{build_edit_request, EditRequest, HIGH_QUALITY_SUFFIX};
pub use session::{EditSession, PendingEdit};

/// Builds the transport for a resolved model. `config` is only needed for
/// hosted providers; its model name is replaced by `model.name`.
pub fn backend_for_model(
    model: &EditModel,
    config: Option<GeminiConfig>,
) -> Result<Box<dyn GenerationBackend>> {
    match model.provider {
        Provider::Dryrun => Ok(Box::new(DryrunBackend::new(model.name.clone()))),
        Provider::Gemini => {
            let Some(config) = config else {
                bail!("model '{}' needs Gemini credentials", model.name);
            };
            Ok(Box::new(GeminiBackend::new(
                config.with_model(model.name.clone()),
            )))
        }
    }
}
