pub mod chat;
pub mod error;
pub mod events;
pub mod history;
pub mod models;
pub mod payload;
pub mod state;

pub use error::EditError;
pub use history::{EditHistory, EditRecord};
pub use payload::ImagePayload;
pub use state::Phase;
