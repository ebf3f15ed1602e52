pub mod engine;

pub use engine::SessionEngine;

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no active session {0}")]
    NotFound(Uuid),
    #[error(transparent)]
    Config(#[from] crosstalk_transcript::config::ConfigError),
}
