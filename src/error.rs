use crate::caption::ScriptClass;
use std::path::PathBuf;
use thiserror::Error;

pub type ShortsResult<T> = Result<T, ShortsError>;

#[derive(Error, Debug)]
pub enum ShortsError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A chunk reaches past the end of the master audio track.
    #[error("chunk {chunk} ends at {end:.3}s but the master track is only {available:.3}s long")]
    Range {
        chunk: usize,
        end: f64,
        available: f64,
    },

    #[error("{class} font unavailable at {}: {reason}", path.display())]
    FontResource {
        class: ScriptClass,
        path: PathBuf,
        reason: String,
    },
}

impl ShortsError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        ShortsError::Configuration(message.into())
    }
}
