//! Clip storage served to speakers over HTTP.

mod cache;
pub mod wav;

use thiserror::Error;

pub use cache::AudioCache;

/// Errors raised while inspecting clip bytes.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("not a RIFF file")]
    NotRiff,

    #[error("RIFF file is not WAVE")]
    NotWave,

    #[error("data chunk appears before the fmt chunk")]
    MissingFormat,

    #[error("no data chunk")]
    MissingData,

    #[error("fmt chunk declares a zero byte rate")]
    ZeroByteRate,

    #[error("truncated WAV header")]
    Truncated,
}
