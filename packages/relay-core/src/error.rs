//! Centralized error types for the relay core.
//!
//! - Per-layer `thiserror` enums live next to their code (`SoapError`,
//!   `GenaError`, `DiscoveryError`, `AudioError`, `RouterError`)
//! - [`ErrorCode`] gives each a machine-readable code
//! - [`RelayError`] maps onto HTTP status codes and JSON error bodies

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::audio::AudioError;
use crate::context::NetworkError;
use crate::hermes::RouterError;
use crate::sonos::discovery::DiscoveryError;
use crate::sonos::gena::GenaError;
use crate::sonos::soap::SoapError;

/// Trait for error types that provide machine-readable error codes.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

impl ErrorCode for DiscoveryError {
    fn code(&self) -> &'static str {
        match self {
            Self::SocketBind(_) => "socket_bind_failed",
            Self::NoInterfaces => "no_network_interfaces",
            Self::NoSpeakers(_) => "no_speakers_found",
            Self::Topology => "topology_unavailable",
        }
    }
}

impl ErrorCode for SoapError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "http_request_failed",
            Self::HttpStatus(_, _) => "http_error_status",
            Self::Fault { .. } => "soap_fault",
            Self::Parse => "soap_parse_error",
        }
    }
}

impl ErrorCode for GenaError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "http_request_failed",
            Self::SubscriptionFailed(_) => "gena_subscription_failed",
            Self::RenewalFailed(_) => "gena_renewal_failed",
            Self::MissingSid => "gena_missing_sid",
        }
    }
}

impl ErrorCode for AudioError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotRiff | Self::NotWave => "unsupported_audio",
            Self::MissingFormat | Self::MissingData | Self::Truncated => "malformed_wav",
            Self::ZeroByteRate => "invalid_wav_format",
        }
    }
}

impl ErrorCode for RouterError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnknownTopic(_) => "unknown_topic",
            Self::MalformedPayload { .. } => "malformed_payload",
        }
    }
}

/// Application-wide error type.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum RelayError {
    /// Speaker discovery failed.
    #[error("Discovery failed: {0}")]
    Discovery(String),

    /// SOAP or GENA request to a speaker failed.
    #[error("Speaker request failed: {0}")]
    Speaker(String),

    /// No cached clip under the requested name.
    #[error("Audio with this id not available: {0}")]
    AudioNotFound(String),

    /// Client sent an invalid or malformed request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Advertised address could not be determined.
    #[error("Network error: {0}")]
    Network(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// HTTP listener could not be started.
    #[error("Server error: {0}")]
    Server(String),
}

impl RelayError {
    /// Returns a machine-readable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Discovery(_) => "discovery_failed",
            Self::Speaker(_) => "speaker_error",
            Self::AudioNotFound(_) => "audio_not_found",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Network(_) => "network_error",
            Self::Configuration(_) => "configuration_error",
            Self::Server(_) => "server_error",
        }
    }

    /// Maps the error to an appropriate HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AudioNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convenient Result alias for application-wide operations.
pub type RelayResult<T> = Result<T, RelayError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<SoapError> for RelayError {
    fn from(err: SoapError) -> Self {
        Self::Speaker(err.to_string())
    }
}

impl From<GenaError> for RelayError {
    fn from(err: GenaError) -> Self {
        Self::Speaker(err.to_string())
    }
}

impl From<DiscoveryError> for RelayError {
    fn from(err: DiscoveryError) -> Self {
        Self::Discovery(err.to_string())
    }
}

impl From<NetworkError> for RelayError {
    fn from(err: NetworkError) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<std::io::Error> for RelayError {
    fn from(err: std::io::Error) -> Self {
        Self::Server(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_not_found_maps_to_404() {
        let err = RelayError::AudioNotFound("abc.wav".into());
        assert_eq!(err.code(), "audio_not_found");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert!(err.to_string().contains("abc.wav"));
    }

    #[test]
    fn layer_errors_have_stable_codes() {
        assert_eq!(SoapError::Parse.code(), "soap_parse_error");
        assert_eq!(GenaError::MissingSid.code(), "gena_missing_sid");
        assert_eq!(DiscoveryError::NoSpeakers(10000).code(), "no_speakers_found");
        assert_eq!(AudioError::NotRiff.code(), "unsupported_audio");
        assert_eq!(
            RouterError::UnknownTopic("x/y".into()).code(),
            "unknown_topic"
        );
    }

    #[test]
    fn soap_errors_convert_to_speaker_errors() {
        let err: RelayError = SoapError::fault("boom").into();
        assert_eq!(err.code(), "speaker_error");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
