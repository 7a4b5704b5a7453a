//! Low-level SOAP transport for UPnP control of Sonos speakers.
//!
//! Builds envelopes, posts them to the speaker's control URL and turns
//! fault responses into [`SoapError`]s. Typed commands live in `speaker.rs`.

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;

use super::services::SonosService;
use super::utils::{build_sonos_url, escape_xml, extract_xml_text};
use crate::protocol_constants::SOAP_TIMEOUT_SECS;

/// UPnP error codes Sonos returns while the transport is busy changing state.
///
/// - 701: transition not available
/// - 714: illegal seek target (previous source still loading)
/// - 716: resource not found (device initialising)
const TRANSIENT_UPNP_CODES: [u16; 3] = [701, 714, 716];

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur during SOAP operations with Sonos speakers.
#[derive(Debug, Error)]
pub enum SoapError {
    /// HTTP request to the speaker failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Speaker returned a non-success HTTP status without a SOAP fault.
    #[error("HTTP error {0}: {1}")]
    HttpStatus(u16, String),

    /// Speaker returned a SOAP fault. Carries the UPnP error code when present.
    #[error("SOAP fault: {message}")]
    Fault {
        /// UPnP `errorCode` from the fault detail.
        code: Option<u16>,
        /// `faultstring` or a synthesized description.
        message: String,
    },

    /// Response did not contain the expected value.
    #[error("Failed to parse SOAP response")]
    Parse,
}

/// Convenient Result alias for SOAP operations.
pub type SoapResult<T> = Result<T, SoapError>;

impl SoapError {
    /// Creates a fault without a UPnP error code.
    pub fn fault(message: impl Into<String>) -> Self {
        Self::Fault {
            code: None,
            message: message.into(),
        }
    }

    /// Returns true if the operation should be retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            SoapError::Fault {
                code: Some(code), ..
            } => TRANSIENT_UPNP_CODES.contains(code),
            SoapError::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Envelope
// ─────────────────────────────────────────────────────────────────────────────

/// Builds a SOAP envelope for `action` on `service`.
///
/// The envelope is a single line: Sonos rejects XML with whitespace before
/// the root element.
fn build_envelope(service: SonosService, action: &str, args: &[(&str, String)]) -> String {
    let mut body = format!(
        r#"<?xml version="1.0" encoding="utf-8"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body><u:{} xmlns:u="{}">"#,
        action,
        service.urn()
    );
    for (key, value) in args {
        body.push_str(&format!("<{key}>{}</{key}>", escape_xml(value)));
    }
    body.push_str(&format!("</u:{}></s:Body></s:Envelope>", action));
    body
}

/// Converts a fault body into a [`SoapError::Fault`].
fn parse_fault(body: &str) -> SoapError {
    let code = extract_xml_text(body, "errorCode").and_then(|c| c.trim().parse().ok());
    let message = extract_xml_text(body, "faultstring").unwrap_or_else(|| "Unknown SOAP fault".into());
    let message = match code {
        Some(code) => format!("{} (UPnP error {})", message, code),
        None => message,
    };
    SoapError::Fault { code, message }
}

// ─────────────────────────────────────────────────────────────────────────────
// SOAP Request Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Fluent builder for a single SOAP action against one speaker.
///
/// # Example
/// ```ignore
/// let response = SoapRequest::new(&client, "192.168.1.100", SonosService::AVTransport, "Pause")
///     .instance_id()
///     .send()
///     .await?;
/// ```
pub struct SoapRequest<'a> {
    client: &'a Client,
    ip: &'a str,
    service: SonosService,
    action: &'a str,
    args: Vec<(&'a str, String)>,
}

impl<'a> SoapRequest<'a> {
    /// Starts a request for `action` on `service` at the speaker `ip`.
    #[must_use]
    pub fn new(client: &'a Client, ip: &'a str, service: SonosService, action: &'a str) -> Self {
        Self {
            client,
            ip,
            service,
            action,
            args: Vec::new(),
        }
    }

    /// Adds an argument. Arguments are serialized in insertion order.
    #[must_use]
    pub fn arg(mut self, key: &'a str, value: impl Into<String>) -> Self {
        self.args.push((key, value.into()));
        self
    }

    /// Adds the `InstanceID=0` argument every AVTransport/RenderingControl action takes.
    #[must_use]
    pub fn instance_id(self) -> Self {
        self.arg("InstanceID", "0")
    }

    /// Sends the request and returns the raw response body.
    pub async fn send(self) -> SoapResult<String> {
        let url = build_sonos_url(self.ip, self.service.control_path());
        let body = build_envelope(self.service, self.action, &self.args);

        log::debug!("[SOAP] {} -> {} ({} bytes)", self.action, url, body.len());

        let start = std::time::Instant::now();
        let res = self
            .client
            .post(&url)
            .header("Content-Type", "text/xml; charset=\"utf-8\"")
            .header(
                "SOAPAction",
                format!("\"{}#{}\"", self.service.urn(), self.action),
            )
            .body(body)
            .timeout(Duration::from_secs(SOAP_TIMEOUT_SECS))
            .send()
            .await?;

        let status = res.status();
        let text = res.text().await?;
        log::debug!(
            "[SOAP] {} on {} completed in {:?} ({})",
            self.action,
            self.ip,
            start.elapsed(),
            status
        );

        // Faults usually arrive with a 500 status, so check them first
        if text.contains(":Fault>") {
            return Err(parse_fault(&text));
        }
        if !status.is_success() {
            return Err(SoapError::HttpStatus(status.as_u16(), text));
        }
        Ok(text)
    }
}
