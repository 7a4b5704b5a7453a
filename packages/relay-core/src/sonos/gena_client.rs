//! HTTP side of GENA: SUBSCRIBE, renew and UNSUBSCRIBE requests.

use reqwest::header::HeaderMap;
use reqwest::{Client, Method};

use crate::protocol_constants::GENA_SUBSCRIPTION_TIMEOUT_SECS;
use crate::sonos::gena::{GenaError, GenaResult};
use crate::sonos::services::SonosService;
use crate::sonos::utils::build_sonos_url;

/// A subscription granted by a speaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Granted {
    pub sid: String,
    pub timeout_secs: u64,
}

/// Reads the `TIMEOUT: Second-N` header, falling back to the requested timeout.
fn granted_timeout(headers: &HeaderMap) -> u64 {
    headers
        .get("TIMEOUT")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().strip_prefix("Second-"))
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(GENA_SUBSCRIPTION_TIMEOUT_SECS)
}

fn method(name: &'static [u8]) -> Method {
    // Both GENA verbs are valid RFC 7230 tokens
    Method::from_bytes(name).expect("GENA method names are valid tokens")
}

/// Thin wrapper over `reqwest` for the two GENA verbs.
#[derive(Clone)]
pub struct GenaClient {
    client: Client,
}

impl GenaClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Opens a new subscription on `service` with NOTIFY delivered to `callback_url`.
    pub async fn subscribe(
        &self,
        ip: &str,
        service: SonosService,
        callback_url: &str,
    ) -> GenaResult<Granted> {
        let response = self
            .client
            .request(method(b"SUBSCRIBE"), build_sonos_url(ip, service.event_path()))
            .header("CALLBACK", format!("<{}>", callback_url))
            .header("NT", "upnp:event")
            .header("TIMEOUT", format!("Second-{}", GENA_SUBSCRIPTION_TIMEOUT_SECS))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenaError::SubscriptionFailed(status.as_u16()));
        }

        let sid = response
            .headers()
            .get("SID")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or(GenaError::MissingSid)?;

        Ok(Granted {
            sid,
            timeout_secs: granted_timeout(response.headers()),
        })
    }

    /// Renews `sid`, returning the newly granted timeout.
    pub async fn renew(&self, ip: &str, service: SonosService, sid: &str) -> GenaResult<u64> {
        let response = self
            .client
            .request(method(b"SUBSCRIBE"), build_sonos_url(ip, service.event_path()))
            .header("SID", sid)
            .header("TIMEOUT", format!("Second-{}", GENA_SUBSCRIPTION_TIMEOUT_SECS))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenaError::RenewalFailed(status.as_u16()));
        }
        Ok(granted_timeout(response.headers()))
    }

    /// Cancels `sid`. Failures are only reported; the caller drops the subscription either way.
    pub async fn unsubscribe(&self, ip: &str, service: SonosService, sid: &str) -> bool {
        let result = self
            .client
            .request(method(b"UNSUBSCRIBE"), build_sonos_url(ip, service.event_path()))
            .header("SID", sid)
            .send()
            .await;
        matches!(result, Ok(r) if r.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn granted_timeout_reads_second_header() {
        let mut headers = HeaderMap::new();
        headers.insert("TIMEOUT", HeaderValue::from_static("Second-1800"));
        assert_eq!(granted_timeout(&headers), 1800);
    }

    #[test]
    fn granted_timeout_falls_back_when_missing_or_infinite() {
        assert_eq!(granted_timeout(&HeaderMap::new()), GENA_SUBSCRIPTION_TIMEOUT_SECS);

        let mut headers = HeaderMap::new();
        headers.insert("TIMEOUT", HeaderValue::from_static("infinite"));
        assert_eq!(granted_timeout(&headers), GENA_SUBSCRIPTION_TIMEOUT_SECS);
    }
}
