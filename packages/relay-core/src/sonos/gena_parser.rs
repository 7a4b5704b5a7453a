//! Parsing of AVTransport NOTIFY bodies.

use crate::sonos::types::TransportState;
use crate::sonos::utils::{extract_empty_val_attrs, extract_xml_text};

/// Extracts the transport state from an AVTransport `LastChange` event.
///
/// Returns `None` when the event does not carry a `TransportState` (Sonos
/// also sends metadata-only changes).
#[must_use]
pub fn parse_transport_state(body: &str) -> Option<TransportState> {
    let last_change = extract_xml_text(body, "LastChange")?;
    // LastChange is XML escaped inside XML; extract_xml_text already decoded one layer
    let attrs = extract_empty_val_attrs(&last_change, &["TransportState"]);
    attrs.get("TransportState")?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const STOPPED_NOTIFY: &str = r#"<?xml version="1.0"?>
<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
  <e:property>
    <LastChange>&lt;Event xmlns=&quot;urn:schemas-upnp-org:metadata-1-0/AVT/&quot;&gt;&lt;InstanceID val=&quot;0&quot;&gt;&lt;TransportState val=&quot;STOPPED&quot;/&gt;&lt;CurrentPlayMode val=&quot;NORMAL&quot;/&gt;&lt;/InstanceID&gt;&lt;/Event&gt;</LastChange>
  </e:property>
</e:propertyset>"#;

    const METADATA_ONLY_NOTIFY: &str = r#"<?xml version="1.0"?>
<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
  <e:property>
    <LastChange>&lt;Event&gt;&lt;InstanceID val=&quot;0&quot;&gt;&lt;CurrentTrackURI val=&quot;http://x/a.wav&quot;/&gt;&lt;/InstanceID&gt;&lt;/Event&gt;</LastChange>
  </e:property>
</e:propertyset>"#;

    #[test]
    fn extracts_stopped_state() {
        assert_eq!(parse_transport_state(STOPPED_NOTIFY), Some(TransportState::Stopped));
    }

    #[test]
    fn extracts_playing_state() {
        let body = STOPPED_NOTIFY.replace("STOPPED", "PLAYING");
        assert_eq!(parse_transport_state(&body), Some(TransportState::Playing));
    }

    #[test]
    fn events_without_transport_state_yield_none() {
        assert_eq!(parse_transport_state(METADATA_ONLY_NOTIFY), None);
        assert_eq!(parse_transport_state(""), None);
    }
}
