//! Shared helpers for Sonos XML payloads and URLs.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

/// Default Sonos speaker control port.
pub const SONOS_PORT: u16 = 1400;

// ─────────────────────────────────────────────────────────────────────────────
// XML Parsing Utilities
// ─────────────────────────────────────────────────────────────────────────────

/// Extracts text content from the first occurrence of an XML element.
///
/// Matches on the local name, so namespace prefixes are ignored. Entities in
/// the text are decoded.
///
/// # Example
/// ```ignore
/// let xml = r#"<u:CurrentVolume>42</u:CurrentVolume>"#;
/// assert_eq!(extract_xml_text(xml, "CurrentVolume"), Some("42".to_string()));
/// ```
pub fn extract_xml_text(xml: &str, element_name: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let target_bytes = element_name.as_bytes();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == target_bytes => {
                if let Ok(text) = reader.read_text(e.name()) {
                    let decoded = html_escape::decode_html_entities(&text);
                    return Some(decoded.to_string());
                }
            }
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == target_bytes => {
                return Some(String::new());
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    None
}

/// Extracts `val` attributes from empty XML elements.
///
/// UPnP `LastChange` payloads carry state as `<TransportState val="PLAYING"/>`.
/// Only elements that exist and carry a `val` attribute are returned.
pub fn extract_empty_val_attrs(xml: &str, element_names: &[&str]) -> HashMap<String, String> {
    let mut result = HashMap::new();
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let targets: Vec<&[u8]> = element_names.iter().map(|s| s.as_bytes()).collect();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) => {
                let local = e.local_name();
                let local_ref = local.as_ref();
                if let Some(&name) = targets.iter().find(|&&t| t == local_ref) {
                    if let Some(val) = get_xml_attr(e, b"val") {
                        let key = std::str::from_utf8(name).unwrap_or_default();
                        result.insert(key.to_string(), val);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    result
}

/// Gets an attribute value from an XML element.
pub fn get_xml_attr(elem: &BytesStart, attr_name: &[u8]) -> Option<String> {
    elem.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == attr_name)
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

/// Extracts the host from a UPnP Location URL.
///
/// `"http://192.168.1.100:1400/xml/device_description.xml"` → `"192.168.1.100"`.
pub fn extract_ip_from_location(location: &str) -> Option<String> {
    let stripped = location.strip_prefix("http://")?;
    let host_end = stripped.find(':')?;
    Some(stripped[..host_end].to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// URL Building
// ─────────────────────────────────────────────────────────────────────────────

/// Builds a Sonos speaker URL for the given IP and endpoint.
pub fn build_sonos_url(ip: &str, endpoint: &str) -> String {
    format!("http://{}:{}{}", ip, SONOS_PORT, endpoint)
}

// ─────────────────────────────────────────────────────────────────────────────
// XML Encoding
// ─────────────────────────────────────────────────────────────────────────────

/// Escapes the five XML special characters for embedding in XML content.
///
/// Used for SOAP arguments and DIDL-Lite metadata values.
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
