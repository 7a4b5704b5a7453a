//! DIDL-Lite metadata for clips pushed to Sonos speakers.
//!
//! Sonos wants metadata alongside every `SetAVTransportURI`; without it the
//! controller app shows the raw URL. Clips get a title derived from the file
//! name and a `musicTrack` class so the speaker treats them as finite media.

use crate::protocol_constants::APP_NAME;
use crate::sonos::utils::escape_xml;

/// Returns the MIME type Sonos should expect for `uri`, keyed on extension.
fn mime_type_for(uri: &str) -> &'static str {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    match path.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "wav" => "audio/wav",
        Some(ext) if ext == "mp3" => "audio/mpeg",
        Some(ext) if ext == "flac" => "audio/flac",
        Some(ext) if ext == "ogg" => "audio/ogg",
        _ => "audio/wav",
    }
}

/// Title shown in the Sonos app: the last path segment without its extension.
fn title_for(uri: &str) -> String {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    let file = path.rsplit('/').next().unwrap_or(path);
    let stem = file.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(file);
    if stem.is_empty() {
        APP_NAME.to_string()
    } else {
        stem.to_string()
    }
}

/// Formats DIDL-Lite metadata for a one-shot clip at `uri`.
pub fn clip_metadata(uri: &str) -> String {
    let mut didl = String::from(
        r#"<DIDL-Lite xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/" xmlns:r="urn:schemas-rinconnetworks-com:metadata-1-0/" xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/">"#,
    );
    didl.push_str(r#"<item id="-1" parentID="-1" restricted="true">"#);
    didl.push_str(&format!(
        r#"<res protocolInfo="http-get:*:{}:*">{}</res>"#,
        mime_type_for(uri),
        escape_xml(uri)
    ));
    didl.push_str(&format!("<dc:title>{}</dc:title>", escape_xml(&title_for(uri))));
    didl.push_str(&format!("<dc:creator>{}</dc:creator>", escape_xml(APP_NAME)));
    didl.push_str("<upnp:class>object.item.audioItem.musicTrack</upnp:class>");
    didl.push_str("</item></DIDL-Lite>");
    didl
}
