//! Zone group topology: which speakers exist and which room each belongs to.

use std::collections::BTreeMap;

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use reqwest::Client;

use crate::sonos::services::SonosService;
use crate::sonos::soap::{SoapRequest, SoapResult};
use crate::sonos::types::ZoneGroupMember;
use crate::sonos::utils::{extract_ip_from_location, extract_xml_text, get_xml_attr};

/// Parses unescaped ZoneGroupState XML into the list of controllable speakers.
///
/// Skipped:
/// - zone bridges (`IsZoneBridge="1"`), which cannot play audio
/// - invisible members (`Invisible="1"`, e.g. the secondary of a stereo pair)
/// - home theater satellites, which follow their primary
/// - members missing a UUID, location or zone name
pub fn parse_zone_group_members(xml: &str) -> Vec<ZoneGroupMember> {
    let mut members = Vec::new();
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.name().as_ref() == b"ZoneGroupMember" =>
            {
                if get_xml_attr(e, b"IsZoneBridge").as_deref() == Some("1")
                    || get_xml_attr(e, b"Invisible").as_deref() == Some("1")
                {
                    buf.clear();
                    continue;
                }

                let uuid = get_xml_attr(e, b"UUID");
                let ip = get_xml_attr(e, b"Location").and_then(|l| extract_ip_from_location(&l));
                let zone_name = get_xml_attr(e, b"ZoneName")
                    .map(|z| html_escape::decode_html_entities(&z).to_string());

                if let (Some(uuid), Some(ip), Some(zone_name)) = (uuid, ip, zone_name) {
                    members.push(ZoneGroupMember {
                        uuid,
                        ip,
                        zone_name,
                    });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                log::warn!("[Discovery] XML parse error in zone groups: {}", e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    members
}

/// Groups speakers into rooms by zone name, preserving topology order within a room.
pub fn group_by_room(members: Vec<ZoneGroupMember>) -> BTreeMap<String, Vec<ZoneGroupMember>> {
    let mut rooms: BTreeMap<String, Vec<ZoneGroupMember>> = BTreeMap::new();
    for member in members {
        let room = rooms.entry(member.zone_name.clone()).or_default();
        if !room.iter().any(|m| m.uuid == member.uuid) {
            room.push(member);
        }
    }
    rooms
}

/// Fetches the household topology from any reachable speaker.
///
/// # Arguments
/// * `client` - The HTTP client to use for the request
/// * `ip` - IP address of any Sonos speaker on the network
pub async fn get_zone_group_members(client: &Client, ip: &str) -> SoapResult<Vec<ZoneGroupMember>> {
    let response = SoapRequest::new(
        client,
        ip,
        SonosService::ZoneGroupTopology,
        "GetZoneGroupState",
    )
    .send()
    .await?;

    let Some(state) = extract_xml_text(&response, "ZoneGroupState") else {
        return Ok(Vec::new());
    };
    Ok(parse_zone_group_members(&state))
}
