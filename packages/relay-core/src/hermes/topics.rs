//! Hermes topic names.

/// Inbound topics the relay reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HermesTopic {
    /// `hermes/audioServer/{site_id}/playBytes/{request_id}`
    PlayBytes { site_id: String, request_id: String },
    /// `hermes/hotword/{hotword_id}/detected`
    HotwordDetected,
    /// `hermes/dialogueManager/sessionEnded`
    SessionEnded,
}

const PLAY_BYTES_FILTER: &str = "hermes/audioServer/+/playBytes/#";
const HOTWORD_FILTER: &str = "hermes/hotword/+/detected";
const SESSION_ENDED: &str = "hermes/dialogueManager/sessionEnded";

impl HermesTopic {
    /// Parses a concrete topic. Returns `None` for anything else.
    #[must_use]
    pub fn parse(topic: &str) -> Option<Self> {
        if topic == SESSION_ENDED {
            return Some(Self::SessionEnded);
        }

        let parts: Vec<&str> = topic.split('/').collect();
        match parts.as_slice() {
            ["hermes", "audioServer", site, "playBytes", request]
                if !site.is_empty() && !request.is_empty() =>
            {
                Some(Self::PlayBytes {
                    site_id: (*site).to_string(),
                    request_id: (*request).to_string(),
                })
            }
            ["hermes", "hotword", id, "detected"] if !id.is_empty() => Some(Self::HotwordDetected),
            _ => None,
        }
    }
}

/// Subscription filters for the enabled features.
#[must_use]
pub fn subscription_filters(hotword: bool) -> Vec<&'static str> {
    let mut filters = vec![PLAY_BYTES_FILTER];
    if hotword {
        filters.push(HOTWORD_FILTER);
        filters.push(SESSION_ENDED);
    }
    filters
}

/// Topic announcing that a clip finished playing on a site.
#[must_use]
pub fn play_finished(site_id: &str) -> String {
    format!("hermes/audioServer/{}/playFinished", site_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_play_bytes() {
        assert_eq!(
            HermesTopic::parse("hermes/audioServer/kitchen/playBytes/abc-123"),
            Some(HermesTopic::PlayBytes {
                site_id: "kitchen".into(),
                request_id: "abc-123".into(),
            })
        );
    }

    #[test]
    fn rejects_incomplete_or_foreign_topics() {
        assert_eq!(HermesTopic::parse("hermes/audioServer//playBytes/x"), None);
        assert_eq!(HermesTopic::parse("hermes/audioServer/k/playBytes/"), None);
        assert_eq!(HermesTopic::parse("hermes/audioServer/k/playBytes/a/b"), None);
        assert_eq!(HermesTopic::parse("hermes/audioServer/k/playFinished"), None);
        assert_eq!(HermesTopic::parse("zigbee/kitchen/light"), None);
    }

    #[test]
    fn parses_dialogue_topics() {
        assert_eq!(
            HermesTopic::parse("hermes/hotword/default/detected"),
            Some(HermesTopic::HotwordDetected)
        );
        assert_eq!(
            HermesTopic::parse("hermes/dialogueManager/sessionEnded"),
            Some(HermesTopic::SessionEnded)
        );
    }

    #[test]
    fn hotword_filters_only_when_enabled() {
        assert_eq!(subscription_filters(false), vec![PLAY_BYTES_FILTER]);
        assert_eq!(subscription_filters(true).len(), 3);
    }

    #[test]
    fn play_finished_topic() {
        assert_eq!(play_finished("office"), "hermes/audioServer/office/playFinished");
    }
}
