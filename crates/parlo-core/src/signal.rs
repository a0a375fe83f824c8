use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Signaling message exchanged with the relay, one JSON object per text
/// frame. The relay is blind to the payload; only the two endpoints
/// interpret it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignalMessage {
    /// Session description produced by the caller.
    Offer { sdp: String },

    /// Session description produced by the callee.
    Answer { sdp: String },

    /// One ICE candidate. `label` is the media-line index, carried as a
    /// string on the wire.
    Candidate { label: String, candidate: String },

    /// Remote side hung up.
    Bye,

    /// Any tag we do not recognize. Consumers treat this as a no-op
    /// rather than an error, so unknown peers cannot kill the session.
    #[serde(other)]
    Unknown,
}

impl SignalMessage {
    /// Serialize to the wire form (JSON text).
    pub fn to_text(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::serialization)
    }

    /// Parse a frame received from the relay.
    ///
    /// Parsing is stateless: an `answer` is accepted here even if no offer
    /// has been sent yet. Ordering is the session layer's concern.
    pub fn from_text(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(Error::serialization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offer_round_trip() {
        let msg = SignalMessage::Offer {
            sdp: "v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\n".to_string(),
        };
        let text = msg.to_text().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "offer");
        assert_eq!(value["sdp"], "v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\n");
        assert_eq!(SignalMessage::from_text(&text).unwrap(), msg);
    }

    #[test]
    fn answer_round_trip() {
        let msg = SignalMessage::Answer {
            sdp: "v=0".to_string(),
        };
        let text = msg.to_text().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "answer");
        assert_eq!(SignalMessage::from_text(&text).unwrap(), msg);
    }

    #[test]
    fn candidate_round_trip() {
        let msg = SignalMessage::Candidate {
            label: "0".to_string(),
            candidate: "candidate:1927371098 1 udp 1694506751 127.0.0.1 55935 typ host".to_string(),
        };
        let text = msg.to_text().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "candidate");
        assert_eq!(value["label"], "0");
        assert_eq!(SignalMessage::from_text(&text).unwrap(), msg);
    }

    #[test]
    fn bye_has_no_payload() {
        let text = SignalMessage::Bye.to_text().unwrap();
        assert_eq!(text, r#"{"type":"bye"}"#);
        assert_eq!(SignalMessage::from_text(&text).unwrap(), SignalMessage::Bye);
    }

    #[test]
    fn candidate_ignores_extra_fields() {
        let text = r#"{"type":"candidate","label":"1","candidate":"candidate:0 1 udp 1 10.0.0.1 9 typ host","sdpMid":"audio","priority":42}"#;
        let msg = SignalMessage::from_text(text).unwrap();
        assert_eq!(
            msg,
            SignalMessage::Candidate {
                label: "1".to_string(),
                candidate: "candidate:0 1 udp 1 10.0.0.1 9 typ host".to_string(),
            }
        );
    }

    #[test]
    fn unknown_tag_is_accepted() {
        let msg = SignalMessage::from_text(r#"{"type":"renegotiate","sdp":"v=0"}"#).unwrap();
        assert_eq!(msg, SignalMessage::Unknown);
    }

    #[test]
    fn answer_parses_without_prior_offer() {
        // The parser carries no negotiation state; ordering checks live in
        // the session layer.
        let msg = SignalMessage::from_text(r#"{"type":"answer","sdp":"v=0"}"#).unwrap();
        assert!(matches!(msg, SignalMessage::Answer { .. }));
    }

    #[test]
    fn garbage_is_a_serialization_error() {
        let err = SignalMessage::from_text("not json").unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
