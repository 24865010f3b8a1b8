//! JSON-lines host protocol.
//!
//! The host writes one [`HostMessage`] per line. Blank lines are skipped;
//! a line that fails to decode is reported to the caller, which logs it and
//! moves on.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A message from the video host to the plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HostMessage {
    /// Registration: the host assigns the plugin its id.
    SetPluginId { id: String },
    /// Plugin metadata from the host's configuration; logged only.
    SetMetadata {
        #[serde(default)]
        metadata: Value,
    },
    /// A raw player event with its (possibly array-wrapped) params.
    Event {
        event: String,
        #[serde(default)]
        params: Option<Value>,
    },
    /// The viewer left the page.
    SessionEnd,
    /// The host is done with this plugin instance.
    Destroy,
}

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("malformed host message on line {line}: {source}")]
    Decode {
        line: usize,
        source: serde_json::Error,
    },
    #[error("failed to read host input: {0}")]
    Read(#[from] std::io::Error),
    #[error("plugin runner stopped before the message was delivered")]
    RunnerClosed,
}

/// Decode one protocol line. Blank lines yield `Ok(None)`.
pub fn parse_line(line_no: usize, line: &str) -> Result<Option<HostMessage>, PluginError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|source| PluginError::Decode {
            line: line_no,
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_message_deserializes() {
        let line = r#"{"type":"Event","event":"video_seek_requested","params":[{"seekingToTime":12.5}]}"#;
        let message = parse_line(1, line).unwrap().unwrap();
        assert_eq!(
            message,
            HostMessage::Event {
                event: "video_seek_requested".into(),
                params: Some(json!([{ "seekingToTime": 12.5 }])),
            }
        );
    }

    #[test]
    fn params_are_optional() {
        let message = parse_line(1, r#"{"type":"Event","event":"video_playing"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            message,
            HostMessage::Event {
                event: "video_playing".into(),
                params: None,
            }
        );
    }

    #[test]
    fn unit_messages_round_trip_through_the_tag() {
        let encoded = serde_json::to_string(&HostMessage::SessionEnd).unwrap();
        assert_eq!(encoded, r#"{"type":"SessionEnd"}"#);
        assert_eq!(
            parse_line(3, r#"{"type":"SetPluginId","id":"ga-1"}"#).unwrap(),
            Some(HostMessage::SetPluginId { id: "ga-1".into() })
        );
    }

    #[test]
    fn blank_lines_are_skipped() {
        assert_eq!(parse_line(1, "   ").unwrap(), None);
        assert_eq!(parse_line(2, "").unwrap(), None);
    }

    #[test]
    fn malformed_line_reports_line_number() {
        let err = parse_line(7, r#"{"type":"Teleport"}"#).unwrap_err();
        assert!(matches!(err, PluginError::Decode { line: 7, .. }));
        assert!(err.to_string().contains("line 7"));
    }
}
