//! Host event vocabulary and the semantic events derived from it.
//!
//! The host reports events as a name plus loosely typed JSON params. Params
//! are decoded into typed payloads here; anything that fails to decode is
//! treated as absent rather than as an error.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Raw event kinds emitted by the playback host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostEventKind {
    VideoPlayerCreated,
    VideoContentMetadataUpdated,
    VideoStreamMetadataUpdated,
    VideoStreamPositionChanged,
    VideoPlaying,
    PlaybackCompleted,
    AdBreakStarted,
    AdBreakEnded,
    VideoPauseRequested,
    VideoPaused,
    VideoSeekRequested,
}

impl HostEventKind {
    pub const ALL: [HostEventKind; 11] = [
        HostEventKind::VideoPlayerCreated,
        HostEventKind::VideoContentMetadataUpdated,
        HostEventKind::VideoStreamMetadataUpdated,
        HostEventKind::VideoStreamPositionChanged,
        HostEventKind::VideoPlaying,
        HostEventKind::PlaybackCompleted,
        HostEventKind::AdBreakStarted,
        HostEventKind::AdBreakEnded,
        HostEventKind::VideoPauseRequested,
        HostEventKind::VideoPaused,
        HostEventKind::VideoSeekRequested,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HostEventKind::VideoPlayerCreated => "video_player_created",
            HostEventKind::VideoContentMetadataUpdated => "video_content_metadata_updated",
            HostEventKind::VideoStreamMetadataUpdated => "video_stream_metadata_updated",
            HostEventKind::VideoStreamPositionChanged => "video_stream_position_changed",
            HostEventKind::VideoPlaying => "video_playing",
            HostEventKind::PlaybackCompleted => "playback_completed",
            HostEventKind::AdBreakStarted => "ad_break_started",
            HostEventKind::AdBreakEnded => "ad_break_ended",
            HostEventKind::VideoPauseRequested => "video_pause_requested",
            HostEventKind::VideoPaused => "video_paused",
            HostEventKind::VideoSeekRequested => "video_seek_requested",
        }
    }
}

impl fmt::Display for HostEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventKind(pub String);

impl fmt::Display for UnknownEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown host event kind: {}", self.0)
    }
}

impl std::error::Error for UnknownEventKind {}

impl FromStr for HostEventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HostEventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

/// Content metadata reported once the host has loaded the asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentMetadata {
    #[serde(default)]
    pub title: String,
    /// Duration in seconds, when the host knows it up front.
    #[serde(default)]
    pub duration: Option<f64>,
}

/// Stream metadata; `base` carries the customer-defined key/value pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamMetadata {
    #[serde(default)]
    pub base: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionUpdate {
    pub stream_position: f64,
    #[serde(default)]
    pub total_stream_duration: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeekRequest {
    pub seeking_to_time: f64,
}

/// A raw host event with its params decoded.
///
/// `None` payloads mean the host sent no usable params.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    PlayerCreated,
    ContentMetadataUpdated(Option<ContentMetadata>),
    StreamMetadataUpdated(Option<StreamMetadata>),
    PositionChanged(Option<PositionUpdate>),
    Playing,
    PlaybackCompleted,
    AdBreakStarted,
    AdBreakEnded,
    PauseRequested,
    Paused,
    SeekRequested(Option<SeekRequest>),
    Unmapped(String),
}

impl HostEvent {
    /// Decode a host event from its wire name and params.
    ///
    /// The host wraps params in a one-element array; a bare object is accepted
    /// as well.
    pub fn from_raw(name: &str, params: Option<&Value>) -> Self {
        let Ok(kind) = name.parse::<HostEventKind>() else {
            return HostEvent::Unmapped(name.to_string());
        };

        match kind {
            HostEventKind::VideoPlayerCreated => HostEvent::PlayerCreated,
            HostEventKind::VideoContentMetadataUpdated => {
                HostEvent::ContentMetadataUpdated(decode_params(kind, params))
            }
            HostEventKind::VideoStreamMetadataUpdated => {
                HostEvent::StreamMetadataUpdated(decode_params(kind, params))
            }
            HostEventKind::VideoStreamPositionChanged => {
                HostEvent::PositionChanged(decode_params(kind, params))
            }
            HostEventKind::VideoPlaying => HostEvent::Playing,
            HostEventKind::PlaybackCompleted => HostEvent::PlaybackCompleted,
            HostEventKind::AdBreakStarted => HostEvent::AdBreakStarted,
            HostEventKind::AdBreakEnded => HostEvent::AdBreakEnded,
            HostEventKind::VideoPauseRequested => HostEvent::PauseRequested,
            HostEventKind::VideoPaused => HostEvent::Paused,
            HostEventKind::VideoSeekRequested => {
                HostEvent::SeekRequested(decode_params(kind, params))
            }
        }
    }

    pub fn kind(&self) -> Option<HostEventKind> {
        let kind = match self {
            HostEvent::PlayerCreated => HostEventKind::VideoPlayerCreated,
            HostEvent::ContentMetadataUpdated(_) => HostEventKind::VideoContentMetadataUpdated,
            HostEvent::StreamMetadataUpdated(_) => HostEventKind::VideoStreamMetadataUpdated,
            HostEvent::PositionChanged(_) => HostEventKind::VideoStreamPositionChanged,
            HostEvent::Playing => HostEventKind::VideoPlaying,
            HostEvent::PlaybackCompleted => HostEventKind::PlaybackCompleted,
            HostEvent::AdBreakStarted => HostEventKind::AdBreakStarted,
            HostEvent::AdBreakEnded => HostEventKind::AdBreakEnded,
            HostEvent::PauseRequested => HostEventKind::VideoPauseRequested,
            HostEvent::Paused => HostEventKind::VideoPaused,
            HostEvent::SeekRequested(_) => HostEventKind::VideoSeekRequested,
            HostEvent::Unmapped(_) => return None,
        };
        Some(kind)
    }
}

fn decode_params<T: DeserializeOwned>(kind: HostEventKind, params: Option<&Value>) -> Option<T> {
    let value = match params? {
        Value::Null => return None,
        Value::Array(items) => items.first()?,
        other => other,
    };
    match T::deserialize(value) {
        Ok(decoded) => Some(decoded),
        Err(error) => {
            tracing::debug!(event = %kind, %error, "ignoring malformed host params");
            None
        }
    }
}

/// An event captured by the host framework before the plugin attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub event: String,
    #[serde(default)]
    pub params: Option<Value>,
}

impl RecordedEvent {
    pub fn new(event: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            event: event.into(),
            params,
        }
    }

    pub fn decode(&self) -> HostEvent {
        HostEvent::from_raw(&self.event, self.params.as_ref())
    }
}

/// Whether the host is currently playing main content or a linear ad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackType {
    #[default]
    Content,
    Ad,
}

/// Fixed analytics events. Milestone events are named by the milestone table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticEvent {
    ContentReady,
    PlaybackStarted,
    PlaybackResumed,
    PlaybackPaused,
    PlaybackFinished,
    PlaybackScrubbedForward,
    PlaybackScrubbedBackward,
    AdPlaybackStarted,
    AdPlaybackFinished,
    ContentAbandoned,
}

impl SemanticEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticEvent::ContentReady => "contentReady",
            SemanticEvent::PlaybackStarted => "playbackStarted",
            SemanticEvent::PlaybackResumed => "playbackResumed",
            SemanticEvent::PlaybackPaused => "playbackPaused",
            SemanticEvent::PlaybackFinished => "playbackFinished",
            SemanticEvent::PlaybackScrubbedForward => "playbackScrubbedForward",
            SemanticEvent::PlaybackScrubbedBackward => "playbackScrubbedBackward",
            SemanticEvent::AdPlaybackStarted => "adPlaybackStarted",
            SemanticEvent::AdPlaybackFinished => "adPlaybackFinished",
            SemanticEvent::ContentAbandoned => "contentAbandoned",
        }
    }
}

impl fmt::Display for SemanticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event name used for elapsed-time custom metrics.
pub const PLAY_PROGRESS_EVENT: &str = "playProgress";
