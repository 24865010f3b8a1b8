use reelmark_core::PlaybackType;

/// Mutable facts about one playback session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub(crate) title: String,
    pub(crate) duration: Option<f64>,
    pub(crate) playback_type: PlaybackType,
    pub(crate) playing: bool,
    pub(crate) playback_initiated: bool,
    pub(crate) playhead: Option<f64>,
    /// Periodic tick watermark; only moves forward.
    pub(crate) last_reported_progress: f64,
    /// Highest milestone fraction already fired.
    pub(crate) last_reported_milestone: f64,
    pub(crate) custom_dimensions_reported: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn playback_type(&self) -> PlaybackType {
        self.playback_type
    }

    pub fn is_content(&self) -> bool {
        self.playback_type == PlaybackType::Content
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn playback_initiated(&self) -> bool {
        self.playback_initiated
    }

    pub fn playhead(&self) -> Option<f64> {
        self.playhead
    }

    pub fn last_reported_progress(&self) -> f64 {
        self.last_reported_progress
    }

    pub fn last_reported_milestone(&self) -> f64 {
        self.last_reported_milestone
    }

    pub fn custom_dimensions_reported(&self) -> bool {
        self.custom_dimensions_reported
    }

    /// Record a duration; non-positive values never replace a known one.
    pub(crate) fn refresh_duration(&mut self, duration: f64) -> bool {
        if duration > 0.0 {
            self.duration = Some(duration);
            true
        } else {
            false
        }
    }

    /// Fraction of the stream played at `position`, when the duration is known.
    pub fn progress_at(&self, position: f64) -> Option<f64> {
        self.duration
            .filter(|duration| *duration > 0.0)
            .map(|duration| position / duration)
    }

    /// Current value of a session attribute usable as a custom dimension.
    pub fn attribute(&self, name: &str) -> Option<String> {
        match name {
            "title" => Some(self.title.clone()),
            "duration" => self.duration.map(|d| d.to_string()),
            _ => None,
        }
    }
}
