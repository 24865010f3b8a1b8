use crate::gate::{EventGate, GateOutcome};
use crate::progress::ProgressTracker;
use crate::session::Session;
use reelmark_core::events::PLAY_PROGRESS_EVENT;
use reelmark_core::{
    AnalyticsConfig, ContentMetadata, HostEvent, PlaybackType, PositionUpdate, SeekRequest,
    SemanticEvent, SinkAdapter, StreamMetadata,
};
use serde_json::Value;
use std::time::Duration;

/// A fallback flush the runtime should schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingFlush {
    pub generation: u64,
    pub delay: Duration,
}

/// One-shot timer armed on content-ready in case stream metadata never comes.
#[derive(Debug, Clone)]
struct FallbackTimer {
    delay: Duration,
    generation: u64,
    armed: bool,
}

impl FallbackTimer {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: 0,
            armed: false,
        }
    }

    fn arm(&mut self) {
        self.generation += 1;
        self.armed = true;
    }

    fn cancel(&mut self) {
        self.armed = false;
    }

    fn pending(&self) -> Option<PendingFlush> {
        self.armed.then_some(PendingFlush {
            generation: self.generation,
            delay: self.delay,
        })
    }

    fn take(&mut self, generation: u64) -> bool {
        if self.armed && self.generation == generation {
            self.armed = false;
            true
        } else {
            false
        }
    }
}

/// Turns raw host events into analytics reports for a single playback session.
#[derive(Debug)]
pub struct Classifier {
    config: AnalyticsConfig,
    adapter: SinkAdapter,
    session: Session,
    gate: EventGate,
    progress: ProgressTracker,
    fallback: FallbackTimer,
}

impl Classifier {
    pub fn new(config: AnalyticsConfig, adapter: SinkAdapter) -> Self {
        let report_attributes = !config.custom_dimensions.from_attributes.is_empty();
        let progress = ProgressTracker::new(
            config.progress_step,
            config.milestones.clone(),
            report_attributes,
        );
        let fallback = FallbackTimer::new(config.fallback_flush_delay());
        Self {
            config,
            adapter,
            session: Session::new(),
            gate: EventGate::new(),
            progress,
            fallback,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn gate(&self) -> &EventGate {
        &self.gate
    }

    pub fn adapter(&self) -> &SinkAdapter {
        &self.adapter
    }

    pub fn translate(&mut self, event: &HostEvent) {
        match event {
            HostEvent::PlayerCreated => self.on_player_created(),
            HostEvent::ContentMetadataUpdated(meta) => self.on_content_ready(meta.as_ref()),
            HostEvent::StreamMetadataUpdated(meta) => self.on_stream_metadata(meta.as_ref()),
            HostEvent::PositionChanged(update) => self.on_position_changed(update.as_ref()),
            HostEvent::Playing => self.on_play(),
            HostEvent::PlaybackCompleted => self.on_end(),
            HostEvent::AdBreakStarted => self.on_ad_break_started(),
            HostEvent::AdBreakEnded => self.on_ad_break_ended(),
            HostEvent::PauseRequested | HostEvent::Paused => self.on_paused(),
            HostEvent::SeekRequested(seek) => self.on_seek(seek.as_ref()),
            HostEvent::Unmapped(name) => {
                tracing::trace!(event = %name, "ignoring unmapped host event");
            }
        }
    }

    /// The viewer left before playback finished.
    pub fn on_session_end(&mut self) {
        self.emit(SemanticEvent::ContentAbandoned);
        self.flush();
        self.fallback.cancel();
    }

    /// Fallback flush the runtime should schedule, if one is armed.
    pub fn pending_flush(&self) -> Option<PendingFlush> {
        self.fallback.pending()
    }

    /// Called by the runtime when a scheduled fallback fires. Stale or
    /// cancelled generations are ignored.
    pub fn fire_fallback(&mut self, generation: u64) -> bool {
        if !self.fallback.take(generation) {
            return false;
        }
        let flushed = self.flush();
        tracing::debug!(generation, flushed, "fallback flush fired");
        true
    }

    /// Cancel outstanding timers; the classifier must not be used afterwards.
    pub fn shutdown(&mut self) {
        self.fallback.cancel();
    }

    /// Send every buffered event, labelled with the current title.
    pub fn flush(&mut self) -> usize {
        let adapter = &self.adapter;
        let title = &self.session.title;
        self.gate.flush(|name| adapter.send_event(name, title))
    }

    fn on_player_created(&mut self) {
        tracing::debug!(
            handler = "onPlayerCreated",
            profile = ?self.adapter.profile(),
            "analytics handler"
        );
    }

    fn on_content_ready(&mut self, meta: Option<&ContentMetadata>) {
        let Some(meta) = meta else {
            tracing::debug!("content metadata without params");
            return;
        };
        self.session.title = meta.title.clone();
        if let Some(duration) = meta.duration {
            self.session.refresh_duration(duration);
        }
        self.emit(SemanticEvent::ContentReady);
        tracing::debug!(handler = "onContentReady", "analytics handler");
        self.fallback.arm();
    }

    fn on_stream_metadata(&mut self, meta: Option<&StreamMetadata>) {
        tracing::debug!(handler = "onStreamMetadataUpdated", "analytics handler");
        if let Some(meta) = meta {
            self.gate.disable_cache();
            self.fallback.cancel();
            if let Some(base) = &meta.base {
                let mappings = &self.config.custom_dimensions.from_metadata;
                for (key, value) in base {
                    if let Some(slot) = mappings.get(key) {
                        self.adapter.set_dimension(slot, &dimension_value(value));
                    }
                }
            }
        }
        self.flush();
    }

    fn on_position_changed(&mut self, update: Option<&PositionUpdate>) {
        if !self.session.is_content() {
            return;
        }
        let Some(update) = update else {
            return;
        };

        let report = self.progress.advance(&mut self.session, update);

        if report.attributes_due {
            for (attribute, slot) in &self.config.custom_dimensions.from_attributes {
                if let Some(value) = self.session.attribute(attribute) {
                    self.adapter.set_dimension(slot, &value);
                }
            }
        }

        if let Some(position) = report.elapsed_tick {
            self.send_elapsed_time(position);
        }

        for name in report.milestones {
            self.report(&name);
            tracing::debug!(handler = "onPositionChanged", event = %name, "analytics milestone");
        }
    }

    fn on_play(&mut self) {
        self.session.playing = true;

        if !self.session.playback_initiated {
            self.session.playback_initiated = true;
            self.emit(SemanticEvent::PlaybackStarted);
            tracing::debug!(handler = "onPlay", "analytics handler");
            return;
        }

        match self.session.playback_type {
            PlaybackType::Content => self.emit(SemanticEvent::PlaybackResumed),
            PlaybackType::Ad => self.emit(SemanticEvent::AdPlaybackStarted),
        }
        tracing::debug!(handler = "onResume", "analytics handler");
    }

    fn on_end(&mut self) {
        if let Some(position) = self.session.playhead {
            self.send_elapsed_time(position);
        }
        self.emit(SemanticEvent::PlaybackFinished);
        tracing::debug!(handler = "onEnd", "analytics handler");
    }

    fn on_ad_break_started(&mut self) {
        self.session.playback_type = PlaybackType::Ad;
        self.emit(SemanticEvent::AdPlaybackStarted);
        tracing::debug!(handler = "onWillPlayAds", "analytics handler");
    }

    fn on_ad_break_ended(&mut self) {
        self.session.playback_type = PlaybackType::Content;
        self.emit(SemanticEvent::AdPlaybackFinished);
        self.emit(SemanticEvent::PlaybackStarted);
        tracing::debug!(handler = "onAdsPlayed", "analytics handler");
    }

    fn on_paused(&mut self) {
        if !self.session.is_content() {
            return;
        }
        self.session.playing = false;

        // The host pauses on start-up and again at the end of the stream;
        // neither is a viewer pause.
        let (Some(position), Some(duration)) = (self.session.playhead, self.session.duration)
        else {
            return;
        };
        if position > duration - self.config.pause_end_tolerance {
            return;
        }

        self.emit(SemanticEvent::PlaybackPaused);
        tracing::debug!(handler = "onPaused", "analytics handler");
    }

    fn on_seek(&mut self, seek: Option<&SeekRequest>) {
        let (Some(seek), Some(position)) = (seek, self.session.playhead) else {
            return;
        };

        let event = if seek.seeking_to_time > position {
            SemanticEvent::PlaybackScrubbedForward
        } else if seek.seeking_to_time < position {
            SemanticEvent::PlaybackScrubbedBackward
        } else {
            return;
        };
        self.emit(event);
        tracing::debug!(handler = event.as_str(), "analytics handler");
    }

    fn send_elapsed_time(&self, position: f64) {
        if let Some(key) = self.config.custom_dimensions.elapsed_time_key() {
            self.adapter
                .send_custom_metric(PLAY_PROGRESS_EVENT, key, position);
        }
    }

    fn emit(&mut self, event: SemanticEvent) {
        self.report(event.as_str());
    }

    fn report(&mut self, name: &str) {
        // The count is rebuilt on every report, so it is always 1.
        if let Some(key) = self.config.custom_metrics.get(name) {
            self.adapter.send_custom_metric(name, key, 1.0);
        }

        let adapter = &self.adapter;
        let title = &self.session.title;
        let outcome = self.gate.submit(name, |name| adapter.send_event(name, title));
        if outcome == GateOutcome::Duplicate {
            tracing::trace!(event = name, "dropping duplicate event");
        }
    }
}

fn dimension_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
