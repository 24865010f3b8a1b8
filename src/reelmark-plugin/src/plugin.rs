use crate::protocol::HostMessage;
use reelmark_core::{
    AnalyticsConfig, AnalyticsSink, CollectorCapabilities, HostEvent, RecordedEvent, SinkAdapter,
};
use reelmark_tracker::{Classifier, PendingFlush};
use serde_json::Value;
use std::ops::ControlFlow;
use std::sync::Arc;

pub const PLUGIN_NAME: &str = "reelmark";

/// The analytics framework the plugin registers with.
pub trait HostFramework: Send + Sync {
    /// Events the framework saw before this plugin attached, oldest first.
    fn recorded_events(&self) -> Vec<RecordedEvent>;
}

/// A framework that only hands back a fixed event log.
#[derive(Debug, Clone, Default)]
pub struct RecordedHost {
    events: Vec<RecordedEvent>,
}

impl RecordedHost {
    pub fn new(events: Vec<RecordedEvent>) -> Self {
        Self { events }
    }
}

impl HostFramework for RecordedHost {
    fn recorded_events(&self) -> Vec<RecordedEvent> {
        self.events.clone()
    }
}

/// The plugin as seen by the host: registration, event intake and teardown.
pub struct AnalyticsPlugin {
    id: Option<String>,
    framework: Option<Arc<dyn HostFramework>>,
    classifier: Classifier,
    destroyed: bool,
}

impl std::fmt::Debug for AnalyticsPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsPlugin")
            .field("id", &self.id)
            .field("attached", &self.framework.is_some())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

impl AnalyticsPlugin {
    /// Build a plugin; the collector variant is chosen here, once.
    pub fn new(
        config: AnalyticsConfig,
        capabilities: CollectorCapabilities,
        sink: Arc<dyn AnalyticsSink>,
    ) -> Self {
        let adapter = SinkAdapter::new(sink, capabilities, &config);
        Self {
            id: None,
            framework: None,
            classifier: Classifier::new(config, adapter),
            destroyed: false,
        }
    }

    pub fn with_framework(mut self, framework: Arc<dyn HostFramework>) -> Self {
        self.framework = Some(framework);
        self
    }

    pub fn name(&self) -> &'static str {
        PLUGIN_NAME
    }

    pub fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    pub fn set_plugin_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    pub fn plugin_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Replay whatever the framework recorded before we attached.
    pub fn init(&mut self) -> usize {
        let Some(framework) = self.framework.clone() else {
            return 0;
        };
        let missed = framework.recorded_events();
        for recorded in &missed {
            self.dispatch("init", &recorded.decode());
        }
        tracing::debug!(plugin_id = ?self.id, replayed = missed.len(), "replayed recorded events");
        missed.len()
    }

    pub fn set_metadata(&mut self, metadata: &Value) {
        tracing::debug!(plugin_id = ?self.id, %metadata, "received plugin metadata");
    }

    pub fn process_event(&mut self, event: &str, params: Option<&Value>) {
        self.dispatch("process_event", &HostEvent::from_raw(event, params));
    }

    pub fn on_session_end(&mut self) {
        if !self.usable("on_session_end") {
            return;
        }
        self.classifier.on_session_end();
    }

    /// Detach from the framework and cancel the fallback timer.
    pub fn destroy(&mut self) {
        self.framework = None;
        self.classifier.shutdown();
        self.destroyed = true;
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn pending_flush(&self) -> Option<PendingFlush> {
        self.classifier.pending_flush()
    }

    pub fn fire_fallback(&mut self, generation: u64) -> bool {
        if self.destroyed {
            return false;
        }
        self.classifier.fire_fallback(generation)
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Apply one protocol message. Breaks once the host destroys the plugin.
    pub fn handle_message(&mut self, message: HostMessage) -> ControlFlow<()> {
        match message {
            HostMessage::SetPluginId { id } => self.set_plugin_id(id),
            HostMessage::SetMetadata { metadata } => self.set_metadata(&metadata),
            HostMessage::Event { event, params } => self.process_event(&event, params.as_ref()),
            HostMessage::SessionEnd => self.on_session_end(),
            HostMessage::Destroy => {
                self.destroy();
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn dispatch(&mut self, call: &str, event: &HostEvent) {
        if !self.usable(call) {
            return;
        }
        match event.kind() {
            Some(kind) => tracing::trace!(plugin_id = ?self.id, %kind, "host event"),
            None => tracing::trace!(plugin_id = ?self.id, ?event, "unrecognised host event"),
        }
        self.classifier.translate(event);
    }

    fn usable(&self, call: &str) -> bool {
        debug_assert!(!self.destroyed, "{call} called after destroy");
        if self.destroyed {
            tracing::warn!(plugin_id = ?self.id, call, "plugin used after destroy; ignoring");
        }
        !self.destroyed
    }
}
