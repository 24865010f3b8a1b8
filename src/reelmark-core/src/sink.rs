//! Outbound side: structured collector commands, the collector variant chosen
//! at start-up, and the sinks commands are delivered to.

use crate::config::{AnalyticsConfig, Mechanism};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Collector API flavours the adapter can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectorVariant {
    /// Queue-based legacy API.
    Legacy,
    /// Function-call API; the only one supporting custom metrics.
    Universal,
    /// Tag-manager data layer; forces the events mechanism.
    TagManager,
}

/// Which collector globals were found in the embedding page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorCapabilities {
    #[serde(default)]
    pub tag_manager: bool,
    #[serde(default)]
    pub universal: bool,
    #[serde(default)]
    pub legacy: bool,
}

impl CollectorCapabilities {
    pub fn none_detected(&self) -> bool {
        !(self.tag_manager || self.universal || self.legacy)
    }
}

/// A single collector call with structured arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum SinkCommand {
    SendEvent {
        category: String,
        action: String,
        label: String,
    },
    SetDimension {
        key: String,
        value: String,
    },
    SendCustomMetric {
        category: String,
        event: String,
        key: String,
        value: f64,
    },
    SendPageview {
        path: String,
    },
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("no analytics collector detected")]
    NoCollector,
    #[error("failed to write sink output: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode sink command: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("collector rejected command: {message}")]
    Rejected { message: String },
}

pub type SinkResult<T> = Result<T, SinkError>;

/// Destination for collector commands. Delivery is fire-and-forget from the
/// classifier's point of view; errors are only logged.
pub trait AnalyticsSink: Send + Sync {
    fn id(&self) -> &str;

    fn send(&self, variant: CollectorVariant, command: &SinkCommand) -> SinkResult<()>;
}

/// Variant routing resolved once from the detected capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkProfile {
    pub mechanism: Mechanism,
    pub events: CollectorVariant,
    pub dimensions: Option<CollectorVariant>,
    pub metrics: Option<CollectorVariant>,
}

impl SinkProfile {
    pub fn detect(
        capabilities: CollectorCapabilities,
        requested: Mechanism,
    ) -> Result<Self, SinkError> {
        let mechanism = if capabilities.tag_manager {
            Mechanism::Events
        } else {
            requested
        };

        match mechanism {
            Mechanism::Pageviews => {
                let events = if capabilities.legacy {
                    CollectorVariant::Legacy
                } else if capabilities.universal {
                    CollectorVariant::Universal
                } else {
                    return Err(SinkError::NoCollector);
                };
                Ok(Self {
                    mechanism,
                    events,
                    dimensions: None,
                    metrics: None,
                })
            }
            Mechanism::Events => {
                let events = if capabilities.legacy {
                    CollectorVariant::Legacy
                } else if capabilities.universal {
                    CollectorVariant::Universal
                } else if capabilities.tag_manager {
                    CollectorVariant::TagManager
                } else {
                    return Err(SinkError::NoCollector);
                };
                let dimensions = if capabilities.universal {
                    Some(CollectorVariant::Universal)
                } else if capabilities.tag_manager {
                    Some(CollectorVariant::TagManager)
                } else {
                    None
                };
                let metrics = capabilities.universal.then_some(CollectorVariant::Universal);
                Ok(Self {
                    mechanism,
                    events,
                    dimensions,
                    metrics,
                })
            }
        }
    }
}

/// The classifier's view of the collector.
///
/// When no collector was detected the adapter is unusable and every call is a
/// no-op.
pub struct SinkAdapter {
    sink: Arc<dyn AnalyticsSink>,
    profile: Option<SinkProfile>,
    category: String,
    pageview_format: String,
}

impl std::fmt::Debug for SinkAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkAdapter")
            .field("sink", &self.sink.id())
            .field("profile", &self.profile)
            .field("category", &self.category)
            .finish()
    }
}

impl SinkAdapter {
    pub fn new(
        sink: Arc<dyn AnalyticsSink>,
        capabilities: CollectorCapabilities,
        config: &AnalyticsConfig,
    ) -> Self {
        let profile = match SinkProfile::detect(capabilities, config.mechanism) {
            Ok(profile) => {
                tracing::debug!(sink = sink.id(), ?profile, "analytics collector selected");
                Some(profile)
            }
            Err(error) => {
                tracing::error!(
                    sink = sink.id(),
                    %error,
                    "analytics tracking is installed but no collector was detected; reporting disabled"
                );
                None
            }
        };

        Self {
            sink,
            profile,
            category: config.event_category.clone(),
            pageview_format: config.pageview_format.clone(),
        }
    }

    pub fn is_usable(&self) -> bool {
        self.profile.is_some()
    }

    pub fn profile(&self) -> Option<SinkProfile> {
        self.profile
    }

    /// Report a semantic event, as an event or a pageview depending on the
    /// mechanism.
    pub fn send_event(&self, name: &str, title: &str) {
        let Some(profile) = self.profile else {
            return;
        };
        let command = match profile.mechanism {
            Mechanism::Events => SinkCommand::SendEvent {
                category: self.category.clone(),
                action: name.to_string(),
                label: title.to_string(),
            },
            Mechanism::Pageviews => SinkCommand::SendPageview {
                path: render_pageview_path(&self.pageview_format, name, title),
            },
        };
        self.dispatch(profile.events, command);
    }

    pub fn set_dimension(&self, key: &str, value: &str) {
        let Some(variant) = self.profile.and_then(|p| p.dimensions) else {
            return;
        };
        self.dispatch(
            variant,
            SinkCommand::SetDimension {
                key: key.to_string(),
                value: value.to_string(),
            },
        );
    }

    pub fn send_custom_metric(&self, event: &str, key: &str, value: f64) {
        let Some(variant) = self.profile.and_then(|p| p.metrics) else {
            return;
        };
        self.dispatch(
            variant,
            SinkCommand::SendCustomMetric {
                category: self.category.clone(),
                event: event.to_string(),
                key: key.to_string(),
                value,
            },
        );
    }

    pub fn send_pageview(&self, path: &str) {
        let Some(profile) = self.profile else {
            return;
        };
        self.dispatch(
            profile.events,
            SinkCommand::SendPageview {
                path: path.to_string(),
            },
        );
    }

    fn dispatch(&self, variant: CollectorVariant, command: SinkCommand) {
        match self.sink.send(variant, &command) {
            Ok(()) => tracing::trace!(sink = self.sink.id(), ?variant, ?command, "sink command sent"),
            Err(error) => tracing::warn!(
                sink = self.sink.id(),
                ?variant,
                %error,
                "sink command failed"
            ),
        }
    }
}

/// Substitute `:event` and `:title` placeholders in a pageview path template.
pub fn render_pageview_path(format: &str, event: &str, title: &str) -> String {
    format.replace(":event", event).replace(":title", title)
}

fn lock_recovering<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory sink; clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    records: Arc<Mutex<Vec<(CollectorVariant, SinkCommand)>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<(CollectorVariant, SinkCommand)> {
        lock_recovering(&self.records).clone()
    }

    /// Actions of every `SendEvent` command, in delivery order.
    pub fn event_actions(&self) -> Vec<String> {
        lock_recovering(&self.records)
            .iter()
            .filter_map(|(_, command)| match command {
                SinkCommand::SendEvent { action, .. } => Some(action.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn take(&self) -> Vec<(CollectorVariant, SinkCommand)> {
        std::mem::take(&mut *lock_recovering(&self.records))
    }
}

impl AnalyticsSink for RecordingSink {
    fn id(&self) -> &str {
        "recording"
    }

    fn send(&self, variant: CollectorVariant, command: &SinkCommand) -> SinkResult<()> {
        lock_recovering(&self.records).push((variant, command.clone()));
        Ok(())
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    variant: CollectorVariant,
    #[serde(flatten)]
    command: &'a SinkCommand,
}

/// Writes each command as one JSON object per line.
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> AnalyticsSink for JsonLinesSink<W> {
    fn id(&self) -> &str {
        "json-lines"
    }

    fn send(&self, variant: CollectorVariant, command: &SinkCommand) -> SinkResult<()> {
        let mut writer = lock_recovering(&self.writer);
        serde_json::to_writer(&mut *writer, &JsonLine { variant, command })?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}
