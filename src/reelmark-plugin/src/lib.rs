//! Host-facing side of the Reelmark analytics plugin.
//!
//! The host registers an [`AnalyticsPlugin`], hands it raw player events and
//! eventually destroys it. Out of process, the host speaks the JSON-lines
//! [`HostMessage`] protocol and a [`PluginRunner`] drives the plugin,
//! including the fallback flush timer.
//!
//! ```text
//! {"type":"SetPluginId","id":"analytics-1"}
//! {"type":"Event","event":"video_content_metadata_updated","params":[{"title":"Pilot"}]}
//! {"type":"Event","event":"video_playing"}
//! {"type":"SessionEnd"}
//! {"type":"Destroy"}
//! ```

mod plugin;
pub mod protocol;
mod runner;

pub use plugin::{AnalyticsPlugin, HostFramework, RecordedHost, PLUGIN_NAME};
pub use protocol::{parse_line, HostMessage, PluginError};
pub use runner::{channel, PluginHandle, PluginRunner, RunSummary, DEFAULT_INBOX_CAPACITY};
