//! The playback event classifier.
//!
//! Raw host events go in through [`Classifier::translate`]; semantic events,
//! custom dimensions and custom metrics come out through the
//! [`SinkAdapter`](reelmark_core::SinkAdapter) the classifier was built with.

mod classifier;
mod gate;
mod progress;
mod session;

pub use classifier::{Classifier, PendingFlush};
pub use gate::{EventGate, GateOutcome};
pub use progress::{ProgressReport, ProgressTracker};
pub use session::Session;
