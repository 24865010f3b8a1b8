pub mod config;
pub mod events;
pub mod logging;
pub mod milestones;
pub mod paths;
pub mod sink;
pub mod sink_contract;

pub use config::{
    AnalyticsConfig, Config, ConfigError, CustomDimensions, LogLevel, LoggingConfig, Mechanism,
    ValidationError,
};
pub use events::{
    ContentMetadata, HostEvent, HostEventKind, PlaybackType, PositionUpdate, RecordedEvent,
    SeekRequest, SemanticEvent, StreamMetadata,
};
pub use logging::{filter_directives, init_logging, LoggingError, LoggingGuard, LOG_FILTER_ENV};
pub use milestones::{Milestone, MilestoneTable};
pub use paths::{AppDirs, DirsError};
pub use sink::{
    AnalyticsSink, CollectorCapabilities, CollectorVariant, JsonLinesSink, RecordingSink,
    SinkAdapter, SinkCommand, SinkError, SinkProfile, SinkResult,
};
pub use sink_contract::{run_sink_contract, SinkContractError, SinkContractSpec};

pub const APP_NAME: &str = "reelmark";
pub const APP_AUTHOR: &str = "Reelmark";
pub const APP_QUALIFIER: &str = "io";
