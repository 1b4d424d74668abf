pub mod config;
pub mod error;
pub mod exchange;
pub mod logging;
pub mod model;
pub mod output;
pub mod progress;

pub use config::{ConfigError, FlowLimits, RootscopeConfig};
pub use error::SubstrateError;
pub use exchange::ExchangeLogger;
pub use model::{
    DiscoverySource, Fact, InvestigationPhase, Relationship, RelationshipKind, Resource,
    ResourceType, TokenUsage,
};
pub use output::schema::{InvestigationReport, ReportStatus};
pub use progress::{LoggingHandler, NoOpHandler, ProgressEvent, ProgressHandler};
