pub mod schema;

pub use schema::{
    AffectedResource, CostControlSnapshot, FlowControlSnapshot, HealthStatus,
    InvestigationReport, ReportStatus, ReportSummary, Severity, SeverityAssessment, TimelineEvent,
};
