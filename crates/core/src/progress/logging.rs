//! Logging-based progress handler

use super::{ProgressEvent, ProgressHandler};
use tracing::{debug, info, warn};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started {
                run_id,
                trace_ids,
                targets,
            } => {
                info!(run_id = %run_id, trace_ids, targets, "Starting investigation");
            }
            ProgressEvent::ResourcesExtracted {
                resources,
                relationships,
                parse_misses,
            } => {
                if *parse_misses > 0 {
                    warn!(
                        resources,
                        relationships, parse_misses, "Resource graph extracted with parse misses"
                    );
                } else {
                    info!(resources, relationships, "Resource graph extracted");
                }
            }
            ProgressEvent::TraceNotFound { trace_id } => {
                warn!(trace_id = %trace_id, "Trace not found in payload");
            }
            ProgressEvent::PhaseStarted { phase } => {
                info!(phase = %phase, "Starting phase");
            }
            ProgressEvent::SubstrateRequestStarted { phase } => {
                debug!(phase = %phase, "Invoking agent substrate");
            }
            ProgressEvent::SubstrateResponseReceived {
                phase,
                agent,
                total_tokens,
                response_time,
            } => {
                debug!(
                    phase = %phase,
                    agent = %agent,
                    total_tokens,
                    response_time_ms = response_time.as_millis(),
                    "Received substrate response"
                );
            }
            ProgressEvent::ProbeComplete {
                resource,
                success,
                execution_time,
            } => {
                if *success {
                    debug!(
                        resource = %resource,
                        execution_time_ms = execution_time.as_millis(),
                        "Probe complete"
                    );
                } else {
                    warn!(
                        resource = %resource,
                        execution_time_ms = execution_time.as_millis(),
                        "Probe reported an error"
                    );
                }
            }
            ProgressEvent::PhaseComplete {
                phase,
                facts,
                duration,
            } => {
                info!(
                    phase = %phase,
                    facts,
                    duration_ms = duration.as_millis(),
                    "Phase complete"
                );
            }
            ProgressEvent::EarlyTermination { reason } => {
                warn!(reason = %reason, "Investigation stopped early");
            }
            ProgressEvent::Completed { status, total_time } => {
                info!(
                    status = %status,
                    total_time_ms = total_time.as_millis(),
                    "Investigation complete"
                );
            }
            ProgressEvent::Failed { error } => {
                warn!(error = %error, "Investigation failed");
            }
        }
    }
}
