//! Progress handler trait and events

use crate::model::InvestigationPhase;
use std::time::Duration;

/// Events emitted while an investigation runs
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Investigation accepted and run id allocated
    Started {
        run_id: String,
        trace_ids: usize,
        targets: usize,
    },

    /// Trace payload parsed into a resource graph
    ResourcesExtracted {
        resources: usize,
        relationships: usize,
        parse_misses: usize,
    },

    /// A requested trace id was absent from the payload
    TraceNotFound { trace_id: String },

    PhaseStarted { phase: InvestigationPhase },

    SubstrateRequestStarted { phase: InvestigationPhase },

    SubstrateResponseReceived {
        phase: InvestigationPhase,
        agent: String,
        total_tokens: u64,
        response_time: Duration,
    },

    ProbeComplete {
        resource: String,
        success: bool,
        execution_time: Duration,
    },

    PhaseComplete {
        phase: InvestigationPhase,
        facts: usize,
        duration: Duration,
    },

    /// A budget or safety limit stopped the run
    EarlyTermination { reason: String },

    Completed { status: String, total_time: Duration },

    Failed { error: String },
}

/// Trait for handling progress events during an investigation
pub trait ProgressHandler: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingHandler {
        count: Arc<AtomicUsize>,
    }

    impl ProgressHandler for CountingHandler {
        fn on_progress(&self, _event: &ProgressEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_noop_handler() {
        let handler = NoOpHandler;
        handler.on_progress(&ProgressEvent::Started {
            run_id: "run".to_string(),
            trace_ids: 1,
            targets: 0,
        });
    }

    #[test]
    fn test_progress_events() {
        let count = Arc::new(AtomicUsize::new(0));
        let handler = CountingHandler {
            count: count.clone(),
        };

        handler.on_progress(&ProgressEvent::PhaseStarted {
            phase: InvestigationPhase::TraceAnalysis,
        });
        handler.on_progress(&ProgressEvent::EarlyTermination {
            reason: "token limit exceeded".to_string(),
        });
        handler.on_progress(&ProgressEvent::Completed {
            status: "token_limited".to_string(),
            total_time: Duration::from_secs(5),
        });

        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_event_debug() {
        let event = ProgressEvent::SubstrateRequestStarted {
            phase: InvestigationPhase::ServiceAnalysis,
        };
        let debug_str = format!("{:?}", event);
        assert!(debug_str.contains("SubstrateRequestStarted"));
        assert!(debug_str.contains("ServiceAnalysis"));
    }
}
