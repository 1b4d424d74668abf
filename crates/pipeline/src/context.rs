use crate::extraction::ResourceGraph;
use crate::facts::FactNormalizer;
use crate::flow::FlowController;
use crate::request::InvestigationRequest;
use rootscope_agents::{CloudSession, ProbeRegistry, SharedState};
use rootscope_core::{Fact, FlowLimits, InvestigationPhase, ProgressEvent, ProgressHandler};
use serde_json::Value;
use std::sync::Arc;

/// Everything a single run accumulates. Survives cancellation so partial
/// results can still be reported.
#[derive(Clone)]
pub struct InvestigationContext {
    pub run_id: String,
    pub request: InvestigationRequest,
    pub region: String,
    pub graph: ResourceGraph,
    pub facts: Vec<Fact>,
    pub root_cause: Option<Value>,
    pub flow: FlowController,
    pub normalizer: FactNormalizer,
    pub session: Option<CloudSession>,
    pub probes: Arc<ProbeRegistry>,
    pub progress_handler: Option<Arc<dyn ProgressHandler>>,
}

impl InvestigationContext {
    pub fn new(
        run_id: impl Into<String>,
        request: InvestigationRequest,
        region: impl Into<String>,
        limits: FlowLimits,
        probes: Arc<ProbeRegistry>,
        progress_handler: Option<Arc<dyn ProgressHandler>>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            request,
            region: region.into(),
            graph: ResourceGraph::new(),
            facts: Vec::new(),
            root_cause: None,
            normalizer: FactNormalizer::from_limits(&limits),
            flow: FlowController::new(limits),
            session: None,
            probes,
            progress_handler,
        }
    }

    pub fn shared_state(&self, phase: InvestigationPhase) -> SharedState {
        SharedState {
            run_id: self.run_id.clone(),
            phase,
            trace_ids: self.graph.trace_ids.clone(),
            resources: self.graph.resources.clone(),
            relationships: self.graph.relationships.clone(),
            facts: self.facts.clone(),
            symptom: self.request.symptom.clone(),
        }
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(handler) = &self.progress_handler {
            handler.on_progress(&event);
        }
    }
}
