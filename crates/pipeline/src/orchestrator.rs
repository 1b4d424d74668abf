use crate::context::InvestigationContext;
use crate::error::InvestigationError;
use crate::extraction::{extract, extract_for_trace, ExtractionOutcome};
use crate::phase_trait::WorkflowPhase;
use crate::phases::default_phases;
use crate::report::{assemble, RunOutcome, RunTimings};
use crate::request::{InvestigationRequest, RequestError};
use rootscope_agents::{
    AgentSubstrate, ProbeRegistry, SessionGuard, SessionProvider, StaticSessionProvider,
    SubstrateRequest,
};
use rootscope_core::{
    ExchangeLogger, InvestigationReport, ProgressEvent, ProgressHandler, RootscopeConfig,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Runs investigations end to end. One orchestrator serves any number of
/// concurrent runs; each run gets its own context.
pub struct InvestigationOrchestrator {
    substrate: Arc<dyn AgentSubstrate>,
    sessions: Arc<dyn SessionProvider>,
    probes: Arc<ProbeRegistry>,
    config: RootscopeConfig,
    exchange_logger: ExchangeLogger,
    progress_handler: Option<Arc<dyn ProgressHandler>>,
    phases: Vec<Box<dyn WorkflowPhase>>,
}

impl InvestigationOrchestrator {
    pub fn new(substrate: Arc<dyn AgentSubstrate>, config: RootscopeConfig) -> Self {
        Self {
            substrate,
            sessions: Arc::new(StaticSessionProvider::from_env()),
            probes: Arc::new(ProbeRegistry::new()),
            exchange_logger: ExchangeLogger::new(config.exchange_log.clone()),
            config,
            progress_handler: None,
            phases: default_phases(),
        }
    }

    pub fn with_session_provider(mut self, sessions: Arc<dyn SessionProvider>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn with_probes(mut self, probes: ProbeRegistry) -> Self {
        self.probes = Arc::new(probes);
        self
    }

    pub fn with_progress_handler(mut self, handler: Arc<dyn ProgressHandler>) -> Self {
        self.progress_handler = Some(handler);
        self
    }

    pub fn with_exchange_logger(mut self, logger: ExchangeLogger) -> Self {
        self.exchange_logger = logger;
        self
    }

    pub fn config(&self) -> &RootscopeConfig {
        &self.config
    }

    /// Normalizes a raw request document, then investigates it. A request
    /// that cannot be understood yields a `failed` report.
    pub async fn investigate_value(
        &self,
        request: &Value,
        trace_payload: Option<&Value>,
    ) -> InvestigationReport {
        match InvestigationRequest::from_value(request) {
            Ok(request) => self.investigate(request, trace_payload).await,
            Err(e) => {
                warn!(error = %e, "Rejected investigation request");
                let context = self.new_context(InvestigationRequest::default());
                self.finish(
                    context,
                    Err(InvestigationError::Request(e)),
                    RunTimings::start(),
                    Instant::now(),
                )
            }
        }
    }

    /// Runs one investigation. Never fails: errors and timeouts produce a
    /// `failed` report carrying whatever was gathered before the failure.
    pub async fn investigate(
        &self,
        request: InvestigationRequest,
        trace_payload: Option<&Value>,
    ) -> InvestigationReport {
        let timings = RunTimings::start();
        let start = Instant::now();
        let mut context = self.new_context(request);

        debug!(
            run_id = %context.run_id,
            region = %context.region,
            trace_ids = context.request.trace_ids.len(),
            targets = context.request.primary_targets.len(),
            "Starting investigation"
        );
        context.emit(ProgressEvent::Started {
            run_id: context.run_id.clone(),
            trace_ids: context.request.trace_ids.len(),
            targets: context.request.primary_targets.len(),
        });

        let total_timeout = self.config.total_timeout_secs;
        let result = match tokio::time::timeout(
            Duration::from_secs(total_timeout),
            self.run(&mut context, trace_payload),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(InvestigationError::TotalTimeout {
                seconds: total_timeout,
            }),
        };

        self.finish(context, result, timings, start)
    }

    fn new_context(&self, request: InvestigationRequest) -> InvestigationContext {
        let region = request.effective_region(&self.config.default_region);
        InvestigationContext::new(
            Uuid::new_v4().to_string(),
            request,
            region,
            self.config.limits.clone(),
            Arc::clone(&self.probes),
            self.progress_handler.clone(),
        )
    }

    fn finish(
        &self,
        mut context: InvestigationContext,
        result: Result<RunOutcome, InvestigationError>,
        timings: RunTimings,
        start: Instant,
    ) -> InvestigationReport {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(run_id = %context.run_id, error = %e, "Investigation failed");
                context.flow.fail();
                context.emit(ProgressEvent::Failed {
                    error: e.to_string(),
                });
                RunOutcome::Failed(e.to_string())
            }
        };
        context.session = None;
        self.substrate.finish_run(&context.run_id);

        let report = assemble(&context, outcome, timings.finish());

        info!(
            run_id = %report.run_id,
            status = %report.status,
            facts = report.facts.len(),
            total_time_ms = start.elapsed().as_millis(),
            "Investigation complete"
        );
        context.emit(ProgressEvent::Completed {
            status: report.status.to_string(),
            total_time: start.elapsed(),
        });

        report
    }

    async fn run(
        &self,
        context: &mut InvestigationContext,
        trace_payload: Option<&Value>,
    ) -> Result<RunOutcome, InvestigationError> {
        if context.request.is_empty() && trace_payload.is_none() {
            return Err(InvestigationError::Request(RequestError::Empty));
        }

        let guard = SessionGuard::acquire(self.sessions.as_ref(), &context.region)?;
        context.session = Some(guard.session().clone());

        for target in &context.request.primary_targets {
            context.graph.insert_resource(target.to_resource());
        }
        self.extract_resources(context, trace_payload)?;

        for phase in &self.phases {
            if let Some(outcome) = self.run_phase(phase.as_ref(), context).await? {
                return Ok(outcome);
            }
        }

        context.flow.complete();
        Ok(RunOutcome::Completed)
    }

    fn extract_resources(
        &self,
        context: &mut InvestigationContext,
        trace_payload: Option<&Value>,
    ) -> Result<(), InvestigationError> {
        let Some(payload) = trace_payload else {
            if !context.request.trace_ids.is_empty() {
                debug!("No trace payload supplied, forwarding trace ids to agents");
                context.graph.trace_ids = context.request.trace_ids.clone();
            }
            return Ok(());
        };

        if context.request.trace_ids.is_empty() {
            let graph = extract(payload)?;
            context.graph.merge(graph);
        } else {
            for trace_id in context.request.trace_ids.clone() {
                match extract_for_trace(payload, &trace_id)? {
                    ExtractionOutcome::Found(graph) => context.graph.merge(graph),
                    ExtractionOutcome::NotFound { trace_id } => {
                        warn!(trace_id = %trace_id, "Trace not found in payload");
                        context.emit(ProgressEvent::TraceNotFound { trace_id });
                    }
                }
            }
        }

        if !context.graph.parse_misses.is_empty() {
            warn!(
                parse_misses = context.graph.parse_misses.len(),
                "Some trace segments could not be decoded"
            );
        }
        context.emit(ProgressEvent::ResourcesExtracted {
            resources: context.graph.resources.len(),
            relationships: context.graph.relationships.len(),
            parse_misses: context.graph.parse_misses.len(),
        });
        Ok(())
    }

    /// One prepare / invoke / absorb cycle. Returns an outcome when the run
    /// must stop after this phase.
    async fn run_phase(
        &self,
        phase: &dyn WorkflowPhase,
        context: &mut InvestigationContext,
    ) -> Result<Option<RunOutcome>, InvestigationError> {
        let current = phase.phase();
        let phase_name = phase.name();
        let phase_start = Instant::now();
        debug!(phase = %phase_name, "Starting phase");
        context.emit(ProgressEvent::PhaseStarted { phase: current });

        phase
            .prepare(context)
            .await
            .map_err(|e| InvestigationError::Phase {
                phase: current,
                message: format!("{:#}", e),
            })?;

        let request = SubstrateRequest::new(
            phase.build_prompt(context),
            context.shared_state(current),
            context.flow.budget(self.config.max_response_tokens),
        );

        context.emit(ProgressEvent::SubstrateRequestStarted { phase: current });
        let call_start = Instant::now();
        let call_timeout = self.config.call_timeout_secs;
        let response = tokio::time::timeout(
            Duration::from_secs(call_timeout),
            self.substrate.invoke(request.clone()),
        )
        .await
        .map_err(|_| InvestigationError::CallTimeout {
            phase: current,
            seconds: call_timeout,
        })?
        .map_err(|source| InvestigationError::Substrate {
            phase: current,
            source,
        })?;
        let latency_ms = call_start.elapsed().as_millis() as u64;

        self.exchange_logger
            .log_exchange(&context.run_id, phase_name, &request, &response, latency_ms);
        context.emit(ProgressEvent::SubstrateResponseReceived {
            phase: current,
            agent: response.agent.clone(),
            total_tokens: response.usage.total,
            response_time: call_start.elapsed(),
        });

        let added = phase.absorb(context, &response);
        let resource_count = context.graph.resources.len();
        let termination = context
            .flow
            .record_response(current, &response, resource_count);

        debug!(
            phase = %phase_name,
            agent = %response.agent,
            facts_added = added,
            duration_ms = phase_start.elapsed().as_millis(),
            "Phase complete"
        );
        context.emit(ProgressEvent::PhaseComplete {
            phase: current,
            facts: added,
            duration: phase_start.elapsed(),
        });

        Ok(termination.map(|reason| {
            context.emit(ProgressEvent::EarlyTermination {
                reason: reason.to_string(),
            });
            RunOutcome::EarlyTermination(reason)
        }))
    }
}
