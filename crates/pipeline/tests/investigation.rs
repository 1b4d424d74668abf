//! End-to-end investigation runs against a scripted substrate

use rootscope_agents::{
    AgentHandoff, CloudSession, MockResponse, MockSubstrate, ProbeRegistry, SessionError, SessionProvider,
    StaticSessionProvider,
};
use rootscope_core::output::schema::HealthStatus;
use rootscope_core::{
    ExchangeLogger, FlowLimits, InvestigationPhase, ProgressEvent, ProgressHandler, ReportStatus, RootscopeConfig,
    SubstrateError,
};
use rootscope_pipeline::{InvestigationOrchestrator, InvestigationRequest};
use serde_json::{json, Value};
use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const CHECKOUT_TRACE: &str = "1-5f84c7a2-0a1b2c3d4e5f60718293a4b5";

fn payload() -> Value {
    serde_json::from_str(include_str!("fixtures/checkout_traces.json")).unwrap()
}

fn config() -> RootscopeConfig {
    RootscopeConfig {
        exchange_log: None,
        call_timeout_secs: 30,
        total_timeout_secs: 120,
        limits: FlowLimits::default(),
        ..RootscopeConfig::default()
    }
}

fn facts_json(content: &str, confidence: f64, issue: bool) -> String {
    json!({
        "facts": [{
            "content": content,
            "confidence": confidence,
            "metadata": {"potential_issue": issue}
        }]
    })
    .to_string()
}

fn scripted_run(substrate: &MockSubstrate) {
    substrate.add_responses([
        MockResponse::text(
            "trace_specialist",
            facts_json("checkout recorded an error while writing to orders", 0.8, true),
        )
        .with_usage(400, 120),
        MockResponse::text(
            "service_specialist",
            facts_json("orders table rejects writes from the checkout role", 0.85, true),
        )
        .with_usage(900, 260),
        MockResponse::text(
            "hypothesis_generator",
            facts_json("IAM policy for checkout lacks dynamodb:PutItem", 0.8, false),
        )
        .with_usage(1_400, 380),
        MockResponse::text(
            "root_cause_analyst",
            r#"```json
{"root_cause": "checkout role cannot write to orders", "resource": "dynamodb:orders",
 "facts": [{"content": "Missing dynamodb:PutItem permission", "confidence": 0.9, "metadata": {"potential_issue": true}}]}
```"#,
        )
        .with_usage(2_000, 500),
    ]);
}

#[derive(Default)]
struct RecordingHandler {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingHandler {
    fn count(&self, predicate: impl Fn(&ProgressEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| predicate(*e)).count()
    }
}

impl ProgressHandler for RecordingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

struct RefusingSessions;

impl SessionProvider for RefusingSessions {
    fn acquire(&self, region: &str) -> Result<CloudSession, SessionError> {
        Err(SessionError::AcquireFailed {
            region: region.to_string(),
            message: "expired credentials".to_string(),
        })
    }

    fn release(&self, _session: &CloudSession) {}
}

fn probe_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("lambda")).unwrap();
    fs::create_dir_all(dir.path().join("dynamodb")).unwrap();
    fs::write(
        dir.path().join("lambda/checkout.json"),
        json!({
            "runtime": "python3.12",
            "timeout": 3,
            "facts": [{"content": "Function timeout is 3s", "confidence": 0.9}]
        })
        .to_string(),
    )
    .unwrap();
    fs::write(
        dir.path().join("dynamodb/orders.json"),
        json!({"error": "AccessDeniedException: not authorized to perform DescribeTable"}).to_string(),
    )
    .unwrap();
    dir
}

#[tokio::test]
async fn test_completed_investigation() {
    let substrate = Arc::new(MockSubstrate::new());
    scripted_run(&substrate);
    let sessions = Arc::new(StaticSessionProvider::new(None));
    let handler = Arc::new(RecordingHandler::default());
    let probes = probe_dir();

    let orchestrator = InvestigationOrchestrator::new(substrate.clone(), config())
        .with_session_provider(sessions.clone())
        .with_probes(ProbeRegistry::from_fixture_dir(probes.path()))
        .with_progress_handler(handler.clone());

    let report = orchestrator
        .investigate(InvestigationRequest::for_trace(CHECKOUT_TRACE), Some(&payload()))
        .await;

    assert_eq!(report.status, ReportStatus::Completed);
    assert_eq!(sessions.active_sessions(), 0);

    let requests = substrate.requests();
    assert_eq!(requests.len(), 4);
    assert_eq!(requests[0].shared_state.resources.len(), 3);
    assert!(requests[1].prompt.contains("Function timeout is 3s"));
    assert!(requests[1].prompt.contains("AccessDeniedException"));
    assert!(requests[3].budget.remaining_tokens < requests[0].budget.remaining_tokens);

    assert_eq!(report.affected_resources.len(), 3);
    assert!(report
        .affected_resources
        .iter()
        .all(|r| r.health_status == HealthStatus::Unknown));
    assert_eq!(report.summary.parse_misses, 1);
    assert_eq!(report.summary.trace_ids, vec![CHECKOUT_TRACE.to_string()]);
    assert_eq!(report.summary.flow_control.handoff_count, 4);
    assert_eq!(report.summary.cost_control.token_usage.total, 2_500);
    assert!(report.summary.flow_control.phases_completed.values().all(|done| *done));
    assert_eq!(
        report.root_cause_analysis.as_ref().unwrap()["resource"],
        json!("dynamodb:orders")
    );
    assert!(report.facts.iter().any(|f| f.source == "probe:sqs"));

    assert_eq!(handler.count(|e| matches!(e, ProgressEvent::ProbeComplete { .. })), 3);
    assert_eq!(handler.count(|e| matches!(e, ProgressEvent::PhaseComplete { .. })), 4);
    assert_eq!(handler.count(|e| matches!(e, ProgressEvent::Completed { .. })), 1);
}

#[tokio::test]
async fn test_alternating_handoffs_stop_the_run() {
    let substrate = Arc::new(MockSubstrate::new());
    substrate.add_response(
        MockResponse::text(
            "service_specialist",
            facts_json("orders throttled", 0.7, true),
        )
        .with_handoffs([
            "trace_specialist",
            "service_specialist",
            "trace_specialist",
            "service_specialist",
            "trace_specialist",
            "service_specialist",
            "trace_specialist",
            "service_specialist",
        ])
        .with_usage(300, 100),
    );
    scripted_run(&substrate);

    let orchestrator = InvestigationOrchestrator::new(substrate.clone(), config());
    let report = orchestrator
        .investigate(InvestigationRequest::for_trace(CHECKOUT_TRACE), Some(&payload()))
        .await;

    assert_eq!(report.status, ReportStatus::RepetitiveHandoffDetected);
    assert_eq!(substrate.requests().len(), 1);
    assert!(report
        .summary
        .flow_control
        .termination_reason
        .as_deref()
        .unwrap()
        .contains("repetitive handoff"));
    assert!(report
        .affected_resources
        .iter()
        .all(|r| r.health_status == HealthStatus::NotAnalyzed));
    assert!(report.facts.iter().any(|f| f.content == "orders throttled"));
}

#[tokio::test]
async fn test_agents_reporting_terminal_phases_do_not_end_the_run() {
    let substrate = Arc::new(MockSubstrate::new());
    substrate.add_responses([
        MockResponse::text("trace_specialist", facts_json("checkout errors", 0.8, true))
            .with_phase_handoffs(vec![
                AgentHandoff::new("service_specialist", Some(InvestigationPhase::Failed)),
                AgentHandoff::new("trace_specialist", Some(InvestigationPhase::Complete)),
            ])
            .with_usage(100, 20),
        MockResponse::text("service_specialist", facts_json("orders healthy", 0.6, false))
            .with_phase_handoffs(vec![AgentHandoff::new(
                "service_specialist",
                Some(InvestigationPhase::CostLimited),
            )])
            .with_usage(200, 40),
        MockResponse::text("hypothesis_generator", facts_json("role policy", 0.7, false))
            .with_usage(300, 60),
        MockResponse::text("root_cause_analyst", r#"{"root_cause": "role policy"}"#)
            .with_usage(400, 80),
    ]);

    let orchestrator = InvestigationOrchestrator::new(substrate.clone(), config());
    let report = orchestrator
        .investigate(InvestigationRequest::for_trace(CHECKOUT_TRACE), Some(&payload()))
        .await;

    assert_eq!(report.status, ReportStatus::Completed);
    assert_eq!(substrate.requests().len(), 4);
    let flow = &report.summary.flow_control;
    assert_eq!(flow.final_phase, InvestigationPhase::Complete);
    assert!(!flow.early_termination);
    assert_eq!(flow.handoff_count, 5);
    assert!(flow.phases_completed.values().all(|done| *done));
    assert!(report
        .affected_resources
        .iter()
        .all(|r| r.health_status == HealthStatus::Unknown));
}

#[tokio::test]
async fn test_token_limit_keeps_partial_results() {
    let substrate = Arc::new(MockSubstrate::new());
    scripted_run(&substrate);
    let cfg = RootscopeConfig {
        limits: FlowLimits::default().with_max_tokens(1_000),
        ..config()
    };

    let report = InvestigationOrchestrator::new(substrate.clone(), cfg)
        .investigate(InvestigationRequest::for_trace(CHECKOUT_TRACE), Some(&payload()))
        .await;

    assert_eq!(report.status, ReportStatus::TokenLimited);
    assert_eq!(substrate.requests().len(), 2);
    assert_eq!(report.summary.cost_control.max_tokens, 1_000);
    assert!(report
        .facts
        .iter()
        .any(|f| f.content.contains("orders table rejects writes")));
}

#[tokio::test]
async fn test_substrate_failure_becomes_failed_report() {
    let substrate = Arc::new(MockSubstrate::new());
    substrate.add_responses([
        MockResponse::text("trace_specialist", facts_json("checkout errored", 0.8, true)),
        MockResponse::error(SubstrateError::ApiError {
            message: "model overloaded".to_string(),
            status_code: Some(529),
        }),
    ]);
    let sessions = Arc::new(StaticSessionProvider::new(Some("incident".to_string())));

    let report = InvestigationOrchestrator::new(substrate, config())
        .with_session_provider(sessions.clone())
        .investigate(InvestigationRequest::for_trace(CHECKOUT_TRACE), Some(&payload()))
        .await;

    assert_eq!(report.status, ReportStatus::Failed);
    assert_eq!(sessions.active_sessions(), 0);
    let error = report.summary.error.as_deref().unwrap();
    assert!(error.contains("SERVICE_ANALYSIS"));
    assert!(error.contains("model overloaded"));
    assert!(report.facts.iter().any(|f| f.content == "checkout errored"));
    assert_eq!(
        report.summary.flow_control.final_phase,
        rootscope_core::InvestigationPhase::Failed
    );
}

#[tokio::test]
async fn test_call_timeout_fails_the_run() {
    let substrate = Arc::new(MockSubstrate::new());
    substrate.add_response(
        MockResponse::text("trace_specialist", "late").with_delay(Duration::from_secs(5)),
    );
    let cfg = RootscopeConfig {
        call_timeout_secs: 1,
        ..config()
    };

    let report = InvestigationOrchestrator::new(substrate, cfg)
        .investigate(InvestigationRequest::for_symptom("checkout hangs"), None)
        .await;

    assert_eq!(report.status, ReportStatus::Failed);
    assert!(report.summary.error.as_deref().unwrap().contains("timed out after 1s"));
}

#[tokio::test]
async fn test_total_timeout_releases_session() {
    let substrate = Arc::new(MockSubstrate::new());
    substrate.add_response(
        MockResponse::text("trace_specialist", "late").with_delay(Duration::from_secs(5)),
    );
    let sessions = Arc::new(StaticSessionProvider::new(None));
    let cfg = RootscopeConfig {
        total_timeout_secs: 1,
        ..config()
    };

    let report = InvestigationOrchestrator::new(substrate, cfg)
        .with_session_provider(sessions.clone())
        .investigate(InvestigationRequest::for_symptom("checkout hangs"), None)
        .await;

    assert_eq!(report.status, ReportStatus::Failed);
    assert!(report
        .summary
        .error
        .as_deref()
        .unwrap()
        .contains("total timeout"));
    assert_eq!(sessions.active_sessions(), 0);
}

#[tokio::test]
async fn test_session_failure_skips_substrate() {
    let substrate = Arc::new(MockSubstrate::new());
    scripted_run(&substrate);

    let report = InvestigationOrchestrator::new(substrate.clone(), config())
        .with_session_provider(Arc::new(RefusingSessions))
        .investigate(InvestigationRequest::for_symptom("checkout 502"), None)
        .await;

    assert_eq!(report.status, ReportStatus::Failed);
    assert!(substrate.requests().is_empty());
    assert!(report
        .summary
        .error
        .as_deref()
        .unwrap()
        .contains("expired credentials"));
}

#[tokio::test]
async fn test_payload_without_traces_fails() {
    let substrate = Arc::new(MockSubstrate::new());
    let report = InvestigationOrchestrator::new(substrate, config())
        .investigate(
            InvestigationRequest::for_symptom("checkout 502"),
            Some(&json!({"traces": []})),
        )
        .await;

    assert_eq!(report.status, ReportStatus::Failed);
    assert!(report
        .summary
        .error
        .as_deref()
        .unwrap()
        .starts_with("Trace extraction failed"));
}

#[tokio::test]
async fn test_unknown_trace_id_is_reported_and_run_continues() {
    let substrate = Arc::new(MockSubstrate::new());
    scripted_run(&substrate);
    let handler = Arc::new(RecordingHandler::default());

    let request = InvestigationRequest::from_value(&json!({
        "trace_ids": ["1-00000000-000000000000000000000000"],
        "primary_targets": [{"type": "lambda", "name": "checkout"}],
        "region": "eu-west-1"
    }))
    .unwrap();
    let report = InvestigationOrchestrator::new(substrate.clone(), config())
        .with_progress_handler(handler.clone())
        .investigate(request, Some(&payload()))
        .await;

    assert_eq!(report.status, ReportStatus::Completed);
    assert_eq!(handler.count(|e| matches!(e, ProgressEvent::TraceNotFound { .. })), 1);
    assert_eq!(report.affected_resources.len(), 1);
    assert_eq!(substrate.requests()[0].shared_state.resources[0].name, "checkout");
}

#[tokio::test]
async fn test_exchange_log_has_one_line_per_phase() {
    let substrate = Arc::new(MockSubstrate::new());
    scripted_run(&substrate);
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("exchanges.jsonl");

    let report = InvestigationOrchestrator::new(substrate, config())
        .with_exchange_logger(ExchangeLogger::new(Some(log_path.clone())))
        .investigate(InvestigationRequest::for_symptom("checkout 502"), None)
        .await;
    assert_eq!(report.status, ReportStatus::Completed);

    let log = fs::read_to_string(&log_path).unwrap();
    let lines: Vec<Value> = log
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0]["phase"], json!("TRACE_ANALYSIS"));
    assert_eq!(lines[3]["run_id"], json!(report.run_id));
}

#[tokio::test]
async fn test_legacy_request_value() {
    let substrate = Arc::new(MockSubstrate::new());
    scripted_run(&substrate);

    let report = InvestigationOrchestrator::new(substrate, config())
        .investigate_value(&json!({"trace_id": CHECKOUT_TRACE}), Some(&payload()))
        .await;

    assert_eq!(report.status, ReportStatus::Completed);
    assert_eq!(report.summary.resource_count, 3);
}
