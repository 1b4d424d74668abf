use rootscope_agents::{
    AgentSubstrate, GenAiSubstrate, ProbeRegistry, RecordingMode, RecordingSubstrate,
    StaticSessionProvider,
};
use rootscope_cli::cli::commands::{CliArgs, Commands, ConfigArgs, ExtractArgs, InvestigateArgs};
use rootscope_cli::cli::output::{OutputFormat, OutputFormatter};
use rootscope_cli::{NAME, VERSION};
use rootscope_core::logging::{init_logging, parse_level, LoggingConfig};
use rootscope_core::{LoggingHandler, ReportStatus, RootscopeConfig};
use rootscope_pipeline::{extract, extract_for_trace, ExtractionOutcome, InvestigationOrchestrator};

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use std::env;
use std::fs;
use std::path::Path;
use std::process;
use std::sync::Arc;
use tracing::{debug, error, info, warn, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("{} v{} starting", NAME, VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Investigate(investigate_args) => handle_investigate(investigate_args).await,
        Commands::Extract(extract_args) => handle_extract(extract_args),
        Commands::Config(config_args) => handle_config(config_args),
    };

    process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let level = if let Some(level_str) = &args.log_level {
        parse_level(level_str)
    } else if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        let level_str = env::var("ROOTSCOPE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        parse_level(&level_str)
    };

    let use_json = env::var("ROOTSCOPE_LOG_JSON")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);

    init_logging(LoggingConfig {
        level,
        use_json,
        ..LoggingConfig::default()
    });
}

fn read_json(path: &Path) -> Result<Value> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn write_output(rendered: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Report written to {}", path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

fn build_substrate(
    config: &RootscopeConfig,
    args: &InvestigateArgs,
) -> Result<Arc<dyn AgentSubstrate>> {
    let substrate: Arc<dyn AgentSubstrate> = Arc::new(GenAiSubstrate::from_config(config));

    let Some(dir) = &args.recordings_dir else {
        return Ok(substrate);
    };

    let mode = RecordingMode::from_env(RecordingMode::Auto);
    let mut recording = RecordingSubstrate::new(substrate, mode, dir.clone())
        .with_context(|| format!("Failed to open recordings directory {}", dir.display()))?;
    recording.preload_cache()?;
    debug!(dir = %dir.display(), mode = ?mode, "Substrate recording enabled");
    Ok(Arc::new(recording))
}

async fn handle_investigate(args: &InvestigateArgs) -> i32 {
    let default_config = RootscopeConfig::default();
    let config = RootscopeConfig {
        provider: args.backend.unwrap_or(default_config.provider),
        model: args.model.clone().unwrap_or(default_config.model.clone()),
        call_timeout_secs: args.timeout.unwrap_or(default_config.call_timeout_secs),
        ..default_config
    };

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        eprintln!("\nPlease check your ROOTSCOPE_* environment variables and command-line arguments.");
        return 1;
    }

    let request = match args.request_value() {
        Ok(request) => request,
        Err(e) => {
            error!("{:#}", e);
            return 1;
        }
    };

    let trace_payload = match args.trace_file.as_deref().map(read_json).transpose() {
        Ok(payload) => payload,
        Err(e) => {
            error!("{:#}", e);
            return 1;
        }
    };

    let substrate = match build_substrate(&config, args) {
        Ok(substrate) => substrate,
        Err(e) => {
            error!("Failed to initialize agent substrate: {:#}", e);
            return 1;
        }
    };

    let probes = match &args.probe_dir {
        Some(dir) => ProbeRegistry::from_fixture_dir(dir),
        None => {
            warn!("No --probe-dir given, service analysis will run without probes");
            ProbeRegistry::new()
        }
    };

    debug!(
        provider = ?config.provider,
        model = %config.model,
        "Substrate configured"
    );
    let orchestrator = InvestigationOrchestrator::new(substrate, config)
        .with_session_provider(Arc::new(StaticSessionProvider::from_env()))
        .with_probes(probes)
        .with_progress_handler(Arc::new(LoggingHandler));

    let report = orchestrator
        .investigate_value(&request, trace_payload.as_ref())
        .await;

    let format = args.format.map(OutputFormat::from).unwrap_or_else(|| {
        if atty::is(atty::Stream::Stdout) {
            OutputFormat::Human
        } else {
            OutputFormat::Json
        }
    });

    let rendered = match OutputFormatter::new(format).format_report(&report) {
        Ok(rendered) => rendered,
        Err(e) => {
            error!("Failed to format report: {:#}", e);
            return 1;
        }
    };
    if let Err(e) = write_output(&rendered, args.output.as_deref()) {
        error!("{:#}", e);
        return 1;
    }

    match report.status {
        ReportStatus::Completed => 0,
        ReportStatus::Failed => 1,
        status => {
            warn!(status = %status, "Investigation stopped early, report is partial");
            2
        }
    }
}

fn handle_extract(args: &ExtractArgs) -> i32 {
    let payload = match read_json(&args.trace_file) {
        Ok(payload) => payload,
        Err(e) => {
            error!("{:#}", e);
            return 1;
        }
    };

    let graph = match &args.trace_id {
        Some(trace_id) => match extract_for_trace(&payload, trace_id) {
            Ok(ExtractionOutcome::Found(graph)) => graph,
            Ok(ExtractionOutcome::NotFound { trace_id }) => {
                error!("Trace {} not found in {}", trace_id, args.trace_file.display());
                return 1;
            }
            Err(e) => {
                error!("{}", e);
                return 1;
            }
        },
        None => match extract(&payload) {
            Ok(graph) => graph,
            Err(e) => {
                error!("{}", e);
                return 1;
            }
        },
    };

    match OutputFormatter::new(args.format.into()).format_graph(&graph) {
        Ok(rendered) => {
            println!("{}", rendered);
            0
        }
        Err(e) => {
            error!("Failed to format resource graph: {:#}", e);
            1
        }
    }
}

fn handle_config(args: &ConfigArgs) -> i32 {
    let config = RootscopeConfig::default();

    match OutputFormatter::new(args.format.into()).format_config(&config) {
        Ok(rendered) => println!("{}", rendered),
        Err(e) => {
            error!("Failed to format configuration: {:#}", e);
            return 1;
        }
    }

    match config.validate() {
        Ok(()) => 0,
        Err(e) => {
            error!("Configuration error: {}", e);
            1
        }
    }
}
