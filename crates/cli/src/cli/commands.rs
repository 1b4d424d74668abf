use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use genai::adapter::AdapterKind;
use rootscope_core::config::parse_provider;
use serde_json::{json, Map, Value};
use std::path::PathBuf;

/// Trace-driven root cause investigation for serverless infrastructure
#[derive(Parser, Debug)]
#[command(
    name = "rootscope",
    about = "Trace-driven root cause investigation for serverless infrastructure",
    version,
    long_about = "rootscope extracts the resources on a failing request path from distributed \
                  traces, probes them, and drives a bounded team of reasoning agents to a \
                  structured root-cause report."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Investigate a failure",
        long_about = "Runs a full investigation and prints the report.\n\n\
                      Examples:\n  \
                      rootscope investigate --trace-file traces.json --trace-id 1-5f84c7a1-3b2c4d5e6f708192a3b4c5d6\n  \
                      rootscope investigate --resource checkout --resource-type lambda --symptom 'checkout returns 502'\n  \
                      rootscope investigate --request '{\"target\": \"arn:aws:lambda:us-east-1:123456789012:function:checkout\"}'"
    )]
    Investigate(InvestigateArgs),

    #[command(
        about = "Extract the resource graph from a trace payload",
        long_about = "Parses a trace payload and prints the resources, relationships and \
                      undecodable segments without invoking any agent.\n\n\
                      Examples:\n  \
                      rootscope extract --trace-file traces.json\n  \
                      rootscope extract --trace-file traces.json --format yaml"
    )]
    Extract(ExtractArgs),

    #[command(about = "Show the effective configuration")]
    Config(ConfigArgs),
}

#[derive(Parser, Debug, Clone)]
#[command(group(
    ArgGroup::new("subject")
        .required(true)
        .multiple(true)
        .args(["request", "trace_id", "resource", "symptom", "trace_file"])
))]
pub struct InvestigateArgs {
    #[arg(long, value_name = "FILE", help = "Trace payload ({\"Traces\": [...]}) to extract resources from")]
    pub trace_file: Option<PathBuf>,

    #[arg(
        long,
        value_name = "JSON",
        conflicts_with_all = ["trace_id", "resource", "symptom"],
        help = "Full investigation request as JSON"
    )]
    pub request: Option<String>,

    #[arg(long, value_name = "ID", help = "Trace id to investigate")]
    pub trace_id: Option<String>,

    #[arg(long, value_name = "NAME_OR_ARN", help = "Resource name or ARN to investigate")]
    pub resource: Option<String>,

    #[arg(
        long,
        value_name = "TYPE",
        default_value = "lambda",
        help = "Resource type when --resource is a plain name"
    )]
    pub resource_type: String,

    #[arg(long, value_name = "TEXT", help = "Free-text description of the symptom")]
    pub symptom: Option<String>,

    #[arg(long, value_name = "REGION", help = "Region to investigate in")]
    pub region: Option<String>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        help = "Output format (defaults to human on a terminal, json otherwise)"
    )]
    pub format: Option<OutputFormatArg>,

    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "Write the report to a file instead of stdout"
    )]
    pub output: Option<PathBuf>,

    #[arg(long, value_name = "DIR", help = "Serve probe results from <DIR>/<type>/<name>.json")]
    pub probe_dir: Option<PathBuf>,

    #[arg(
        long,
        value_name = "DIR",
        help = "Record or replay substrate exchanges in DIR (see ROOTSCOPE_RECORDING_MODE)"
    )]
    pub recordings_dir: Option<PathBuf>,

    #[arg(
        short = 'b',
        long,
        value_parser = parse_adapter_kind,
        help = "AI provider backing the agent substrate"
    )]
    pub backend: Option<AdapterKind>,

    #[arg(short = 'm', long, value_name = "MODEL", help = "Model name (provider-specific)")]
    pub model: Option<String>,

    #[arg(long, value_name = "SECONDS", help = "Per-call substrate timeout")]
    pub timeout: Option<u64>,
}

impl InvestigateArgs {
    /// The request document handed to the engine. Flags combine into one
    /// object; `--request` is taken as-is.
    pub fn request_value(&self) -> Result<Value> {
        if let Some(raw) = &self.request {
            let value: Value =
                serde_json::from_str(raw).context("--request is not valid JSON")?;
            return Ok(value);
        }

        let mut request = Map::new();
        if let Some(trace_id) = &self.trace_id {
            request.insert("trace_id".to_string(), json!(trace_id));
        }
        if let Some(resource) = &self.resource {
            if resource.starts_with("arn:") {
                request.insert("target".to_string(), json!(resource));
            } else {
                request.insert("resource_name".to_string(), json!(resource));
                request.insert("resource_type".to_string(), json!(self.resource_type));
            }
        }
        if let Some(symptom) = &self.symptom {
            request.insert("symptom".to_string(), json!(symptom));
        }
        if let Some(region) = &self.region {
            request.insert("region".to_string(), json!(region));
        }

        if request.is_empty() && self.trace_file.is_none() {
            bail!("Nothing to investigate: pass --trace-id, --resource, --symptom, --request or --trace-file");
        }
        Ok(Value::Object(request))
    }
}

#[derive(Parser, Debug, Clone)]
pub struct ExtractArgs {
    #[arg(long, value_name = "FILE", help = "Trace payload to parse")]
    pub trace_file: PathBuf,

    #[arg(long, value_name = "ID", help = "Only extract this trace")]
    pub trace_id: Option<String>,

    #[arg(short = 'f', long, value_enum, default_value = "json", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct ConfigArgs {
    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}

fn parse_adapter_kind(s: &str) -> Result<AdapterKind, String> {
    parse_provider(s).map_err(|e| e.to_string())
}
