use serde::{Serialize, Serializer};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

#[derive(Serialize)]
struct ExchangeEntry<'a, I, O>
where
    I: Serialize,
    O: Serialize,
{
    run_id: &'a str,
    phase: &'a str,
    #[serde(serialize_with = "serialize_as_json")]
    input: &'a I,
    #[serde(serialize_with = "serialize_as_json")]
    output: &'a O,
    latency_ms: u64,
    timestamp: String,
}

fn serialize_as_json<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    let json_string = serde_json::to_string(value).map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&json_string)
}

/// Appends one JSON line per substrate exchange. Disabled loggers are no-ops.
pub struct ExchangeLogger {
    writer: Option<Arc<Mutex<BufWriter<File>>>>,
}

impl ExchangeLogger {
    pub fn new(log_file: Option<PathBuf>) -> Self {
        let writer = log_file.and_then(|path| {
            match OpenOptions::new().create(true).append(true).open(&path) {
                Ok(file) => Some(Arc::new(Mutex::new(BufWriter::new(file)))),
                Err(e) => {
                    warn!("Failed to open exchange log file {:?}: {}", path, e);
                    None
                }
            }
        });

        Self { writer }
    }

    pub fn disabled() -> Self {
        Self { writer: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }

    pub fn log_exchange<I, O>(&self, run_id: &str, phase: &str, input: &I, output: &O, latency_ms: u64)
    where
        I: Serialize,
        O: Serialize,
    {
        let Some(writer) = &self.writer else {
            return;
        };

        let entry = ExchangeEntry {
            run_id,
            phase,
            input,
            output,
            latency_ms,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        if let Ok(mut writer) = writer.lock() {
            match serde_json::to_string(&entry) {
                Ok(json) => {
                    if let Err(e) = writeln!(writer, "{}", json) {
                        warn!("Failed to write exchange log entry: {}", e);
                    }
                    if let Err(e) = writer.flush() {
                        warn!("Failed to flush exchange log: {}", e);
                    }
                }
                Err(e) => {
                    warn!("Failed to serialize exchange entry for phase {}: {}", phase, e);
                }
            }
        }

        debug!(run_id, phase, latency_ms, "Exchange logged");
    }
}

impl Default for ExchangeLogger {
    fn default() -> Self {
        Self::disabled()
    }
}
