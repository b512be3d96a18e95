use std::panic::PanicHookInfo;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

const ENV_DEBUG: &str = "DECISION_DEBUG";

/// How replayed events and executor logs are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    /// One flattened JSON object per line, for log shippers.
    Json,
    /// Human readable, used while debugging a replay.
    Text,
}

impl LogFormat {
    fn from_debug_flag(debug: Option<&str>) -> Self {
        match debug {
            Some(v) if v.trim().eq_ignore_ascii_case("true") => LogFormat::Text,
            _ => LogFormat::Json,
        }
    }

    fn default_level(&self) -> Level {
        match self {
            LogFormat::Json => Level::INFO,
            LogFormat::Text => Level::DEBUG,
        }
    }
}

/// Logs a panic of an executor actor as a structured event, so it reaches the same stream as the
/// replay logs.
fn report_panic(info: &PanicHookInfo<'_>) {
    let payload = info
        .payload()
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| info.payload().downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>");
    let location = info
        .location()
        .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()));

    tracing::error!(location = location.as_deref(), payload, "Panicked");
}

/// Installs the global subscriber. `RUST_LOG` overrides the default level.
pub fn register() {
    let format = LogFormat::from_debug_flag(std::env::var(ENV_DEBUG).ok().as_deref());

    let filter = EnvFilter::builder()
        .with_default_directive(format.default_level().into())
        .from_env_lossy();

    let layer = match format {
        LogFormat::Text => fmt::layer().boxed(),
        LogFormat::Json => fmt::layer()
            .with_ansi(false)
            .json()
            .flatten_event(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .init();

    std::panic::set_hook(Box::new(report_panic));
}
