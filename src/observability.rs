use std::sync::OnceLock;
use tracing_subscriber::{
    EnvFilter, fmt, fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt,
};

static TRACING_INIT: OnceLock<()> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl LogFormat {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            "compact" => Self::Compact,
            _ => Self::Pretty,
        }
    }

    fn from_env() -> Self {
        std::env::var("REGAUTHZ_LOG_FORMAT")
            .map(|raw| Self::parse(&raw))
            .unwrap_or(Self::Pretty)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Compact => "compact",
            Self::Json => "json",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TracingSettings {
    pub filter: String,
    pub log_format: LogFormat,
}

/// Installs the global subscriber once. `RUST_LOG` wins over the configured
/// level; denials are logged at `warn`, decisions at `debug`.
pub fn init_from_env(default_level: &str) -> TracingSettings {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| format!("regauthz={default_level}"));
    let log_format = LogFormat::from_env();

    TRACING_INIT.get_or_init(|| {
        let env_filter =
            EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("regauthz=info"));
        let registry = tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_error::ErrorLayer::default());
        let result = match log_format {
            LogFormat::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .flatten_event(true)
                        .with_current_span(true)
                        .with_span_list(false),
                )
                .try_init(),
            LogFormat::Compact => registry
                .with(fmt::layer().compact().with_target(true))
                .try_init(),
            LogFormat::Pretty => registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_line_number(true)
                        .with_span_events(FmtSpan::CLOSE),
                )
                .try_init(),
        };
        if let Err(err) = result {
            eprintln!("tracing subscriber already installed: {err}");
        }
    });

    TracingSettings { filter, log_format }
}

#[cfg(test)]
mod tests {
    use super::LogFormat;

    #[test]
    fn parses_log_formats() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse(" compact "), LogFormat::Compact);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("fancy"), LogFormat::Pretty);
    }
}
