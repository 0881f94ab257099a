//! Tracing initialisation
//!
//! Installs a `tracing-subscriber` formatter filtered by `RUST_LOG` when set,
//! otherwise by the configured level.

use tracing_subscriber::{fmt, EnvFilter};

/// Output format of the log formatter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
    Pretty,
}

impl LogFormat {
    /// Parse a format name, falling back to [`LogFormat::Full`]
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "compact" => LogFormat::Compact,
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Full,
        }
    }
}

/// Initialise the global subscriber
///
/// Returns `false` when a subscriber was already installed, which happens
/// routinely in tests.
pub fn init(level: &str, format: LogFormat) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = fmt().with_env_filter(filter).with_target(true);

    let installed = match format {
        LogFormat::Full => builder.try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };

    installed.is_ok()
}
