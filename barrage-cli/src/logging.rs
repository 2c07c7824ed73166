use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration for the command line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    pub level: String,

    /// Whether to emit one JSON object per log line
    pub json_format: bool,

    /// Whether to include file and line number information
    pub include_file_info: bool,

    /// Whether to enable colored output (only for non-JSON format)
    pub enable_colors: bool,

    /// Module-specific log levels
    pub module_levels: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let mut module_levels = HashMap::new();

        // Transport internals are noisy at debug.
        module_levels.insert("hyper".to_string(), "warn".to_string());
        module_levels.insert("reqwest".to_string(), "warn".to_string());
        module_levels.insert("rustls".to_string(), "warn".to_string());

        Self {
            level: "info".to_string(),
            json_format: false,
            include_file_info: false,
            enable_colors: true,
            module_levels,
        }
    }
}

impl LoggingConfig {
    /// Filter built from the configured level, unless `RUST_LOG` is set.
    pub fn filter(&self) -> anyhow::Result<EnvFilter> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }

        let mut filter = EnvFilter::try_new(&self.level)
            .map_err(|e| anyhow::anyhow!("invalid log level {:?}: {}", self.level, e))?;
        for (module, level) in &self.module_levels {
            let directive = format!("{}={}", module, level);
            filter = filter.add_directive(
                directive
                    .parse()
                    .map_err(|e| anyhow::anyhow!("invalid log directive {:?}: {}", directive, e))?,
            );
        }
        Ok(filter)
    }
}

/// Initialize logging on stderr; stdout is reserved for results.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let registry = tracing_subscriber::registry().with(config.filter()?);

    // Try to initialize logging, ignore if already initialized
    let result = if config.json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_file(config.include_file_info)
                    .with_line_number(config.include_file_info),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(config.include_file_info)
                    .with_line_number(config.include_file_info)
                    .with_ansi(config.enable_colors),
            )
            .try_init()
    };

    match result {
        Ok(()) => tracing::debug!("Logging initialized with level: {}", config.level),
        Err(_) => tracing::debug!("Logging already initialized, skipping"),
    }

    Ok(())
}
