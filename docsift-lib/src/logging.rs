//! Logging setup.
//!
//! Log targets used by the library: `chunk`, `embed`, `index`, `pipeline`.
//!
//! # Configuration
//!
//! ```toml
//! [logging]
//! default = "warn"  # quiet by default
//!
//! [logging.modules]
//! index = "debug"
//! ```
//!
//! `RUST_LOG` takes precedence over config:
//! ```bash
//! RUST_LOG=pipeline=info,index=debug docsift ingest notes.txt --id 1
//! ```

use std::sync::Once;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Initialize logging with configuration.
///
/// Call once at startup. Safe to call multiple times (only first call takes effect).
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(filter_directives(config))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr);

        // a subscriber may already be installed by the host application
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init();
    });
}

/// Initialize logging with default configuration (`warn`).
pub fn init() {
    init_with_config(&LoggingConfig::default());
}

/// Build an `EnvFilter` directive string from config.
fn filter_directives(config: &LoggingConfig) -> String {
    let mut modules: Vec<_> = config.modules.iter().collect();
    modules.sort();

    let mut directives = config.default.clone();
    for (module, level) in modules {
        directives.push_str(&format!(",{module}={level}"));
    }
    directives
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        assert_eq!(filter_directives(&LoggingConfig::default()), "warn");
    }

    #[test]
    fn test_module_directives_sorted() {
        let mut config = LoggingConfig::default();
        config.modules.insert("pipeline".to_string(), "info".to_string());
        config.modules.insert("index".to_string(), "debug".to_string());

        assert_eq!(filter_directives(&config), "warn,index=debug,pipeline=info");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init();
        init();
    }
}
