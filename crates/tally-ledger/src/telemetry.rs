//! Structured logging bootstrap.
//!
//! ## Filter Precedence
//! - `RUST_LOG` when set
//! - `logging.filter` from the config (or `TALLY_LOG`)
//! - [`DEFAULT_FILTER`]

use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;

pub const DEFAULT_FILTER: &str = "info,tally=debug,sqlx=warn";

/// Installs the global fmt subscriber.
///
/// Returns `false` if a subscriber was already installed (e.g. a second call
/// from a test); that is not an error.
pub fn init_tracing(settings: &LoggingSettings) -> bool {
    let directives = filter_directives(std::env::var("RUST_LOG").ok(), settings);
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

/// Picks the filter directives by precedence.
fn filter_directives(rust_log: Option<String>, settings: &LoggingSettings) -> String {
    rust_log
        .filter(|v| !v.trim().is_empty())
        .or_else(|| settings.filter.clone())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        let configured = LoggingSettings {
            filter: Some("warn".to_string()),
        };

        assert_eq!(filter_directives(Some("trace".into()), &configured), "trace");
        assert_eq!(filter_directives(Some("  ".into()), &configured), "warn");
        assert_eq!(filter_directives(None, &configured), "warn");
        assert_eq!(filter_directives(None, &LoggingSettings::default()), DEFAULT_FILTER);
    }

    #[test]
    fn test_second_init_is_harmless() {
        let settings = LoggingSettings::default();
        init_tracing(&settings);
        assert!(!init_tracing(&settings));
    }
}
