// file: src/logging/logger.rs
// version: 2.0.0
// guid: j0k1l2m3-n4o5-6789-0123-456789jklmno

//! Logger initialization and operation spans

use crate::error::ProvisionError;
use crate::Result;
use tracing::Instrument;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn level_filter(verbose: bool, quiet: bool) -> EnvFilter {
    if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    }
}

/// Initialize the logging system.
///
/// Logs go to stderr so results printed on stdout stay machine readable.
/// `RUST_LOG` overrides the level chosen by the flags.
pub fn init_logger(verbose: bool, quiet: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| level_filter(verbose, quiet));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init()
        .map_err(|e| ProvisionError::config(format!("Failed to initialize logger: {}", e)))?;

    Ok(())
}

/// Initialize JSON log lines on stderr, used with `--json-output`
pub fn init_json_logger(verbose: bool, quiet: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| level_filter(verbose, quiet));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| ProvisionError::config(format!("Failed to initialize JSON logger: {}", e)))?;

    Ok(())
}

/// Run an installation phase inside a named span
pub async fn with_async_operation_span<F, Fut, R>(operation: &str, f: F) -> R
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = R>,
{
    let span = tracing::info_span!("phase", name = operation);
    async move { f().await }.instrument(span).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logger_is_once_per_process() {
        // Arrange
        let first = init_logger(false, false);

        // Act
        let second = init_json_logger(true, false);

        // Assert
        // another test may have installed a subscriber first
        assert!(first.is_err() || second.is_err());
    }

    #[test]
    fn test_level_filter_precedence() {
        assert_eq!(level_filter(true, true).to_string(), "error");
        assert_eq!(level_filter(true, false).to_string(), "debug");
        assert_eq!(level_filter(false, false).to_string(), "info");
    }

    #[tokio::test]
    async fn test_with_async_operation_span() {
        // Arrange
        let operation = "bootstrap";
        let mut executed = false;

        // Act
        let result = with_async_operation_span(operation, || async {
            executed = true;
            "async_result"
        })
        .await;

        // Assert
        assert!(executed);
        assert_eq!(result, "async_result");
    }

    #[tokio::test]
    async fn test_with_async_operation_span_propagates_errors() {
        let result: Result<()> = with_async_operation_span("join workers", || async {
            Err(ProvisionError::parse("join command not found"))
        })
        .await;

        assert!(matches!(result, Err(ProvisionError::ParseError(_))));
    }
}
