//! Tracing subscriber setup: a plain function any binary or test harness
//! embedding this crate can call once at startup.

use crate::error::EngineResult;

/// Initialize the process-wide tracing subscriber from `RUST_LOG` (or
/// the crate's default filter if unset). Safe to call more than once;
/// subsequent calls are no-ops.
pub fn init() -> EngineResult<()> {
    let result = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    match result {
        Ok(()) => {
            tracing::info!("ast-core-engine logging initialized");
            Ok(())
        }
        Err(_) => Ok(()), // already initialized by an earlier call
    }
}

