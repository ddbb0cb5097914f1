//! Logging setup.
//!
//! The library only emits `tracing` events. Binaries, tests and benches
//! that want to see them call [`init`] or [`init_with_filter`]; the filter
//! comes from `RUST_LOG` when set. Per-comparison events are at `trace`,
//! clause-level events at `debug`, search summaries at `info`.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing with the `info` default filter.
pub fn init() {
    init_with_filter("info");
}

/// Initialize tracing with a custom default filter.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_with_filter(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Repeated initialization does not panic.
    #[test]
    fn init_twice() {
        init_with_filter("warn");
        init();
        tracing::info!("logging initialized");
    }
}
