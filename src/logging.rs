use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Install the tracing subscriber. Safe to call more than once; only the
/// first call takes effect. `TALLYBOOK_LOG` overrides the default filter.
pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("TALLYBOOK_LOG")
            .unwrap_or_else(|_| EnvFilter::new("info,tallybook=debug"));
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    });
}
