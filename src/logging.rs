use std::sync::OnceLock;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOGGER_INIT: OnceLock<()> = OnceLock::new();

const DEFAULT_LOG_DIRECTIVES: &str = "info,sqlx=warn";
const VERBOSE_LOG_DIRECTIVES: &str = "debug,sqlx=info";

/// Installs the stderr subscriber. `RUST_LOG` wins over the defaults.
pub fn init_logging(verbose: bool) {
    LOGGER_INIT.get_or_init(|| {
        let fallback = if verbose {
            VERBOSE_LOG_DIRECTIVES
        } else {
            DEFAULT_LOG_DIRECTIVES
        };
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .try_init();
    });
}
