use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding a `tracing` filter directive, e.g. `hisaab=debug`.
pub const LOG_ENV: &str = "HISAAB_LOG";

/// Install the global subscriber. Logs go to stderr so report output on
/// stdout stays machine-readable.
///
/// `HISAAB_LOG` wins when set; otherwise `warn`, or `debug` with `--verbose`.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    if tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .is_err()
    {
        tracing::debug!("tracing subscriber already installed, keeping it");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_keeps_first_subscriber() {
        init_tracing(false);
        init_tracing(true);
        tracing::debug!("still logging");
    }
}
