//! Tracing setup for the annotator binary.

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Install the global subscriber: step reports from this binary at INFO on
/// stderr, dependency crates capped at WARN so kube transport chatter stays
/// out of the before/after output. `RUST_LOG` overrides both.
pub fn init() {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(env_filter());

    tracing_subscriber::registry().with(fmt_layer).init();
}

fn env_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy()
        .add_directive("annotator=info".parse().expect("static directive"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_keeps_this_binary_at_info() {
        let filter = env_filter();
        assert!(filter.to_string().contains("annotator=info"));
    }
}
