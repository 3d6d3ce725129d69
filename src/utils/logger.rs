// Logger initialization

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `format` is "json" for one JSON object per line (what CloudWatch expects
/// from a Lambda function) and anything else for human-readable text.
pub fn init_logger(filter: &str, format: &str) {
    let registry = tracing_subscriber::registry().with(EnvFilter::new(filter));

    if format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false).with_target(false))
            .init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
