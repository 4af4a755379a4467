use std::io;
use std::path::Path;
use tracing::Level;
use tracing_appender::rolling;
use tracing_subscriber::filter::FilterFn;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const CONSOLE_FILTER: &str = "info,llm_request=info,web_request=warn,db_query=warn,sqlx=off";
const FILE_FILTER: &str = "info,llm_request=debug,pipeline=debug,sqlx=info";

/// Installs the global subscriber.
///
/// The console layer writes to stderr so stdout stays free for the JSON
/// result payload. `RUST_LOG` overrides the console filter.
pub fn configure_logging(log_dir: &Path) {
    // Drop noisy HTTP connection-pool warnings
    let custom_filter = FilterFn::new(|metadata| {
        !(metadata.level() == &Level::WARN && metadata.target().starts_with("hyper"))
    });

    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(CONSOLE_FILTER));

    let stderr_log = fmt::layer()
        .with_writer(io::stderr)
        .with_filter(console_filter)
        .with_filter(custom_filter);

    let file_appender = rolling::daily(log_dir, "rainscout.log");
    let file_log = fmt::layer()
        .with_ansi(false)
        .with_writer(file_appender)
        .with_filter(EnvFilter::new(FILE_FILTER));

    // A second call (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::Registry::default()
        .with(stderr_log)
        .with(file_log)
        .try_init();
}
