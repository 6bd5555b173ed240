use tracing_subscriber::{fmt, EnvFilter};

/// Install the stderr log subscriber.
///
/// `RUST_LOG` wins when set; otherwise the level follows `-v`
/// (warn, info, debug). Logs go to stderr so stdout stays parseable.
pub fn init(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
