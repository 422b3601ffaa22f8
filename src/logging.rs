use tracing::Level;

/// Picks the log level from the first command line argument, defaulting to INFO.
pub fn level_from_args(args: &[String]) -> Level {
    match args.get(1).map(String::as_str) {
        Some("debug") => Level::DEBUG,
        Some("warn") => Level::WARN,
        Some("error") => Level::ERROR,
        _ => Level::INFO,
    }
}

pub fn init(level: Level) {
    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .with_max_level(level)
        .init();

    tracing::info!("Log level set to: {}", level);
}
