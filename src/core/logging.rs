//! Structured-logging setup. Maps a `print_level` scalar (0=no_print ..
//! 6=trace) onto a `tracing` level, and installs a subscriber honoring
//! `RUST_LOG`/`EnvFilter` when the caller wants to override it.

use tracing::Level;

/// `print_level` values recognized by the core: 0=no_print .. 6=trace.
pub fn print_level_to_tracing(print_level: u8) -> Option<Level> {
    match print_level {
        0 => None,
        1 => Some(Level::ERROR),
        2 => Some(Level::WARN),
        3 => Some(Level::INFO),
        4 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    }
}

/// Installs a global `tracing_subscriber` filtered at the level implied by
/// `print_level`, unless `RUST_LOG` is already set (in which case the
/// environment wins). Idempotent: a second call is a harmless no-op because
/// `set_global_default` failing (subscriber already installed) is ignored.
pub fn init_from_print_level(print_level: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match print_level_to_tracing(print_level) {
            Some(level) => EnvFilter::new(level.to_string()),
            None => EnvFilter::new("off"),
        }
    };

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
