//! Tracing subscriber setup: console output plus an optional non-blocking
//! file sink, in either pretty or JSON-lines form.

use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::FILE_GUARD;

/// Initialize the global tracing subscriber.
///
/// `level` is used as the default filter when `RUST_LOG` is unset. When
/// `file` is `Some`, logs are additionally written there through a
/// non-blocking appender; `rotation` selects "daily", "hourly", or anything
/// else for "never" (a single never-rotated file). The file's `WorkerGuard`
/// is stashed in [`FILE_GUARD`] so the background writer thread lives for
/// the process lifetime.
pub fn init_tracing(json: bool, level: &str, file: Option<&str>, rotation: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console = if json {
        fmt::layer().json().with_target(false).boxed()
    } else {
        fmt::layer().with_target(false).boxed()
    };

    let registry = tracing_subscriber::registry().with(filter).with(console);

    if let Some(path) = file {
        let path = std::path::Path::new(path);
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("depth_cli.log");

        let appender = match rotation {
            Some("daily") => tracing_appender::rolling::daily(dir, file_name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, file_name),
            _ => tracing_appender::rolling::never(dir, file_name),
        };
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);

        let file_layer = if json {
            fmt::layer().json().with_ansi(false).with_writer(non_blocking).boxed()
        } else {
            fmt::layer().with_ansi(false).with_writer(non_blocking).boxed()
        };
        registry.with(file_layer).init();
    } else {
        registry.init();
    }
}
