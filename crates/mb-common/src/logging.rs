//! Process-wide tracing setup shared by the matchboard binaries.
//!
//! [`init`] wires three things together: an `EnvFilter` driven by `RUST_LOG`,
//! an output target (stdout, or daily-rotated files when `MB_LOG_DIR` is
//! set), and a panic hook that reports panics as `tracing` error events so
//! they land in the same stream as request and batch logs.

use std::panic;
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

// Keeps the non-blocking file writer flushing for the process lifetime.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

enum LogTarget {
    Stdout,
    DailyFile(PathBuf),
}

/// Initialize logging for a binary: `RUST_LOG` filtering (default `info`),
/// output to stdout or `MB_LOG_DIR/<app>.log` with daily rotation, and panic
/// reporting through the subscriber. Safe to call more than once; later calls
/// are no-ops.
pub fn init(app_name: &'static str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match resolve_target() {
        LogTarget::Stdout => {
            let _ = builder.try_init();
        }
        LogTarget::DailyFile(dir) => {
            let appender = tracing_appender::rolling::daily(dir, format!("{app_name}.log"));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            let _ = builder.with_writer(BoxMakeWriter::new(writer)).try_init();
        }
    }

    route_panics_to_tracing(app_name);
}

fn resolve_target() -> LogTarget {
    let Some(dir) = std::env::var_os("MB_LOG_DIR") else {
        return LogTarget::Stdout;
    };

    let dir = PathBuf::from(dir);
    match std::fs::create_dir_all(&dir) {
        Ok(()) => LogTarget::DailyFile(dir),
        Err(err) => {
            // The subscriber is not up yet, so this cannot go through tracing.
            eprintln!(
                "cannot create log dir {}: {err}; logging to stdout",
                dir.display()
            );
            LogTarget::Stdout
        }
    }
}

fn route_panics_to_tracing(app_name: &'static str) {
    static HOOK: OnceLock<()> = OnceLock::new();

    HOOK.get_or_init(|| {
        let fallback = panic::take_hook();
        let with_backtrace = env_flag("MB_LOG_INCLUDE_BACKTRACE");

        panic::set_hook(Box::new(move |info| {
            let thread = std::thread::current();
            let location = info
                .location()
                .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
                .unwrap_or_else(|| "unknown".into());
            let message = if let Some(text) = info.payload().downcast_ref::<&str>() {
                (*text).to_string()
            } else if let Some(text) = info.payload().downcast_ref::<String>() {
                text.clone()
            } else {
                "non-string panic payload".into()
            };

            tracing::error!(
                application = app_name,
                thread = thread.name().unwrap_or("unnamed"),
                %location,
                panic_message = %message,
                "panic captured"
            );

            if with_backtrace {
                fallback(info);
            }
        }));
    });
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_flag_accepts_one_and_true_only() {
        std::env::set_var("MB_LOGGING_TEST_FLAG", "1");
        assert!(env_flag("MB_LOGGING_TEST_FLAG"));
        std::env::set_var("MB_LOGGING_TEST_FLAG", "TRUE");
        assert!(env_flag("MB_LOGGING_TEST_FLAG"));
        std::env::set_var("MB_LOGGING_TEST_FLAG", "yes");
        assert!(!env_flag("MB_LOGGING_TEST_FLAG"));
        std::env::remove_var("MB_LOGGING_TEST_FLAG");
        assert!(!env_flag("MB_LOGGING_TEST_FLAG"));
    }
}
