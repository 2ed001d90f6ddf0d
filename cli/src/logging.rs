//! Subscriber setup for the `treeforge` binary.

use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use treeforge_core::api::LoggingConfig;

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber described by `logging`.
pub fn install(logging: &LoggingConfig) -> Result<(), String> {
    if !logging.enabled {
        return Ok(());
    }

    let file = match logging.file {
        true => Some(file_writer(logging)?),
        false => None,
    };
    if !logging.console && file.is_none() {
        return Err("logging disabled for both console and file".to_string());
    }

    let spans = span_events(logging);
    let console = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(atty::is(atty::Stream::Stderr))
            .with_span_events(spans.clone())
    });
    let file = file.map(|writer| {
        tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_span_events(spans.clone())
    });

    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::registry()
        .with(filter(env.as_deref(), &logging.level)?)
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| e.to_string())
}

/// `RUST_LOG` when set, the configured level otherwise.
fn filter(env: Option<&str>, level: &str) -> Result<EnvFilter, String> {
    let directives = env.filter(|v| !v.trim().is_empty()).unwrap_or(level);
    EnvFilter::try_new(directives).map_err(|e| format!("invalid log filter `{directives}`: {e}"))
}

/// Node and pass spans report their busy/idle time on close when timings
/// are on.
fn span_events(logging: &LoggingConfig) -> FmtSpan {
    if logging.timings {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

fn file_writer(logging: &LoggingConfig) -> Result<NonBlocking, String> {
    let dir = logging
        .directory
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("treeforge"));
    std::fs::create_dir_all(&dir).map_err(|e| format!("create log dir {} failed: {e}", dir.display()))?;

    let appender = tracing_appender::rolling::never(&dir, format!("treeforge.{}.log", std::process::id()));
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = FILE_GUARD.set(guard);
    Ok(writer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_log_wins_over_the_configured_level() {
        assert!(directives(Some("treeforge_core=trace"), "warn").contains("treeforge_core=trace"));
        assert!(!directives(Some("treeforge_core=trace"), "warn").contains("warn"));
        assert!(directives(Some("   "), "debug").contains("debug"));
    }

    #[test]
    fn malformed_levels_are_reported() {
        let err = filter(None, "treeforge_core=loud").unwrap_err();
        assert!(err.contains("treeforge_core=loud"));
    }

    #[test]
    fn timings_enable_close_events() {
        let mut logging = LoggingConfig::default();
        assert_eq!(span_events(&logging), FmtSpan::NONE);
        logging.timings = true;
        assert_eq!(span_events(&logging), FmtSpan::CLOSE);
    }

    fn directives(env: Option<&str>, level: &str) -> String {
        filter(env, level).unwrap().to_string()
    }
}
