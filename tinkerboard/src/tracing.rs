//! Logging setup for the adaptor binaries.
//!
//! Library code never installs a subscriber; it only emits events through
//! `use crate::tracing::prelude::*`. The daemon calls
//! [`init_journald_or_stdout`] and the CLI calls [`init_stderr`] once at
//! startup.

use std::env;
use std::io;
use time::OffsetDateTime;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt::{format::Writer, time::FormatTime},
    prelude::*,
};

pub mod prelude {
    #[allow(unused_imports)]
    pub use tracing::{debug, error, info, trace, warn};
}

use prelude::*;

/// Initialize logging for the daemon.
///
/// Under systemd (`JOURNAL_STREAM` set) events go to journald; otherwise to
/// stdout at INFO unless `RUST_LOG` says otherwise.
pub fn init_journald_or_stdout() {
    if env::var("JOURNAL_STREAM").is_ok() {
        if let Ok(layer) = tracing_journald::layer() {
            tracing_subscriber::registry().with(layer).init();
        } else {
            use_stdout();
            error!("Failed to initialize journald logging, using stdout.");
        }
    } else {
        use_stdout();
    }
}

/// Initialize logging for one-shot tools.
///
/// Stdout belongs to command output, so events go to stderr and default to
/// WARN.
pub fn init_stderr() {
    tracing_subscriber::registry()
        .with(env_filter(LevelFilter::WARN))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_timer(LocalTimer),
        )
        .init();
}

fn use_stdout() {
    tracing_subscriber::registry()
        .with(env_filter(LevelFilter::INFO))
        .with(tracing_subscriber::fmt::layer().with_timer(LocalTimer))
        .init();
}

fn env_filter(default: LevelFilter) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(default.into())
        .with_env_var("RUST_LOG")
        .from_env_lossy()
}

// Local time to the nearest second; the default UTC timestamp is long and
// hard to line up with a board's wall clock.
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = OffsetDateTime::now_local().unwrap_or(OffsetDateTime::now_utc());
        let formatted = now
            .format(time::macros::format_description!("[hour]:[minute]:[second]"))
            .map_err(|_| std::fmt::Error)?;
        write!(w, "{}", formatted)
    }
}
