//! Logging utilities

use tracing::{error, info};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

/// Environment variable holding the log filter, e.g. `traytracker=debug`
pub const LOG_ENV: &str = "TRAYTRACKER_LOG";

pub fn parse_log_level() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::INFO.into()));

    tracing_subscriber::fmt().with_env_filter(filter).init();
    info!(
        "Initialised logger: welcome to traytracker v{}!",
        env!("CARGO_PKG_VERSION")
    );
}

/// Create an oops (a fatal crash) with an associated error message
pub fn oops<S: Into<String>>(msg: S, code: u16) -> ! {
    error!("{}", msg.into());
    std::process::exit(code.into());
}
