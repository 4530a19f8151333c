//! Logging setup over the `log` facade. This module (re)exports the five
//! logging macros: `error!`, `warn!`, `info!`, `debug!` and `trace!` where
//! `error!` represents the highest-priority log messages and `trace!` the
//! lowest.
//!
//! Logging is _disabled_ by default. Enable it with [`set_log_level`] before
//! constructing the simulation, or map a `-v` count from the command line
//! through [`verbosity_level`].

use env_logger::Builder;
pub use log::{debug, error, info, trace, warn, LevelFilter};

/// Logging disabled.
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Off;

/// Sets the global log level, installing the logger on first use. The global
/// logger can only be installed once per process; later calls still adjust
/// the maximum level.
pub fn set_log_level(level: LevelFilter) {
    let _ = Builder::new().filter_level(level).try_init();
    log::set_max_level(level);
}

/// Maps a repeated `-v` flag count to a level filter: `-v` enables INFO,
/// `-vv` DEBUG, and `-vvv` (or more) TRACE.
#[must_use]
pub fn verbosity_level(count: u8) -> LevelFilter {
    match count {
        0 => DEFAULT_LOG_LEVEL,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}
