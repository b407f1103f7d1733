//! Logger and logging macros
//!
//! The `log` macros are re-exported at the crate root so that every crate in the workspace
//! logs through `galaxy_core::{trace, debug, info, warn, error}`.

pub use log::{Level, LevelFilter};
use log4rs::{Config, config::Root};
use std::path::Path;
use thiserror::Error;

mod appender;
mod consts;
mod logger;

pub use consts::*;

#[derive(Clone, Debug, Error)]
pub enum LogError {
    #[error("logger spec parsing error: {0}")]
    ParseLoggerSpecError(String),

    #[error("invalid log path: {0}")]
    InvalidPath(String),

    #[error("log appender error: {0}")]
    Appender(String),

    #[error("logger config error: {0}")]
    Config(String),
}

const CONSOLE_APPENDER: &str = "stdout";
const LOG_FILE_APPENDER: &str = "log_file";
const ERR_LOG_FILE_APPENDER: &str = "err_log_file";

/// Initializes the global logger with a console appender and, if `log_dir` is provided,
/// a rolling log file plus a separate rolling error-only log file.
///
/// `filters` follows the `RUST_LOG` syntax and is applied on top of the env variable.
pub fn init_logger(log_dir: Option<&Path>, filters: &str) -> Result<(), LogError> {
    let mut appenders = vec![appender::AppenderSpec::console(CONSOLE_APPENDER, None)];
    if let Some(log_dir) = log_dir {
        appenders.push(appender::AppenderSpec::roller(LOG_FILE_APPENDER, None, log_dir, LOG_FILE_NAME)?);
        appenders.push(appender::AppenderSpec::roller(ERR_LOG_FILE_APPENDER, Some(LevelFilter::Warn), log_dir, ERR_LOG_FILE_NAME)?);
    }

    let names = appenders.iter().map(|x| x.name).collect::<Vec<_>>();
    let loggers = logger::Builder::new(names.clone()).parse_env(DEFAULT_LOGGER_ENV).parse_expression(filters).build();

    let config = Config::builder()
        .appenders(appenders.into_iter().map(|x| x.appender()))
        .loggers(loggers.items())
        .build(Root::builder().appenders(names).build(loggers.root_level()))
        .map_err(|err| LogError::Config(err.to_string()))?;

    log4rs::init_config(config).map_err(|err| LogError::Config(err.to_string()))?;
    log::set_max_level(loggers.max_level());
    Ok(())
}

/// Tries to init the global logger, but does not fail if it was already set.
/// Should be used for tests.
pub fn try_init_logger(filters: &str) {
    let _ = init_logger(None, filters);
}
