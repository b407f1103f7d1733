use super::LogError;
use log::LevelFilter;
use log4rs::config::Logger;
use std::{collections::HashMap, env, mem};

#[derive(Clone)]
pub(super) struct LoggerSpec {
    pub name: String,
    pub level: LevelFilter,
    pub appenders: Vec<&'static str>,
}

impl LoggerSpec {
    pub fn logger(&self) -> Logger {
        Logger::builder().appenders(self.appenders.iter().map(|x| x.to_string())).additive(false).build(self.name.clone(), self.level)
    }
}

pub(super) struct Loggers {
    loggers: Vec<LoggerSpec>,
    root_level: LevelFilter,
}

impl Loggers {
    pub fn root_level(&self) -> LevelFilter {
        self.root_level
    }

    pub fn items(&self) -> impl Iterator<Item = Logger> + '_ {
        self.loggers.iter().map(|x| x.logger())
    }

    /// The most verbose level among root and all module loggers
    pub fn max_level(&self) -> LevelFilter {
        self.loggers.iter().map(|x| x.level).fold(self.root_level, Ord::max)
    }
}

/// Collects per-module log levels from expressions such as `info,galaxy_consensus=debug`
pub(super) struct Builder {
    appenders: Vec<&'static str>,
    loggers: HashMap<String, LevelFilter>,
    root_level: Option<LevelFilter>,
}

impl Builder {
    pub fn new(appenders: Vec<&'static str>) -> Builder {
        Builder { appenders, loggers: HashMap::new(), root_level: None }
    }

    pub fn parse_env(&mut self, env: &str) -> &mut Self {
        self.parse_expression(&env::var(env).unwrap_or_default())
    }

    pub fn parse_expression(&mut self, expression: &str) -> &mut Self {
        for spec in expression.split(',').map(|x| x.trim()).filter(|x| !x.is_empty()) {
            match Self::parse_spec(spec) {
                Ok((level, Some(name))) => {
                    self.loggers.insert(name.to_string(), level);
                }
                Ok((level, None)) => {
                    self.root_level.replace(level);
                }
                Err(err) => println!("Ignoring invalid logging spec '{}'", err),
            }
        }
        self
    }

    fn parse_spec(spec: &str) -> Result<(LevelFilter, Option<&str>), LogError> {
        let mut parts = spec.split('=');
        match (parts.next(), parts.next().map(|x| x.trim()), parts.next()) {
            // A lone level string defines the root level, a lone name enables everything for that module
            (Some(part0), None, None) => match part0.parse() {
                Ok(level) => Ok((level, None)),
                Err(_) => Ok((LevelFilter::max(), Some(part0))),
            },
            (Some(part0), Some(""), None) => Ok((LevelFilter::max(), Some(part0))),
            (Some(part0), Some(part1), None) => match part1.parse() {
                Ok(level) => Ok((level, Some(part0))),
                Err(_) => Err(LogError::ParseLoggerSpecError(part1.to_string())),
            },
            _ => Err(LogError::ParseLoggerSpecError(spec.to_string())),
        }
    }

    pub fn build(&mut self) -> Loggers {
        let appenders = self.appenders.clone();
        let loggers = mem::take(&mut self.loggers)
            .into_iter()
            .map(|(name, level)| LoggerSpec { name, level, appenders: appenders.clone() })
            .collect::<Vec<_>>();
        Loggers { loggers, root_level: self.root_level.take().unwrap_or(LevelFilter::Info) }
    }
}
