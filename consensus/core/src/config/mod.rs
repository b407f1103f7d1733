pub mod constants;
pub mod genesis;
pub mod params;

use std::ops::Deref;

use {
    constants::perf::{PERF_PARAMS, PerfParams},
    params::Params,
};

/// Various node configurations all bundled up under a single struct. Use `Config::new` for directly building from
/// a `Params` instance. For anything more complex it is recommended to use `ConfigBuilder`. NOTE: this struct can be
/// implicitly de-refed into `Params`
#[derive(Clone, Debug)]
pub struct Config {
    /// Network params
    pub params: Params,
    /// Performance params
    pub perf: PerfParams,

    /// Run the background flusher
    pub enable_flusher: bool,

    /// Run heavy sanity checks on indexing (mostly useful in tests)
    pub enable_sanity_checks: bool,
}

impl Config {
    pub fn new(params: Params) -> Self {
        Self { params, perf: PERF_PARAMS, enable_flusher: true, enable_sanity_checks: false }
    }

    pub fn to_builder(&self) -> ConfigBuilder {
        ConfigBuilder { config: self.clone() }
    }
}

impl AsRef<Params> for Config {
    fn as_ref(&self) -> &Params {
        &self.params
    }
}

impl Deref for Config {
    type Target = Params;

    fn deref(&self) -> &Self::Target {
        &self.params
    }
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new(params: Params) -> Self {
        Self { config: Config::new(params) }
    }

    pub fn set_perf_params(mut self, perf: PerfParams) -> Self {
        self.config.perf = perf;
        self
    }

    pub fn edit_consensus_params<F>(mut self, edit_func: F) -> Self
    where
        F: Fn(&mut Params),
    {
        edit_func(&mut self.config.params);
        self
    }

    pub fn edit_perf_params<F>(mut self, edit_func: F) -> Self
    where
        F: Fn(&mut PerfParams),
    {
        edit_func(&mut self.config.perf);
        self
    }

    pub fn disable_flusher(mut self) -> Self {
        self.config.enable_flusher = false;
        self
    }

    pub fn enable_sanity_checks(mut self) -> Self {
        self.config.enable_sanity_checks = true;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
