use galaxy_consensus::consensus::test_consensus::TestConsensus;
use galaxy_consensus_core::{
    ValidatorId,
    config::{Config, ConfigBuilder, params::FAKENET_PARAMS},
    tx::Address,
};

pub const A: ValidatorId = 1;
pub const B: ValidatorId = 2;
pub const C: ValidatorId = 3;

/// Fakenet config with sanity checks on and the background flusher off
#[allow(dead_code)] // Usage by integration tests is ignored by the compiler
pub fn test_config() -> Config {
    galaxy_core::log::try_init_logger("info");
    ConfigBuilder::new(FAKENET_PARAMS).enable_sanity_checks().disable_flusher().edit_perf_params(|p| p.heavy_check_threads = 2).build()
}

/// A consensus with equally weighted validators `1..=count` and a funded account per validator
#[allow(dead_code)]
pub fn equal_validators(config: &Config, count: ValidatorId) -> TestConsensus {
    let weights: Vec<_> = (1..=count).map(|id| (id, 1)).collect();
    let balances = (1..=count).map(|id| (Address::from_validator(id), 1_000_000_000)).collect();
    TestConsensus::new(config, &weights, balances)
}
