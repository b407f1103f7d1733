use crate::{
    BlockIndex, Gas, Timestamp,
    tx::{ADDRESS_SIZE, Address},
};
use serde::{Deserialize, Serialize};

/// Limits on DAG structure
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagRules {
    pub max_parents: u32,
    pub max_extra_data: u32,
    pub max_txs: u32,
}

/// Gas power replenishment policy. A validator's share of `alloc_per_sec` is proportional to its weight
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasPowerRules {
    /// Gas power allocated per second to the whole validator set
    pub alloc_per_sec: Gas,
    /// Gas power cannot accumulate beyond this many milliseconds of allocation
    pub max_alloc_period: Timestamp,
    /// Allocation granted to the first event of a validator in an epoch
    pub startup_alloc_period: Timestamp,
    pub min_startup_gas: Gas,
}

/// A validator is deactivated on epoch seal once it missed both this many blocks and this much time
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflinePenaltyThreshold {
    pub blocks_num: BlockIndex,
    pub period: Timestamp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EconomyRules {
    pub event_gas: Gas,
    pub parent_gas: Gas,
    pub extra_data_gas: Gas,
    pub max_event_gas: Gas,
    pub min_gas_price: u64,
    /// Number of blocks a validator may miss without losing uptime
    pub block_missed_slack: BlockIndex,
    pub offline_penalty_threshold: OfflinePenaltyThreshold,
    pub gas_power: GasPowerRules,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochsRules {
    pub max_epoch_gas: Gas,
    pub max_epoch_duration: Timestamp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlocksRules {
    pub max_block_gas: Gas,
    /// An empty block may be skipped only if the previous block is younger than this
    pub max_empty_block_skip_period: Timestamp,
}

/// Consensus rules. They are part of the epoch state and may only change on epoch seal
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rules {
    pub network_id: u64,
    pub dag: DagRules,
    pub economy: EconomyRules,
    pub epochs: EpochsRules,
    pub blocks: BlocksRules,
}

/// Network parameters
#[derive(Clone, Debug)]
pub struct Params {
    pub net_name: &'static str,
    /// Rules applied by genesis
    pub rules: Rules,
    /// Genesis time, in milliseconds since UNIX epoch
    pub genesis_time: Timestamp,
    /// The only account allowed to call the driver directly
    pub driver_owner: Address,
}

pub const MAINNET_RULES: Rules = Rules {
    network_id: 0xfa,
    dag: DagRules { max_parents: 10, max_extra_data: 128, max_txs: 1024 },
    economy: EconomyRules {
        event_gas: 28_000,
        parent_gas: 2_400,
        extra_data_gas: 25,
        max_event_gas: 10_000_000 + 28_000,
        min_gas_price: 1_000,
        block_missed_slack: 50,
        offline_penalty_threshold: OfflinePenaltyThreshold { blocks_num: 1_000, period: 24 * 60 * 60 * 1000 },
        gas_power: GasPowerRules {
            alloc_per_sec: 28_000_000,
            max_alloc_period: 5_000,
            startup_alloc_period: 1_000,
            min_startup_gas: 28_000 * 20,
        },
    },
    epochs: EpochsRules { max_epoch_gas: 1_500_000_000, max_epoch_duration: 4 * 60 * 60 * 1000 },
    blocks: BlocksRules { max_block_gas: 20_500_000, max_empty_block_skip_period: 60 * 1000 },
};

/// Rules for a local network where epochs seal frequently
pub const DEVNET_RULES: Rules = Rules {
    network_id: 0xfb,
    epochs: EpochsRules { max_epoch_gas: 300_000_000, max_epoch_duration: 10 * 60 * 1000 },
    blocks: BlocksRules { max_block_gas: 20_500_000, max_empty_block_skip_period: 3 * 1000 },
    ..MAINNET_RULES
};

/// Rules for tests: tiny epochs, no gas pressure and no empty block skipping
pub const FAKENET_RULES: Rules = Rules {
    network_id: 0xfc,
    economy: EconomyRules {
        gas_power: GasPowerRules {
            alloc_per_sec: 2_000_000_000,
            max_alloc_period: 5_000,
            startup_alloc_period: 1_000,
            min_startup_gas: 28_000 * 1_000,
        },
        min_gas_price: 0,
        ..MAINNET_RULES.economy
    },
    epochs: EpochsRules { max_epoch_gas: 100_000_000, max_epoch_duration: 60 * 1000 },
    blocks: BlocksRules { max_block_gas: 20_500_000, max_empty_block_skip_period: 0 },
    ..MAINNET_RULES
};

const DRIVER_OWNER: Address = Address([0xd0; ADDRESS_SIZE]);

pub const MAINNET_PARAMS: Params =
    Params { net_name: "galaxy-mainnet", rules: MAINNET_RULES, genesis_time: 1_700_000_000_000, driver_owner: DRIVER_OWNER };

pub const DEVNET_PARAMS: Params =
    Params { net_name: "galaxy-devnet", rules: DEVNET_RULES, genesis_time: 1_700_000_000_000, driver_owner: DRIVER_OWNER };

pub const FAKENET_PARAMS: Params =
    Params { net_name: "galaxy-fakenet", rules: FAKENET_RULES, genesis_time: 1_700_000_000_000, driver_owner: DRIVER_OWNER };

impl From<&str> for Params {
    fn from(net_name: &str) -> Self {
        match net_name {
            "devnet" | "galaxy-devnet" => DEVNET_PARAMS,
            "fakenet" | "galaxy-fakenet" => FAKENET_PARAMS,
            _ => MAINNET_PARAMS,
        }
    }
}
