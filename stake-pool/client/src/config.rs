//! Configuration management

use {
    crate::error::{Result, StakePoolClientError},
    serde_derive::{Deserialize, Serialize},
    serde_with::{serde_as, DisplayFromStr},
    solana_program::pubkey::Pubkey,
    std::{
        fs::{create_dir_all, File},
        io::{Read, Write},
        path::Path,
    },
};

/// Environment variable holding the path of the configuration file
pub const CONFIG_FILE_ENV: &str = "STAKE_POOL_CONF";

/// Configuration file used when `STAKE_POOL_CONF` is not set
pub const DEFAULT_CONFIG_FILE: &str = "./conf.json";

/// Default number of slots before the end of an epoch under which the
/// reserve gets delegated
pub const DEFAULT_REBALANCE_SLOTS_LEFT: u64 = 200;

fn default_rebalance_slots_left() -> u64 {
    DEFAULT_REBALANCE_SLOTS_LEFT
}

/// Settings for a client operating one stake pool
#[serde_as]
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct StakePoolConfig {
    /// Stake pool program
    #[serde_as(as = "DisplayFromStr")]
    pub program_id: Pubkey,
    /// Stake pool account
    #[serde_as(as = "DisplayFromStr")]
    pub stake_pool_address: Pubkey,
    /// Skip merging transient stake accounts during the epoch update
    #[serde(default)]
    pub no_merge: bool,
    /// Validator receiving reserve stake, falls back to the pool's preferred
    /// deposit validator
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub preferred_vote_account: Option<Pubkey>,
    /// Delegate the reserve once fewer slots than this remain in the epoch
    #[serde(default = "default_rebalance_slots_left")]
    pub rebalance_slots_left: u64,
    /// Never delegate the reserve
    #[serde(default)]
    pub disable_rebalance: bool,
}

impl StakePoolConfig {
    /// Config with defaults for everything but the pool
    pub fn new(program_id: Pubkey, stake_pool_address: Pubkey) -> Self {
        Self {
            program_id,
            stake_pool_address,
            no_merge: false,
            preferred_vote_account: None,
            rebalance_slots_left: DEFAULT_REBALANCE_SLOTS_LEFT,
            disable_rebalance: false,
        }
    }

    /// Parse a JSON config
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        serde_json::from_reader(reader)
            .map_err(|err| StakePoolClientError::Config(format!("{:?}", err)))
    }

    /// Load a JSON config file
    pub fn from_file<P: AsRef<Path>>(config_file: P) -> Result<Self> {
        let config_file = config_file.as_ref();
        let file = File::open(config_file).map_err(|err| {
            StakePoolClientError::Config(format!("{}: {}", config_file.display(), err))
        })?;
        let config = Self::from_reader(file)?;
        log::debug!("Loaded config {:?} from {}", config, config_file.display());
        Ok(config)
    }

    /// Load the file named by `STAKE_POOL_CONF`, or `./conf.json`
    pub fn from_env() -> Result<Self> {
        let config_file =
            std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::from_file(config_file)
    }

    /// Write the config as JSON, creating parent directories
    pub fn save<P: AsRef<Path>>(&self, config_file: P) -> Result<()> {
        let config_file = config_file.as_ref();
        let serialized = serde_json::to_string_pretty(self)
            .map_err(|err| StakePoolClientError::Config(format!("{:?}", err)))?;
        let io_error = |err: std::io::Error| {
            StakePoolClientError::Config(format!("{}: {}", config_file.display(), err))
        };

        if let Some(outdir) = config_file.parent() {
            create_dir_all(outdir).map_err(io_error)?;
        }
        let mut file = File::create(config_file).map_err(io_error)?;
        file.write_all(serialized.as_bytes()).map_err(io_error)?;
        Ok(())
    }
}
