//! Keeper configuration

use anyhow::{Context, Result};
use incentives::{Address, PoolId, ProgramKey, ProgramParams, Role};
use serde::{Deserialize, Serialize};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "INCENTIVES_CONFIG";
const DEFAULT_PATH: &str = "keeper.toml";

/// How the crank reads time
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockMode {
    /// Continue from the last replayed event, one interval per tick
    #[default]
    Replay,
    /// Unix wall clock
    Wall,
}

/// A program opened by the admin at `start`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramConfig {
    pub pool_id: PoolId,
    pub role: Role,
    pub reward_token: Address,
    pub total_reward: u128,
    pub reward_per_day: u128,
    #[serde(default)]
    pub start: u64,
}

impl ProgramConfig {
    pub fn key(&self) -> ProgramKey {
        ProgramKey::new(self.pool_id, self.role)
    }

    pub fn params(&self) -> ProgramParams {
        ProgramParams {
            key: self.key(),
            reward_token: self.reward_token,
            total_reward: self.total_reward,
            reward_per_day: self.reward_per_day,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Account allowed to set up and top up programs
    pub admin: Address,

    /// Initial balance of every reward token held by the admin
    #[serde(default = "default_treasury")]
    pub treasury: u128,

    /// JSON-lines event log to replay at startup
    pub event_log: String,

    pub crank_interval_secs: u64,

    /// Number of crank ticks before exiting (0 = run forever)
    #[serde(default)]
    pub crank_ticks: u64,

    #[serde(default)]
    pub clock: ClockMode,

    #[serde(default)]
    pub programs: Vec<ProgramConfig>,
}

fn default_treasury() -> u128 {
    u64::MAX as u128
}

impl Config {
    /// Load from `$INCENTIVES_CONFIG`, or `keeper.toml` in the working directory
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_PATH.to_string());
        Self::from_path(&path)
    }

    pub fn from_path(path: &str) -> Result<Self> {
        let expanded = shellexpand::tilde(path);
        let contents = std::fs::read_to_string(expanded.as_ref())
            .with_context(|| format!("Failed to read config from {}", path))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config {}", path))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    /// Single local program, events from `~/.incentives/events.jsonl`
    pub fn default_local() -> Self {
        Config {
            admin: Address([1; 32]),
            treasury: default_treasury(),
            event_log: "~/.incentives/events.jsonl".to_string(),
            crank_interval_secs: 10,
            crank_ticks: 0,
            clock: ClockMode::Replay,
            programs: vec![ProgramConfig {
                pool_id: PoolId(1),
                role: Role::Lender,
                reward_token: Address([2; 32]),
                total_reward: 10_000,
                reward_per_day: 1_000,
                start: 0,
            }],
        }
    }

    /// Distinct reward tokens across configured programs
    pub fn reward_tokens(&self) -> Vec<Address> {
        let mut tokens: Vec<Address> = self.programs.iter().map(|p| p.reward_token).collect();
        tokens.sort();
        tokens.dedup();
        tokens
    }
}
