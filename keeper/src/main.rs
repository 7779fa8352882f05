//! Incentives Keeper
//!
//! Operator service around the reward distributor: opens the configured
//! programs, replays the share-token event log against the engine, then
//! cranks finished programs on an interval.

mod config;
mod crank;
mod events;

use anyhow::{Context, Result};
use config::Config;
use events::Replayer;
use incentives::{AdminList, InMemoryCustody, RewardDistributor};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting Incentives Keeper");

    let config = Config::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({:#}), using default local config", e);
        Config::default_local()
    });

    log::info!("Admin: {}", config.admin);
    log::info!("{} program(s) configured", config.programs.len());

    // The admin treasury lives in the in-process custody
    let custody = InMemoryCustody::new();
    for token in config.reward_tokens() {
        custody.mint(config.admin, token, config.treasury);
    }
    let engine = RewardDistributor::new(AdminList::new([config.admin]), custody);

    let events = events::load(&config.event_log)?;
    log::info!("Replaying {} event(s) from {}", events.len(), config.event_log);

    let stats = Replayer::new(config.admin, &config.programs)
        .run(&engine, &events)
        .context("Event replay failed")?;

    log::info!(
        "Replay done: {} applied, {} empty claims, {} rejected, clock at {}",
        stats.applied,
        stats.zero_claims,
        stats.rejected,
        stats.clock
    );
    for (token, amount) in &stats.paid {
        log::info!("Paid {} of {}", amount, token);
    }
    for key in engine.program_keys()? {
        if let Some(p) = engine.get_program(&key)? {
            log::info!(
                "{} gen {}: {:?}, index {}, supply {}",
                key,
                p.generation,
                p.status_at(stats.clock)?,
                p.reward_index(),
                p.accrual.scaled_total_supply
            );
        }
    }

    crank::run(&engine, &config, stats.clock).await
}
