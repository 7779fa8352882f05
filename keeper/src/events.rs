//! Event log replay
//!
//! The log is JSON lines, one share-token or claim event per line. Replay
//! plays the share token's part: it keeps the balances, calls the engine's
//! balance hook with the new balance, and only then writes it. Configured
//! programs are opened as soon as the log reaches their start time.

use std::collections::{BTreeMap, HashMap};
use std::io::{BufRead, BufReader};

use anyhow::{bail, Context, Result};
use incentives::{
    Address, Authorizer, BalanceHook, Custody, DistributorError, PoolId, ProgramKey,
    RewardDistributor, Role,
};
use serde::{Deserialize, Serialize};

use crate::config::ProgramConfig;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Deposit {
        at: u64,
        pool_id: PoolId,
        role: Role,
        participant: Address,
        amount: u128,
    },
    Withdraw {
        at: u64,
        pool_id: PoolId,
        role: Role,
        participant: Address,
        amount: u128,
    },
    Transfer {
        at: u64,
        pool_id: PoolId,
        role: Role,
        from: Address,
        to: Address,
        amount: u128,
    },
    Claim {
        at: u64,
        participant: Address,
        programs: Vec<ProgramKey>,
    },
    TopUp {
        at: u64,
        caller: Address,
        pool_id: PoolId,
        role: Role,
        amount: u128,
    },
}

impl Event {
    pub fn at(&self) -> u64 {
        match self {
            Event::Deposit { at, .. }
            | Event::Withdraw { at, .. }
            | Event::Transfer { at, .. }
            | Event::Claim { at, .. }
            | Event::TopUp { at, .. } => *at,
        }
    }
}

/// Parse a JSON-lines log; blank lines and `#` comments are skipped
pub fn parse<R: BufRead>(reader: R) -> Result<Vec<Event>> {
    let mut events = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read event log line {}", n + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let event: Event = serde_json::from_str(trimmed)
            .with_context(|| format!("Failed to parse event on line {}", n + 1))?;
        events.push(event);
    }
    Ok(events)
}

/// Read the log at `path`; a missing file is an empty log
pub fn load(path: &str) -> Result<Vec<Event>> {
    let expanded = shellexpand::tilde(path);
    let file = match std::fs::File::open(expanded.as_ref()) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::warn!("Event log {} not found, nothing to replay", path);
            return Ok(Vec::new());
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to open event log {}", path)),
    };
    parse(BufReader::new(file))
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub applied: usize,
    pub zero_claims: usize,
    pub rejected: usize,
    /// Total paid out, by reward token
    pub paid: BTreeMap<Address, u128>,
    /// Timestamp of the last event (or program start) seen
    pub clock: u64,
}

/// In-process stand-in for the share token
pub struct Replayer {
    admin: Address,
    pending: Vec<ProgramConfig>,
    balances: HashMap<(ProgramKey, Address), u128>,
    stats: ReplayStats,
}

impl Replayer {
    pub fn new(admin: Address, programs: &[ProgramConfig]) -> Self {
        let mut pending = programs.to_vec();
        // Popped from the back: latest start first in the vec
        pending.sort_by(|a, b| b.start.cmp(&a.start));
        Replayer {
            admin,
            pending,
            balances: HashMap::new(),
            stats: ReplayStats::default(),
        }
    }

    pub fn balance(&self, key: &ProgramKey, who: &Address) -> u128 {
        self.balances.get(&(*key, *who)).copied().unwrap_or(0)
    }

    /// Replay every event, then open programs that start after the last one
    pub fn run<A: Authorizer, C: Custody>(
        mut self,
        engine: &RewardDistributor<A, C>,
        events: &[Event],
    ) -> Result<ReplayStats> {
        for event in events {
            self.apply(engine, event)?;
        }
        self.open_due(engine, u64::MAX)?;
        Ok(self.stats)
    }

    fn open_due<A: Authorizer, C: Custody>(
        &mut self,
        engine: &RewardDistributor<A, C>,
        now: u64,
    ) -> Result<()> {
        while self.pending.last().map_or(false, |p| p.start <= now) {
            let Some(p) = self.pending.pop() else { break };
            let program = engine
                .setup_bucket(&self.admin, p.params(), p.start)
                .with_context(|| format!("Failed to set up {}", p.key()))?;
            log::info!(
                "Opened {} gen {} ending at {}",
                p.key(),
                program.generation,
                program.end_timestamp()
            );
            self.stats.clock = self.stats.clock.max(p.start);
        }
        Ok(())
    }

    pub fn apply<A: Authorizer, C: Custody>(
        &mut self,
        engine: &RewardDistributor<A, C>,
        event: &Event,
    ) -> Result<()> {
        let at = event.at();
        if at < self.stats.clock {
            log::warn!("Event at {} precedes clock {}, applying anyway", at, self.stats.clock);
        }
        self.open_due(engine, at)?;
        self.stats.clock = self.stats.clock.max(at);

        match event {
            Event::Deposit { pool_id, role, participant, amount, .. } => {
                let key = ProgramKey::new(*pool_id, *role);
                let new_balance = self
                    .balance(&key, participant)
                    .checked_add(*amount)
                    .context("Balance overflow")?;
                self.write_balance(engine, key, *participant, new_balance, at)?;
            }
            Event::Withdraw { pool_id, role, participant, amount, .. } => {
                let key = ProgramKey::new(*pool_id, *role);
                let old = self.balance(&key, participant);
                if *amount > old {
                    bail!("{} withdraws {} on {} but holds {}", participant, amount, key, old);
                }
                self.write_balance(engine, key, *participant, old - amount, at)?;
            }
            Event::Transfer { pool_id, role, from, to, amount, .. } => {
                let key = ProgramKey::new(*pool_id, *role);
                let from_old = self.balance(&key, from);
                if *amount > from_old {
                    bail!("{} sends {} on {} but holds {}", from, amount, key, from_old);
                }
                if from == to {
                    engine.before_transfer(&key, from, from_old, to, from_old, at)?;
                } else {
                    let from_new = from_old - amount;
                    let to_new = self
                        .balance(&key, to)
                        .checked_add(*amount)
                        .context("Balance overflow")?;
                    engine.before_transfer(&key, from, from_new, to, to_new, at)?;
                    self.balances.insert((key, *from), from_new);
                    self.balances.insert((key, *to), to_new);
                }
            }
            Event::Claim { participant, programs, .. } => {
                match engine.claim_reward(participant, programs, at) {
                    Ok(receipt) => {
                        for (token, amount) in receipt.per_token {
                            *self.stats.paid.entry(token).or_insert(0) += amount;
                        }
                    }
                    Err(DistributorError::ZeroClaim) => {
                        log::debug!("{} had nothing to claim at {}", participant, at);
                        self.stats.zero_claims += 1;
                    }
                    Err(e) => return Err(e).context("Claim failed"),
                }
            }
            Event::TopUp { caller, pool_id, role, amount, .. } => {
                let key = ProgramKey::new(*pool_id, *role);
                if let Err(e) = engine.top_up(caller, &key, *amount, at) {
                    log::warn!("Top-up of {} on {} rejected: {}", amount, key, e);
                    self.stats.rejected += 1;
                    return Ok(());
                }
            }
        }
        self.stats.applied += 1;
        Ok(())
    }

    /// Hook first, then the balance write
    fn write_balance<A: Authorizer, C: Custody>(
        &mut self,
        engine: &RewardDistributor<A, C>,
        key: ProgramKey,
        participant: Address,
        new_balance: u128,
        at: u64,
    ) -> Result<()> {
        engine.before_balance_change(&key, &participant, new_balance, at)?;
        self.balances.insert((key, participant), new_balance);
        Ok(())
    }
}
