//! Finalization crank
//!
//! Programs only advance when someone touches them. The crank keeps every
//! unfinished program in a queue ordered by soonest `end_timestamp` and, on
//! each tick, syncs the ones whose end has passed. A program with an empty
//! pool keeps pushing its end out; it simply goes back in the queue.

use std::cmp::Reverse;
use std::time::Duration;

use anyhow::Result;
use incentives::{Authorizer, Custody, ProgramKey, RewardDistributor};
use priority_queue::PriorityQueue;
use tokio::time;

use crate::config::{ClockMode, Config};

/// Unfinished programs by soonest end
#[derive(Debug, Default)]
pub struct EndQueue {
    queue: PriorityQueue<ProgramKey, Reverse<u64>>,
}

impl EndQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Insert or reposition a key
    pub fn push(&mut self, key: ProgramKey, end: u64) {
        self.queue.push(key, Reverse(end));
    }

    pub fn peek(&self) -> Option<(ProgramKey, u64)> {
        self.queue.peek().map(|(k, Reverse(end))| (*k, *end))
    }

    /// Pop every key whose end is at or before `now`
    pub fn pop_due(&mut self, now: u64) -> Vec<ProgramKey> {
        let mut due = Vec::new();
        while let Some((_, end)) = self.peek() {
            if end > now {
                break;
            }
            if let Some((key, _)) = self.queue.pop() {
                due.push(key);
            }
        }
        due
    }

    /// Re-read the pending ends of every program
    pub fn refresh<A: Authorizer, C: Custody>(&mut self, engine: &RewardDistributor<A, C>) -> Result<()> {
        self.queue.clear();
        for (key, end) in engine.pending_ends()? {
            self.push(key, end);
        }
        Ok(())
    }
}

/// One crank pass at `now`; returns the keys that finished
pub fn tick<A: Authorizer, C: Custody>(
    engine: &RewardDistributor<A, C>,
    queue: &mut EndQueue,
    now: u64,
) -> Result<Vec<ProgramKey>> {
    queue.refresh(engine)?;
    let mut finished = Vec::new();

    for key in queue.pop_due(now) {
        let Some(advance) = engine.sync(&key, now)? else {
            continue;
        };
        if advance.finished_now {
            log::info!("Program {} finished", key);
            finished.push(key);
        } else if let Some(p) = engine.get_program(&key)? {
            log::debug!(
                "Program {} idle for {}s, end moved to {}",
                key,
                advance.idle_seconds,
                p.end_timestamp()
            );
            queue.push(key, p.end_timestamp());
        }
    }

    if let Some((next, end)) = queue.peek() {
        log::debug!("Next program to finish: {} at {}", next, end);
    }
    Ok(finished)
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Crank on an interval until `crank_ticks` ticks have run (forever if 0)
pub async fn run<A: Authorizer, C: Custody>(
    engine: &RewardDistributor<A, C>,
    config: &Config,
    replay_clock: u64,
) -> Result<()> {
    let mut queue = EndQueue::new();
    let mut interval = time::interval(Duration::from_secs(config.crank_interval_secs.max(1)));
    let mut ticks: u64 = 0;

    log::info!("Crank started ({:?} clock, every {}s)", config.clock, config.crank_interval_secs);

    loop {
        interval.tick().await;
        ticks += 1;

        let now = match config.clock {
            ClockMode::Wall => unix_now().max(replay_clock),
            ClockMode::Replay => replay_clock.saturating_add(ticks.saturating_mul(config.crank_interval_secs)),
        };

        match tick(engine, &mut queue, now) {
            Ok(finished) if !finished.is_empty() => {
                log::info!("Tick {} at {}: {} program(s) finished", ticks, now, finished.len());
            }
            Ok(_) => {}
            Err(e) => log::error!("Crank tick failed: {:#}", e),
        }

        if queue.is_empty() {
            log::debug!("No unfinished programs");
        } else {
            log::debug!("{} program(s) still streaming", queue.len());
        }
        if config.crank_ticks != 0 && ticks >= config.crank_ticks {
            log::info!("Crank stopping after {} ticks", ticks);
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use incentives::{
        Address, AdminList, InMemoryCustody, PoolId, ProgramParams, Role, SECONDS_PER_DAY,
    };

    const DAY: u64 = SECONDS_PER_DAY;

    fn key(pool: u64) -> ProgramKey {
        ProgramKey::new(PoolId(pool), Role::Lender)
    }

    #[test]
    fn test_queue_orders_by_soonest_end() {
        let mut q = EndQueue::new();
        q.push(key(1), 300);
        q.push(key(2), 100);
        q.push(key(3), 200);
        assert_eq!(q.peek(), Some((key(2), 100)));

        assert_eq!(q.pop_due(250), vec![key(2), key(3)]);
        assert_eq!(q.len(), 1);

        // Repositioning keeps one entry per key
        q.push(key(1), 50);
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop_due(60), vec![key(1)]);
        assert!(q.is_empty());
    }

    #[test]
    fn test_tick_finishes_due_programs() {
        let admin = Address([1; 32]);
        let token = Address([9; 32]);
        let custody = InMemoryCustody::new();
        custody.mint(admin, token, 10_000);
        let engine = RewardDistributor::new(AdminList::new([admin]), custody);

        for (pool, total) in [(1, 1_000), (2, 3_000)] {
            engine
                .setup_bucket(
                    &admin,
                    ProgramParams {
                        key: key(pool),
                        reward_token: token,
                        total_reward: total,
                        reward_per_day: 1_000,
                    },
                    0,
                )
                .unwrap();
        }
        // Pool 1 has holders, pool 2 stays empty
        engine.on_balance_change(&key(1), &Address([2; 32]), 10, 0).unwrap();

        let mut q = EndQueue::new();
        assert!(tick(&engine, &mut q, DAY / 2).unwrap().is_empty());
        assert_eq!(tick(&engine, &mut q, DAY).unwrap(), vec![key(1)]);

        // Empty pool: the end keeps moving and the program stays queued
        assert!(tick(&engine, &mut q, 10 * DAY).unwrap().is_empty());
        assert_eq!(q.peek(), Some((key(2), 13 * DAY)));
        assert!(engine.get_program(&key(1)).unwrap().unwrap().is_finished());
    }
}
