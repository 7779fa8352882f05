//! Reward distributor - the engine's public surface
//!
//! One `RewardDistributor` value owns every program, participant record and
//! reserve. It is constructed once and shared by reference (it is `Sync` when
//! its collaborators are); there is no process-wide state.
//!
//! # Locking
//! - Mutations on a key hold that key's book mutex for the whole call
//! - Claims over several keys lock the books in ascending key order
//! - Queries lock briefly and return copies

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use reward_math::accrual::{update_index, IndexAdvance};

use crate::claims::{ClaimProcessor, ClaimReceipt};
use crate::collaborators::{Authorizer, BalanceHook, Custody};
use crate::error::{AuthorizationError, DistributorError, Result, StateError, ValidationError};
use crate::funding::Reserve;
use crate::registry::{lock, ProgramBook, ProgramParams, RewardProgram, RewardProgramRegistry};
use crate::types::{Action, Address, PoolId, ProgramKey, Role};
use reward_math::accrual::ParticipantRecord;

pub struct RewardDistributor<A, C> {
    registry: RewardProgramRegistry,
    authorizer: A,
    custody: C,
}

impl<A: Authorizer, C: Custody> RewardDistributor<A, C> {
    pub fn new(authorizer: A, custody: C) -> Self {
        RewardDistributor {
            registry: RewardProgramRegistry::new(),
            authorizer,
            custody,
        }
    }

    pub fn registry(&self) -> &RewardProgramRegistry {
        &self.registry
    }

    pub fn custody(&self) -> &C {
        &self.custody
    }

    fn authorize(&self, caller: &Address, action: Action) -> Result<()> {
        if !self.authorizer.is_authorized(caller, action) {
            log::warn!("{} denied {:?}", caller, action);
            return Err(AuthorizationError::Unauthorized {
                caller: *caller,
                action,
            }
            .into());
        }
        Ok(())
    }

    // ========================================================================
    // Setup and funding
    // ========================================================================

    /// Create a program on `params.key`, funded by `caller`
    ///
    /// # Errors
    /// - `Authorization` if `caller` may not set up programs
    /// - `Validation` on zero amounts or a sub-day schedule
    /// - `State::ProgramAlreadyActive` if the key's program is not finished at `now`
    /// - `Custody` if the funding cannot be collected from `caller`
    pub fn setup_bucket(&self, caller: &Address, params: ProgramParams, now: u64) -> Result<RewardProgram> {
        self.authorize(caller, Action::SetupProgram)?;
        self.registry.setup_bucket(&params, now, |p| {
            self.custody
                .collect(caller, &p.reward_token, p.total_reward)
                .map_err(DistributorError::Custody)
        })
    }

    /// Batch form of `setup_bucket` over parallel arrays
    ///
    /// All-or-nothing: every parameter and every key is checked first; if a
    /// collection fails midway, the funds already collected are credited back
    /// to `caller` and nothing is created.
    #[allow(clippy::too_many_arguments)]
    pub fn setup_buckets(
        &self,
        caller: &Address,
        pool_ids: &[PoolId],
        roles: &[Role],
        total_rewards: &[u128],
        rewards_per_day: &[u128],
        reward_tokens: &[Address],
        now: u64,
    ) -> Result<Vec<RewardProgram>> {
        self.authorize(caller, Action::SetupProgram)?;

        let n = pool_ids.len();
        check_len("roles", n, roles.len())?;
        check_len("total_rewards", n, total_rewards.len())?;
        check_len("rewards_per_day", n, rewards_per_day.len())?;
        check_len("reward_tokens", n, reward_tokens.len())?;

        let mut params = Vec::with_capacity(n);
        let mut seen = BTreeSet::new();
        for i in 0..n {
            let p = ProgramParams {
                key: ProgramKey::new(pool_ids[i], roles[i]),
                reward_token: reward_tokens[i],
                total_reward: total_rewards[i],
                reward_per_day: rewards_per_day[i],
            };
            p.validate()?;
            if !seen.insert(p.key) {
                return Err(ValidationError::DuplicateKey(p.key).into());
            }
            params.push(p);
        }

        // Lock in ascending key order
        params.sort_by_key(|p| p.key);
        let handles = params
            .iter()
            .map(|p| self.registry.book_or_insert(p.key))
            .collect::<Result<Vec<_>>>()?;
        let mut guards = lock_all(&handles)?;

        let plans = params
            .iter()
            .zip(guards.iter())
            .map(|(p, book)| book.check_setup(p, now))
            .collect::<Result<Vec<_>>>()?;

        let mut collected: Vec<&ProgramParams> = Vec::with_capacity(n);
        for p in &params {
            if let Err(msg) = self.custody.collect(caller, &p.reward_token, p.total_reward) {
                for done in collected {
                    self.custody.credit(caller, &done.reward_token, done.total_reward);
                }
                log::warn!("batch setup aborted at {}: {}", p.key, msg);
                return Err(DistributorError::Custody(msg));
            }
            collected.push(p);
        }

        let mut programs = Vec::with_capacity(n);
        for (plan, book) in plans.into_iter().zip(guards.iter_mut()) {
            let program = book.open_program(plan);
            log::info!("setup {} gen {} (batch)", program.key, program.generation);
            programs.push(program);
        }
        Ok(programs)
    }

    /// Add `amount` to the active program's reserve
    ///
    /// Does not change `total_reward` or the schedule.
    pub fn top_up(&self, caller: &Address, key: &ProgramKey, amount: u128, now: u64) -> Result<Reserve> {
        self.authorize(caller, Action::TopUp)?;
        if amount == 0 {
            return Err(ValidationError::InvalidParameter {
                name: "amount",
                reason: "must be greater than zero",
            }
            .into());
        }

        let handle = self
            .registry
            .book(key)?
            .ok_or(StateError::ProgramNotFound(*key))?;
        let mut book = lock(&handle)?;
        let current = book
            .current_at(now)?
            .ok_or(StateError::ProgramNotFound(*key))?;
        if current.is_finished() {
            return Err(StateError::ProgramFinished(*key).into());
        }
        let funded = book.funding.reserve(current.generation).unwrap_or_default().funded;
        funded
            .checked_add(amount)
            .ok_or(reward_math::accrual::MathError::Overflow)?;

        self.custody
            .collect(caller, &current.reward_token, amount)
            .map_err(DistributorError::Custody)?;
        book.funding.fund(current.generation, amount)?;

        let reserve = book.funding.reserve(current.generation).unwrap_or_default();
        log::info!("top-up {} gen {}: +{} (available {})", key, current.generation, amount, reserve.available());
        Ok(reserve)
    }

    // ========================================================================
    // Balance hook
    // ========================================================================

    /// Snapshot `participant` before their balance on `key` becomes `new_balance`
    ///
    /// Must run before the share token writes the balance. A key without any
    /// program is a no-op.
    pub fn on_balance_change(
        &self,
        key: &ProgramKey,
        participant: &Address,
        new_balance: u128,
        now: u64,
    ) -> Result<()> {
        let Some(handle) = self.registry.book(key)? else {
            return Ok(());
        };
        let mut book = lock(&handle)?;
        let Some(current) = book.current().copied() else {
            return Ok(());
        };

        let touched = book.participants.prepare_touch(
            &book.programs,
            current.accrual,
            participant,
            new_balance,
            now,
        )?;
        log::debug!(
            "{} {}: balance -> {}, settled {}, index {}",
            key,
            participant,
            new_balance,
            touched.outcome.settled,
            touched.accrual.reward_index
        );

        store_accrual(&mut book, touched.accrual);
        book.participants.commit_entry(touched.participant, touched.entry);
        Ok(())
    }

    /// Both legs of a same-pool transfer under one lock
    ///
    /// The participating supply is unchanged across the pair.
    pub fn on_transfer(
        &self,
        key: &ProgramKey,
        from: &Address,
        from_new_balance: u128,
        to: &Address,
        to_new_balance: u128,
        now: u64,
    ) -> Result<()> {
        if from == to {
            return self.on_balance_change(key, to, to_new_balance, now);
        }
        let Some(handle) = self.registry.book(key)? else {
            return Ok(());
        };
        let mut book = lock(&handle)?;
        let Some(current) = book.current().copied() else {
            return Ok(());
        };

        let sender = book.participants.prepare_touch(
            &book.programs,
            current.accrual,
            from,
            from_new_balance,
            now,
        )?;
        let receiver = book.participants.prepare_touch(
            &book.programs,
            sender.accrual,
            to,
            to_new_balance,
            now,
        )?;
        log::debug!(
            "{} transfer {} -> {}: supply {} -> {}",
            key,
            from,
            to,
            current.accrual.scaled_total_supply,
            receiver.accrual.scaled_total_supply
        );

        store_accrual(&mut book, receiver.accrual);
        book.participants.commit_entry(sender.participant, sender.entry);
        book.participants.commit_entry(receiver.participant, receiver.entry);
        Ok(())
    }

    /// Advance a key's index to `now` without touching any participant
    ///
    /// Used by keepers to finalize programs; returns `None` for unknown keys.
    pub fn sync(&self, key: &ProgramKey, now: u64) -> Result<Option<IndexAdvance>> {
        let Some(handle) = self.registry.book(key)? else {
            return Ok(None);
        };
        let mut book = lock(&handle)?;
        let Some(program) = book.current_mut() else {
            return Ok(None);
        };
        let advance = update_index(&mut program.accrual, now)?;
        if advance.finished_now {
            log::info!("{} gen {} finished at {}", key, program.generation, program.end_timestamp());
        }
        Ok(Some(advance))
    }

    // ========================================================================
    // Claims
    // ========================================================================

    /// Pay `participant` everything accrued on `requests`
    ///
    /// # Errors
    /// - `ZeroClaim` if nothing is payable across the whole batch
    /// - `State::InsufficientReserve` if a reserve cannot cover its share
    pub fn claim_reward(&self, participant: &Address, requests: &[ProgramKey], now: u64) -> Result<ClaimReceipt> {
        let keys: BTreeSet<ProgramKey> = requests.iter().copied().collect();
        let mut handles = Vec::with_capacity(keys.len());
        for key in &keys {
            if let Some(h) = self.registry.book(key)? {
                handles.push(h);
            }
        }
        let mut guards = lock_all(&handles)?;

        let mut prepared = Vec::with_capacity(guards.len());
        let mut aggregate: u128 = 0;
        for book in guards.iter() {
            if let Some(p) = ClaimProcessor::prepare(book, participant, now)? {
                aggregate = aggregate.saturating_add(p.amount());
                prepared.push((book.key(), p));
            }
        }
        if aggregate == 0 {
            log::debug!("{} has nothing to claim on {} programs", participant, keys.len());
            return Err(DistributorError::ZeroClaim);
        }

        let mut lines = Vec::new();
        for (key, p) in prepared {
            let book = guards
                .iter_mut()
                .find(|b| b.key() == key)
                .ok_or(StateError::ProgramNotFound(key))?;
            lines.extend(ClaimProcessor::commit(book, *participant, p)?);
        }
        drop(guards);

        let receipt = ClaimProcessor::receipt(*participant, lines)?;
        for (token, amount) in &receipt.per_token {
            if *amount > 0 {
                self.custody.credit(participant, token, *amount);
            }
        }
        log::info!("{} claimed {:?}", participant, receipt.per_token);
        Ok(receipt)
    }

    /// `claim_reward` over parallel pool/role arrays
    pub fn claim_reward_batch(
        &self,
        participant: &Address,
        pool_ids: &[PoolId],
        roles: &[Role],
        now: u64,
    ) -> Result<ClaimReceipt> {
        let keys = zip_keys(pool_ids, roles)?;
        self.claim_reward(participant, &keys, now)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn get_program(&self, key: &ProgramKey) -> Result<Option<RewardProgram>> {
        self.registry.get_program(key)
    }

    pub fn get_program_generation(&self, key: &ProgramKey, generation: u32) -> Result<Option<RewardProgram>> {
        self.registry.get_program_generation(key, generation)
    }

    /// Keys that host at least one program, ascending
    pub fn program_keys(&self) -> Result<Vec<ProgramKey>> {
        let mut keys = self.registry.keys()?;
        let mut hosted = Vec::with_capacity(keys.len());
        for key in keys.drain(..) {
            if self.registry.get_program(&key)?.is_some() {
                hosted.push(key);
            }
        }
        Ok(hosted)
    }

    pub fn get_participant_record(&self, key: &ProgramKey, participant: &Address) -> Result<Option<ParticipantRecord>> {
        match self.registry.book(key)? {
            Some(h) => {
                let book = lock(&h)?;
                Ok(book.participants.record(participant))
            }
            None => Ok(None),
        }
    }

    /// Reward `participant` could claim on one key at `now`; read-only
    pub fn get_claimable(&self, key: &ProgramKey, participant: &Address, now: u64) -> Result<u128> {
        match self.registry.book(key)? {
            Some(h) => {
                let book = lock(&h)?;
                book.participants.claimable(&book.programs, participant, now)
            }
            None => Ok(0),
        }
    }

    /// Sum of `get_claimable` over distinct keys of `requests`
    pub fn get_claimable_batch(&self, requests: &[ProgramKey], participant: &Address, now: u64) -> Result<u128> {
        let keys: BTreeSet<ProgramKey> = requests.iter().copied().collect();
        let mut total: u128 = 0;
        for key in &keys {
            total = total
                .checked_add(self.get_claimable(key, participant, now)?)
                .ok_or(reward_math::accrual::MathError::Overflow)?;
        }
        Ok(total)
    }

    pub fn get_reserve(&self, key: &ProgramKey, generation: u32) -> Result<Option<Reserve>> {
        match self.registry.book(key)? {
            Some(h) => {
                let book = lock(&h)?;
                Ok(book.funding.reserve(generation))
            }
            None => Ok(None),
        }
    }

    /// End timestamps of unfinished programs, as stored
    pub fn pending_ends(&self) -> Result<BTreeMap<ProgramKey, u64>> {
        let mut out = BTreeMap::new();
        for key in self.registry.keys()? {
            if let Some(p) = self.registry.get_program(&key)? {
                if !p.is_finished() {
                    out.insert(key, p.end_timestamp());
                }
            }
        }
        Ok(out)
    }
}

impl<A: Authorizer, C: Custody> BalanceHook for RewardDistributor<A, C> {
    fn before_balance_change(
        &self,
        key: &ProgramKey,
        participant: &Address,
        new_balance: u128,
        now: u64,
    ) -> Result<()> {
        self.on_balance_change(key, participant, new_balance, now)
    }

    fn before_transfer(
        &self,
        key: &ProgramKey,
        from: &Address,
        from_new_balance: u128,
        to: &Address,
        to_new_balance: u128,
        now: u64,
    ) -> Result<()> {
        self.on_transfer(key, from, from_new_balance, to, to_new_balance, now)
    }
}

/// Pair parallel pool/role arrays into keys
pub fn zip_keys(pool_ids: &[PoolId], roles: &[Role]) -> Result<Vec<ProgramKey>> {
    check_len("roles", pool_ids.len(), roles.len())?;
    Ok(pool_ids
        .iter()
        .zip(roles)
        .map(|(p, r)| ProgramKey::new(*p, *r))
        .collect())
}

fn check_len(name: &'static str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(ValidationError::LengthMismatch { name, expected, got }.into());
    }
    Ok(())
}

/// Lock every handle in order; handles must already be sorted by key
fn lock_all(handles: &[Arc<Mutex<ProgramBook>>]) -> Result<Vec<MutexGuard<'_, ProgramBook>>> {
    handles.iter().map(|h| lock(h)).collect()
}

fn store_accrual(book: &mut ProgramBook, accrual: reward_math::accrual::Accrual) {
    if let Some(current) = book.current_mut() {
        let was_finished = current.accrual.is_finished;
        current.accrual = accrual;
        if !was_finished && accrual.is_finished {
            log::info!("{} gen {} finished", current.key, current.generation);
        }
    }
}
