//! Reward program registry
//!
//! One `ProgramBook` per `(pool, role)` key holds the key's whole history of
//! program generations, its participant ledger and its funding reserves. Each
//! book sits behind its own mutex so writers on different keys never contend;
//! the key map itself is only locked for lookup and insert.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use reward_math::accrual::{schedule_duration, update_index, Accrual, ProgramStatus, Wad};

use crate::error::{Result, StateError, ValidationError};
use crate::funding::FundingLedger;
use crate::ledger::ParticipantLedger;
use crate::types::{Address, ProgramKey};

/// One program instance on a key
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RewardProgram {
    pub key: ProgramKey,
    /// Asset streamed by this program
    pub reward_token: Address,
    /// Position of this instance in the key's history (0-based)
    pub generation: u32,
    pub accrual: Accrual,
}

impl RewardProgram {
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.accrual.is_finished
    }

    #[inline]
    pub fn status(&self) -> ProgramStatus {
        self.accrual.status()
    }

    /// Status as of `now`, resolving an expired but untouched program
    pub fn status_at(&self, now: u64) -> Result<ProgramStatus> {
        let mut accrual = self.accrual;
        update_index(&mut accrual, now)?;
        Ok(accrual.status())
    }

    #[inline]
    pub fn reward_index(&self) -> Wad {
        self.accrual.reward_index
    }

    #[inline]
    pub fn end_timestamp(&self) -> u64 {
        self.accrual.end_timestamp
    }
}

/// Parameters of a new program
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ProgramParams {
    pub key: ProgramKey,
    pub reward_token: Address,
    pub total_reward: u128,
    pub reward_per_day: u128,
}

impl ProgramParams {
    /// Stateless checks
    pub fn validate(&self) -> Result<()> {
        if self.total_reward == 0 {
            return Err(ValidationError::InvalidParameter {
                name: "total_reward",
                reason: "must be greater than zero",
            }
            .into());
        }
        if self.reward_per_day == 0 {
            return Err(ValidationError::InvalidParameter {
                name: "reward_per_day",
                reason: "must be greater than zero",
            }
            .into());
        }
        if schedule_duration(self.total_reward, self.reward_per_day)? == 0 {
            return Err(ValidationError::InvalidParameter {
                name: "total_reward",
                reason: "must cover at least one day of reward_per_day",
            }
            .into());
        }
        Ok(())
    }
}

/// Everything owned by one program key
#[derive(Debug)]
pub struct ProgramBook {
    key: ProgramKey,
    pub(crate) programs: Vec<RewardProgram>,
    pub(crate) participants: ParticipantLedger,
    pub(crate) funding: FundingLedger,
}

impl ProgramBook {
    fn new(key: ProgramKey) -> Self {
        ProgramBook {
            key,
            programs: Vec::new(),
            participants: ParticipantLedger::new(),
            funding: FundingLedger::new(key),
        }
    }

    pub fn key(&self) -> ProgramKey {
        self.key
    }

    /// Active (or most recent) program
    pub fn current(&self) -> Option<&RewardProgram> {
        self.programs.last()
    }

    pub(crate) fn current_mut(&mut self) -> Option<&mut RewardProgram> {
        self.programs.last_mut()
    }

    pub fn generation(&self, generation: u32) -> Option<&RewardProgram> {
        self.programs.get(generation as usize)
    }

    /// Current program brought up to `now`, without storing it
    ///
    /// A program whose end has passed but that nobody touched since still has
    /// `is_finished == false` in storage; this resolves it.
    pub(crate) fn current_at(&self, now: u64) -> Result<Option<RewardProgram>> {
        let Some(mut p) = self.current().copied() else {
            return Ok(None);
        };
        update_index(&mut p.accrual, now)?;
        Ok(Some(p))
    }

    /// Plan the next generation at `now`, or fail without touching the book
    ///
    /// The plan carries the predecessor finalized at `now` and the successor
    /// built over the supply it inherits, so committing it cannot fail.
    pub(crate) fn check_setup(&self, params: &ProgramParams, now: u64) -> Result<OpenPlan> {
        params.validate()?;
        let mut predecessor = None;
        let mut inherited = 0;
        if let Some(current) = self.current_at(now)? {
            if !current.is_finished() {
                return Err(StateError::ProgramAlreadyActive(self.key).into());
            }
            inherited = current.accrual.scaled_total_supply;
            predecessor = Some(current.accrual);
        }

        let accrual = Accrual::new(params.total_reward, params.reward_per_day, now, inherited)?;
        Ok(OpenPlan {
            predecessor,
            program: RewardProgram {
                key: self.key,
                reward_token: params.reward_token,
                generation: self.programs.len() as u32,
                accrual,
            },
        })
    }

    /// Store a plan from `check_setup`; the book must not have changed since
    pub(crate) fn open_program(&mut self, plan: OpenPlan) -> RewardProgram {
        if let (Some(prev), Some(finalized)) = (self.current_mut(), plan.predecessor) {
            prev.accrual = finalized;
        }
        let generation = self.funding.open(plan.program.accrual.total_reward);
        debug_assert_eq!(generation, plan.program.generation);
        self.programs.push(plan.program);
        plan.program
    }
}

/// A validated, not yet stored, program generation
#[derive(Copy, Clone, Debug)]
pub(crate) struct OpenPlan {
    predecessor: Option<Accrual>,
    pub(crate) program: RewardProgram,
}

/// Registry of all program books
#[derive(Debug, Default)]
pub struct RewardProgramRegistry {
    books: RwLock<HashMap<ProgramKey, Arc<Mutex<ProgramBook>>>>,
}

impl RewardProgramRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to a key's book, if any program was ever set up on it
    pub fn book(&self, key: &ProgramKey) -> Result<Option<Arc<Mutex<ProgramBook>>>> {
        let books = self.books.read().map_err(|_| StateError::LockPoisoned)?;
        Ok(books.get(key).cloned())
    }

    pub(crate) fn book_or_insert(&self, key: ProgramKey) -> Result<Arc<Mutex<ProgramBook>>> {
        if let Some(book) = self.book(&key)? {
            return Ok(book);
        }
        let mut books = self.books.write().map_err(|_| StateError::LockPoisoned)?;
        Ok(books
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(ProgramBook::new(key))))
            .clone())
    }

    /// Registered keys in ascending order
    pub fn keys(&self) -> Result<Vec<ProgramKey>> {
        let books = self.books.read().map_err(|_| StateError::LockPoisoned)?;
        let mut keys: Vec<ProgramKey> = books.keys().copied().collect();
        keys.sort();
        Ok(keys)
    }

    /// Copy of the current program for a key; `None` is a valid answer
    pub fn get_program(&self, key: &ProgramKey) -> Result<Option<RewardProgram>> {
        match self.book(key)? {
            Some(handle) => {
                let book = lock(&handle)?;
                Ok(book.current().copied())
            }
            None => Ok(None),
        }
    }

    /// Copy of a past or current generation
    pub fn get_program_generation(
        &self,
        key: &ProgramKey,
        generation: u32,
    ) -> Result<Option<RewardProgram>> {
        match self.book(key)? {
            Some(handle) => {
                let book = lock(&handle)?;
                Ok(book.generation(generation).copied())
            }
            None => Ok(None),
        }
    }

    /// Open a program on `params.key` at `now`
    ///
    /// `collect` runs after every check has passed and before anything is
    /// written; it pulls the funding from the caller and may refuse.
    pub fn setup_bucket<F>(&self, params: &ProgramParams, now: u64, collect: F) -> Result<RewardProgram>
    where
        F: FnOnce(&ProgramParams) -> Result<()>,
    {
        params.validate()?;
        let book = self.book_or_insert(params.key)?;
        let mut book = lock(&book)?;
        let plan = book.check_setup(params, now)?;
        collect(params)?;
        let program = book.open_program(plan);
        log::info!(
            "setup {} gen {}: total={} per_day={} token={} end={}",
            params.key,
            program.generation,
            params.total_reward,
            params.reward_per_day,
            params.reward_token,
            program.end_timestamp()
        );
        Ok(program)
    }
}

pub(crate) fn lock(book: &Mutex<ProgramBook>) -> Result<MutexGuard<'_, ProgramBook>> {
    book.lock().map_err(|_| StateError::LockPoisoned.into())
}
