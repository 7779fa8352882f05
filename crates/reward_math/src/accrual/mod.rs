//! Time-weighted reward streaming with O(1) complexity
//!
//! This module implements the accrual core of a multi-program reward
//! distributor: a fixed total reward is streamed to the holders of a pool
//! proportionally to `balance × holding time`, without ever iterating over
//! holders.
//!
//! ## Key Features
//!
//! - **O(1) Updates**: one cumulative index per program instead of per-holder credits
//! - **Lazy Settlement**: holders reconcile against the index on their next touch
//! - **WAD Fixed Point**: 10^18 scale on a 256-bit index, always floored
//! - **Idle Tail**: zero-supply time is pushed to the end of the stream
//! - **No_std Compatible**: no allocation; `primitive-types` supplies `U256`
//!
//! ## Architecture
//!
//! ```text
//! Balance change (pre-mutation hook):
//! 1. update_index: index += reward_per_share * elapsed   (or extend tail if idle)
//! 2. apply_supply_change: supply += new - old, recompute reward_per_share
//! 3. settle_participant: fixed += old_balance * (index - last_index) / WAD
//! 4. old_balance = new_balance
//! [O(1) per event]
//!
//! Projection:
//! preview_index on a copy, pending_since on the stored record
//! [O(1), read-only]
//! ```
//!
//! ## Usage Example
//!
//! ```rust
//! use reward_math::accrual::*;
//!
//! // 10_000 over 10 days
//! let mut program = Accrual::new(10_000, 1_000, 0, 0).unwrap();
//! let mut lender = ParticipantRecord::new(0);
//!
//! // Lender deposits 100 at t=0 (hook runs before the token balance moves)
//! touch(&mut program, &mut lender, 100, 0).unwrap();
//!
//! // One day later the lender is the only holder and earned ~1000
//! let claimable = project_claimable(&program, &lender, SECONDS_PER_DAY).unwrap();
//! assert_eq!(claimable, 999);
//! ```
//!
//! ## Invariants
//!
//! 1. **Monotonic Index**: `reward_index` never decreases
//! 2. **Conservation**: Σ settled + Σ pending <= total_reward
//! 3. **No Retroactive Credit**: zero balance over a window earns zero for it
//! 4. **Frozen Finish**: after `is_finished`, index and timestamps never move
//! 5. **Idempotent Settlement**: settling twice at one index adds nothing

pub mod wad;
pub mod state;
pub mod index;
pub mod settle;

#[cfg(kani)]
pub mod proofs;

// Re-export core types for convenience
pub use primitive_types::U256;
pub use wad::{MathError, Wad, WAD};
pub use state::{schedule_duration, schedule_end, Accrual, ParticipantRecord, ProgramStatus, SECONDS_PER_DAY};
pub use index::{apply_supply_change, preview_index, recompute_reward_per_share, update_index, IndexAdvance};
pub use settle::{pending_since, project_claimable, settle_participant, touch, TouchOutcome};
