//! Incentives distributor
//!
//! Streams reward tokens to the holders of pool shares. Every `(pool, role)`
//! key can host one active reward program at a time; a program pays
//! `reward_per_day` pro-rata to the participating supply until its
//! `total_reward` is exhausted, and can be succeeded by a new program once it
//! has finished.
//!
//! # Model
//!
//! - A cumulative `reward_index` per program grows by `reward_per_share`
//!   for each second with non-zero supply
//! - Each participant records the index they last settled against and the
//!   balance that held since; settlement is O(1) per touch
//! - The share token calls the `BalanceHook` **before** writing any balance
//! - Seconds with zero supply accrue nothing and push `end_timestamp` out
//!
//! # Usage
//!
//! ```
//! use incentives::*;
//!
//! let admin = Address([1; 32]);
//! let token = Address([9; 32]);
//! let alice = Address([2; 32]);
//!
//! let custody = InMemoryCustody::new();
//! custody.mint(admin, token, 1_000);
//! let engine = RewardDistributor::new(AdminList::new([admin]), custody);
//!
//! let key = ProgramKey::new(PoolId(1), Role::Lender);
//! engine
//!     .setup_bucket(&admin, ProgramParams {
//!         key,
//!         reward_token: token,
//!         total_reward: 1_000,
//!         reward_per_day: 1_000,
//!     }, 0)
//!     .unwrap();
//!
//! engine.on_balance_change(&key, &alice, 100, 0).unwrap();
//! let receipt = engine.claim_reward(&alice, &[key], SECONDS_PER_DAY).unwrap();
//! assert_eq!(receipt.total(), 999);
//! assert_eq!(engine.custody().balance_of(&alice, &token), 999);
//! ```

pub mod claims;
pub mod collaborators;
pub mod distributor;
pub mod error;
pub mod funding;
pub mod ledger;
pub mod registry;
pub mod types;

pub use claims::{ClaimLine, ClaimReceipt};
pub use collaborators::{AdminList, Authorizer, BalanceHook, Custody, InMemoryCustody};
pub use distributor::{zip_keys, RewardDistributor};
pub use error::{AuthorizationError, DistributorError, Result, StateError, ValidationError};
pub use funding::{FundingLedger, Reserve};
pub use ledger::ParticipantLedger;
pub use registry::{ProgramBook, ProgramParams, RewardProgram, RewardProgramRegistry};
pub use types::{Action, Address, AddressParseError, PoolId, ProgramKey, Role, RoleParseError};

pub use reward_math::accrual::{
    Accrual, IndexAdvance, MathError, ParticipantRecord, ProgramStatus, Wad, SECONDS_PER_DAY, U256, WAD,
};

#[cfg(test)]
mod tests;
