//! Pure accrual math for the incentives distributor
//!
//! Everything in this crate is deterministic integer arithmetic over plain
//! `Copy` state. The stateful, thread-safe engine lives in the `incentives`
//! crate and calls into `accrual` for every index and settlement step.

#![cfg_attr(not(test), no_std)]

pub mod accrual;
