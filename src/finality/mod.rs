//! Finality Tracking
//!
//! Drives a queued operation to a terminal status by polling the engine.
//!
//! # Phases
//!
//! ```text
//! submit ──▶ FinalityTracker (foreground, small budget)
//!                 │ Mined / Cancelled ──▶ caller
//!                 │ budget exhausted
//!                 ▼
//!            BackgroundSupervisor (detached, larger budget)
//!                 │ Mined / Cancelled ──▶ FinalityHandle, events
//!                 │ budget exhausted ───▶ reconciliation ledger
//! ```
//!
//! # Safety Invariants
//!
//! 1. **One Poller**: a queue id is polled by at most one tracker at a time
//! 2. **One-Way Hand-off**: ownership moves foreground → background once
//! 3. **Same Handle**: errored operations are retried on their queue id,
//!    never resubmitted
//! 4. **Free Network Errors**: failing to read a status consumes no budget

pub mod error;
pub mod ownership;
pub mod session;
pub mod status;
pub mod supervisor;
pub mod tracker;

pub use error::TrackError;
pub use ownership::{Owner, OwnershipRegistry};
pub use session::{ExhaustedBudget, TrackingPolicy, TrackingSession};
pub use status::{PollOutcome, StatusPoller, TransactionStatus};
pub use supervisor::{
    BackgroundEvent, BackgroundOutcome, BackgroundSupervisor, ExhaustedRecord, FinalityHandle,
};
pub use tracker::{Finality, FinalityTracker};
