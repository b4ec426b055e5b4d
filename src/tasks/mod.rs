//! Background Tasks Module
//!
//! Contains background tasks that run alongside foreground cache calls.
//!
//! # Tasks
//! - Expiry sweep: removes expired entries at the configured interval

mod expiry;

pub use expiry::{ExpiryScheduler, SweepReport, SweepTarget};
