//! Background Tasks Module
//!
//! Cleanup triggers that run beside the cache.
//!
//! # Tasks
//! - Periodic sweep: attempts a cleanup pass at the configured interval
//! - On-write sweep: a short-delay attempt after a write crosses the eviction threshold

mod cleanup;

pub use cleanup::{
    spawn_cleanup_task, CleanupOutcome, CleanupReport, CleanupScheduler, CleanupTarget, RunGuard,
    RunSlot, ONE_SHOT_DELAY,
};
