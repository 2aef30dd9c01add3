//! Sync engine - one state object per dashboard instance.

mod sync_engine;


pub use sync_engine::{HandleOutcome, PositionsOutcome, SyncEngine};
