//! Record merge cache - the single shared store of the engine.

mod record_cache;


pub use record_cache::RecordCache;
