//! The Distribution Service: serves ring files over HTTP with ETag-based
//! conditional fetch (spec.md §4.3).

mod cache;
mod server;

pub use cache::RingCache;
pub use server::{router, DistributionState};
