//! API clients for external services
//!
//! - Consumet: catalog listings, title details and stream resolution

pub mod consumet;

pub use consumet::{ConsumetClient, ConsumetError, StreamResolver, TrendingKind};
