//! Integration tests for ReelStream
//!
//! Tests are organized by component:
//! - consumet_test: Consumet client (listings, info fallback, stream lookup)
//! - playback_test: Playback session state machine and recovery policies
//! - e2e_test: End-to-end flow tests (Home -> Title -> Play -> Failover)
//! - common: Recording player and table resolver shared by the above

// Note: Each test file is a separate integration test crate
// Tests are run individually by cargo, not via mod.rs
