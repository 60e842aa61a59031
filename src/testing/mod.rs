//! Mock implementations for testing
//!
//! Provides an in-memory channel, a scripted transport, and a manually
//! driven scheduler so lifecycle behavior can be tested deterministically
//! without sockets or real timers.

pub mod mocks;
