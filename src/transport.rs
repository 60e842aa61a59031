//! Transport abstraction for connection lifecycle management
//!
//! This module provides the delegate traits the state machine orchestrates.
//! The machine never touches the network itself - establishing, closing and
//! probing a connection all happen through a [`Transport`] implementation
//! injected by the embedding application, which enables dependency injection
//! and testing.

use async_trait::async_trait;

use crate::error::Result;

/// Handle to one connected transport resource - the unit being
/// lifecycle-managed.
///
/// Handles must be cheap to clone; every caller attached to a successful
/// connect attempt receives a clone of the same handle.
#[async_trait]
pub trait Channel: Clone + Send + Sync + 'static {
    /// Check if the underlying resource is still open
    fn is_open(&self) -> bool;

    /// Close the underlying resource. Must be idempotent.
    async fn close(&self);
}

/// The side-effecting operations the state machine orchestrates
///
/// All of them run outside the machine's serialized section; their outcomes
/// re-enter the machine as internal events.
#[async_trait]
pub trait Transport<C: Channel>: Send + Sync + 'static {
    /// Open a new channel. A failure is propagated to every caller handle
    /// attached to the shared attempt.
    async fn connect(&self) -> Result<C>;

    /// Tear down `channel`. The machine advances the same way regardless of
    /// the outcome; only the completion timing matters.
    async fn disconnect(&self, channel: C) -> Result<()>;

    /// Probe an idle channel to confirm it is still valid. A failure closes
    /// the channel and begins recovery; success is a no-op.
    ///
    /// The default implementation does nothing, for transports whose idle
    /// connections need no probing.
    async fn keep_alive(&self, channel: C) -> Result<()> {
        let _ = channel;
        Ok(())
    }
}
