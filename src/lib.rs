//! Halcyon - Connection Lifecycle State Machine
//!
//! A state machine that manages the lifecycle of a single logical connection:
//! connecting, disconnecting, keep-alive probing, and automatic reconnection
//! with exponential backoff.
//!
//! # Overview
//!
//! This crate provides:
//! - A seven-state lifecycle model with a strict transition policy
//! - Shared connect attempts - concurrent callers attach to one attempt
//! - Event deferral (shelving) during in-flight connects and disconnects
//! - Automatic reconnection with exponential backoff (1s doubling to a cap)
//! - Pluggable transport delegates and a pluggable timer facility
//!
//! The machine never touches the network itself. Applications inject a
//! [`Transport`] implementation that knows how to open, close, and probe a
//! [`Channel`], and the machine orchestrates when those operations run.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use halcyon::{Channel, Config, ConnectionFsm, Result, Transport};
//!
//! #[derive(Debug, Clone)]
//! struct MyChannel;
//!
//! #[async_trait]
//! impl Channel for MyChannel {
//!     fn is_open(&self) -> bool {
//!         true
//!     }
//!     async fn close(&self) {}
//! }
//!
//! struct MyTransport;
//!
//! #[async_trait]
//! impl Transport<MyChannel> for MyTransport {
//!     async fn connect(&self) -> Result<MyChannel> {
//!         // Open the real connection here
//!         Ok(MyChannel)
//!     }
//!     async fn disconnect(&self, _channel: MyChannel) -> Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let fsm = ConnectionFsm::new(Config::default(), Arc::new(MyTransport));
//!
//!     let _channel = fsm.connect().await?;
//!     // ... use the channel ...
//!     fsm.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod fsm;
pub mod scheduler;
pub mod testing;
pub mod transport;

// Re-export the primary API surface
pub use config::Config;
pub use error::{Error, Result};
pub use fsm::{ConnectionFsm, Event, EventKind, Snapshot, State, TransitionListener};
pub use scheduler::{Cancellable, Scheduler, TokioScheduler};
pub use transport::{Channel, Transport};
