//! State and event model for the connection lifecycle

use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::transport::Channel;

/// Connection lifecycle states
///
/// The graph is cyclic and has no terminal state; any state is a valid
/// initial state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No channel, no attempt in progress
    NotConnected,
    /// The very first connect attempt is in flight
    Connecting,
    /// A channel is open and usable
    Connected,
    /// A disconnect is in flight
    Disconnecting,
    /// Connection lost in lazy mode - waiting for demand before reconnecting
    Idle,
    /// Waiting out the backoff delay before the next reconnect attempt
    ReconnectWait,
    /// A reconnect attempt is in flight
    Reconnecting,
}

impl State {
    /// String representation for logging
    pub fn name(&self) -> &'static str {
        match self {
            State::NotConnected => "NotConnected",
            State::Connecting => "Connecting",
            State::Connected => "Connected",
            State::Disconnecting => "Disconnecting",
            State::Idle => "Idle",
            State::ReconnectWait => "ReconnectWait",
            State::Reconnecting => "Reconnecting",
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Completion handle carried by `Connect` and `GetChannel` events
///
/// Resolves to a channel handle, or to the failure of the shared attempt.
pub type ChannelReply<C> = oneshot::Sender<Result<C>>;

/// Completion handle carried by `Disconnect` events
///
/// Always resolves successfully once the machine has moved past the
/// disconnect.
pub type DisconnectReply = oneshot::Sender<()>;

/// Events that drive state transitions
///
/// Caller-initiated variants carry completion handles. The remaining
/// variants are raised internally when an asynchronous operation resolves,
/// and are the only way state advances past an in-flight operation.
pub enum Event<C: Channel> {
    /// Request a connection - always permitted to start a new attempt
    Connect { reply: ChannelReply<C> },
    /// Request the current channel
    ///
    /// With `wait_for_reconnect == false` the reply fails immediately during
    /// the backoff wait instead of attaching to the pending retry; the flag
    /// has no effect in other states.
    GetChannel {
        wait_for_reconnect: bool,
        reply: ChannelReply<C>,
    },
    /// Request a disconnect
    Disconnect { reply: DisconnectReply },
    /// The connect delegate produced a channel
    ConnectSuccess(C),
    /// The connect delegate failed
    ConnectFailure(Error),
    /// The transport reported the channel is no longer active
    ChannelInactive,
    /// The transport reported the channel has been idle too long
    ChannelIdle,
    /// The keep-alive delegate failed
    KeepAliveFailure(Error),
    /// The disconnect delegate completed (in any way)
    DisconnectSuccess,
    /// The armed backoff timer elapsed
    ReconnectDelayElapsed,
}

impl<C: Channel> Event<C> {
    /// Get the payload-free tag of this event
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Connect { .. } => EventKind::Connect,
            Event::GetChannel { .. } => EventKind::GetChannel,
            Event::Disconnect { .. } => EventKind::Disconnect,
            Event::ConnectSuccess(_) => EventKind::ConnectSuccess,
            Event::ConnectFailure(_) => EventKind::ConnectFailure,
            Event::ChannelInactive => EventKind::ChannelInactive,
            Event::ChannelIdle => EventKind::ChannelIdle,
            Event::KeepAliveFailure(_) => EventKind::KeepAliveFailure,
            Event::DisconnectSuccess => EventKind::DisconnectSuccess,
            Event::ReconnectDelayElapsed => EventKind::ReconnectDelayElapsed,
        }
    }
}

impl<C: Channel> std::fmt::Debug for Event<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind().name())
    }
}

/// Payload-free event tag used for logging and transition listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Connect,
    GetChannel,
    Disconnect,
    ConnectSuccess,
    ConnectFailure,
    ChannelInactive,
    ChannelIdle,
    KeepAliveFailure,
    DisconnectSuccess,
    ReconnectDelayElapsed,
}

impl EventKind {
    /// String representation for logging
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Connect => "Connect",
            EventKind::GetChannel => "GetChannel",
            EventKind::Disconnect => "Disconnect",
            EventKind::ConnectSuccess => "ConnectSuccess",
            EventKind::ConnectFailure => "ConnectFailure",
            EventKind::ChannelInactive => "ChannelInactive",
            EventKind::ChannelIdle => "ChannelIdle",
            EventKind::KeepAliveFailure => "KeepAliveFailure",
            EventKind::DisconnectSuccess => "DisconnectSuccess",
            EventKind::ReconnectDelayElapsed => "ReconnectDelayElapsed",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
