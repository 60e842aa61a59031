//! Pure transition policy for the connection lifecycle
//!
//! This module contains pure functions only: given (current state, event,
//! configuration) they decide the next state or how the event must be
//! treated. No side effects happen here - the actor dispatches operations
//! based on the dispositions computed by these functions.

use crate::config::Config;
use crate::transport::Channel;

use super::state::{Event, State};

/// How the machine must treat an event in a given state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    /// Commit a transition to the contained state; entry/exit actions run
    Transition(State),
    /// Act within the current state without leaving it
    Internal,
    /// Defer onto the shelf until the machine leaves the current state
    Shelve,
    /// Not applicable in this state - dropped. The only reachable case is a
    /// stale timer firing that lost the race with cancellation.
    Ignore,
}

/// Determine the disposition of an event (pure function)
///
/// This is the complete transition table of the connection lifecycle.
pub(crate) fn dispose<C: Channel>(state: State, event: &Event<C>, config: &Config) -> Disposition {
    use Disposition::*;

    match (state, event) {
        (State::NotConnected, Event::Connect { .. }) => Transition(State::Connecting),
        // No implicit connect: a bare channel request fails immediately
        (State::NotConnected, Event::GetChannel { .. }) => Internal,
        (State::NotConnected, Event::Disconnect { .. }) => Internal,

        (State::Connecting, Event::Connect { .. } | Event::GetChannel { .. }) => Internal,
        (State::Connecting, Event::Disconnect { .. }) => Shelve,
        (State::Connecting, Event::ConnectSuccess(_)) => Transition(State::Connected),
        (State::Connecting, Event::ConnectFailure(_)) => Transition(initial_failure_state(config)),

        (State::Connected, Event::Connect { .. } | Event::GetChannel { .. }) => Internal,
        (State::Connected, Event::Disconnect { .. }) => Transition(State::Disconnecting),
        (State::Connected, Event::ChannelInactive | Event::KeepAliveFailure(_)) => {
            Transition(loss_state(config))
        }
        (State::Connected, Event::ChannelIdle) => Internal,

        (State::Disconnecting, Event::Connect { .. } | Event::GetChannel { .. }) => Shelve,
        // Additional disconnects attach to the teardown already in flight
        (State::Disconnecting, Event::Disconnect { .. }) => Internal,
        (State::Disconnecting, Event::DisconnectSuccess) => Transition(State::NotConnected),

        // Demand after a lazy loss: attempt once immediately, no delay
        (State::Idle, Event::Connect { .. } | Event::GetChannel { .. }) => {
            Transition(State::Reconnecting)
        }
        (State::Idle, Event::Disconnect { .. }) => Transition(State::NotConnected),

        (State::ReconnectWait, Event::Connect { .. } | Event::GetChannel { .. }) => Internal,
        (State::ReconnectWait, Event::ReconnectDelayElapsed) => Transition(State::Reconnecting),
        (State::ReconnectWait, Event::Disconnect { .. }) => Transition(State::NotConnected),

        (State::Reconnecting, Event::Connect { .. } | Event::GetChannel { .. }) => Internal,
        (State::Reconnecting, Event::Disconnect { .. }) => Shelve,
        (State::Reconnecting, Event::ConnectSuccess(_)) => Transition(State::Connected),
        (State::Reconnecting, Event::ConnectFailure(_)) => Transition(State::ReconnectWait),

        _ => Ignore,
    }
}

/// Determine where the very first connect failure lands (pure function)
///
/// `persistent` and `lazy` govern only this decision. Once a connection has
/// ever been established, every later loss re-enters the retry loop.
fn initial_failure_state(config: &Config) -> State {
    match (config.persistent, config.lazy) {
        (true, true) => State::Idle,
        (true, false) => State::ReconnectWait,
        (false, _) => State::NotConnected,
    }
}

/// Determine where the loss of an established connection lands (pure function)
fn loss_state(config: &Config) -> State {
    if config.lazy {
        State::Idle
    } else {
        State::ReconnectWait
    }
}

/// Check if a state defers events and must drain the shelf on exit
pub(crate) fn shelves(state: State) -> bool {
    matches!(
        state,
        State::Connecting | State::Disconnecting | State::Reconnecting
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::fsm::state::ChannelReply;
    use crate::testing::mocks::MockChannel;
    use tokio::sync::oneshot;

    fn connect_event() -> Event<MockChannel> {
        let (reply, _rx) = oneshot::channel();
        Event::Connect { reply }
    }

    fn get_channel_event(wait_for_reconnect: bool) -> Event<MockChannel> {
        let (reply, _rx): (ChannelReply<MockChannel>, _) = oneshot::channel();
        Event::GetChannel {
            wait_for_reconnect,
            reply,
        }
    }

    fn disconnect_event() -> Event<MockChannel> {
        let (reply, _rx) = oneshot::channel();
        Event::Disconnect { reply }
    }

    fn failure_event() -> Event<MockChannel> {
        Event::ConnectFailure(Error::ConnectFailed("refused".into()))
    }

    #[test]
    fn test_not_connected_rows() {
        let config = Config::default();
        assert_eq!(
            dispose(State::NotConnected, &connect_event(), &config),
            Disposition::Transition(State::Connecting)
        );
        assert_eq!(
            dispose(State::NotConnected, &get_channel_event(true), &config),
            Disposition::Internal
        );
        assert_eq!(
            dispose(State::NotConnected, &disconnect_event(), &config),
            Disposition::Internal
        );
    }

    #[test]
    fn test_connecting_rows() {
        let config = Config::default();
        assert_eq!(
            dispose(State::Connecting, &connect_event(), &config),
            Disposition::Internal
        );
        assert_eq!(
            dispose(State::Connecting, &get_channel_event(false), &config),
            Disposition::Internal
        );
        assert_eq!(
            dispose(State::Connecting, &disconnect_event(), &config),
            Disposition::Shelve
        );
        assert_eq!(
            dispose(
                State::Connecting,
                &Event::ConnectSuccess(MockChannel::new(1)),
                &config
            ),
            Disposition::Transition(State::Connected)
        );
    }

    #[test]
    fn test_first_connect_failure_depends_on_config() {
        let mut config = Config::default();

        // Persistent, not lazy: enter the retry loop
        config.persistent = true;
        config.lazy = false;
        assert_eq!(
            dispose(State::Connecting, &failure_event(), &config),
            Disposition::Transition(State::ReconnectWait)
        );

        // Persistent and lazy: park until demand
        config.lazy = true;
        assert_eq!(
            dispose(State::Connecting, &failure_event(), &config),
            Disposition::Transition(State::Idle)
        );

        // Not persistent: give up
        config.persistent = false;
        assert_eq!(
            dispose(State::Connecting, &failure_event(), &config),
            Disposition::Transition(State::NotConnected)
        );
    }

    #[test]
    fn test_connected_rows() {
        let mut config = Config::default();
        assert_eq!(
            dispose(State::Connected, &connect_event(), &config),
            Disposition::Internal
        );
        assert_eq!(
            dispose(State::Connected, &disconnect_event(), &config),
            Disposition::Transition(State::Disconnecting)
        );
        assert_eq!(
            dispose(State::Connected, &Event::<MockChannel>::ChannelIdle, &config),
            Disposition::Internal
        );

        // Loss: eager mode enters the backoff loop, lazy mode parks in Idle
        config.lazy = false;
        assert_eq!(
            dispose(State::Connected, &Event::<MockChannel>::ChannelInactive, &config),
            Disposition::Transition(State::ReconnectWait)
        );
        config.lazy = true;
        assert_eq!(
            dispose(
                State::Connected,
                &Event::<MockChannel>::KeepAliveFailure(Error::KeepAliveFailed("timeout".into())),
                &config
            ),
            Disposition::Transition(State::Idle)
        );
    }

    #[test]
    fn test_disconnecting_rows() {
        let config = Config::default();
        assert_eq!(
            dispose(State::Disconnecting, &connect_event(), &config),
            Disposition::Shelve
        );
        assert_eq!(
            dispose(State::Disconnecting, &get_channel_event(true), &config),
            Disposition::Shelve
        );
        assert_eq!(
            dispose(State::Disconnecting, &disconnect_event(), &config),
            Disposition::Internal
        );
        assert_eq!(
            dispose(State::Disconnecting, &Event::<MockChannel>::DisconnectSuccess, &config),
            Disposition::Transition(State::NotConnected)
        );
    }

    #[test]
    fn test_idle_rows() {
        let config = Config::default();
        assert_eq!(
            dispose(State::Idle, &connect_event(), &config),
            Disposition::Transition(State::Reconnecting)
        );
        assert_eq!(
            dispose(State::Idle, &get_channel_event(true), &config),
            Disposition::Transition(State::Reconnecting)
        );
        assert_eq!(
            dispose(State::Idle, &disconnect_event(), &config),
            Disposition::Transition(State::NotConnected)
        );
    }

    #[test]
    fn test_reconnect_wait_rows() {
        let config = Config::default();
        assert_eq!(
            dispose(State::ReconnectWait, &connect_event(), &config),
            Disposition::Internal
        );
        assert_eq!(
            dispose(State::ReconnectWait, &get_channel_event(false), &config),
            Disposition::Internal
        );
        assert_eq!(
            dispose(State::ReconnectWait, &Event::<MockChannel>::ReconnectDelayElapsed, &config),
            Disposition::Transition(State::Reconnecting)
        );
        assert_eq!(
            dispose(State::ReconnectWait, &disconnect_event(), &config),
            Disposition::Transition(State::NotConnected)
        );
    }

    #[test]
    fn test_reconnecting_rows() {
        let config = Config::default();
        assert_eq!(
            dispose(State::Reconnecting, &connect_event(), &config),
            Disposition::Internal
        );
        assert_eq!(
            dispose(State::Reconnecting, &disconnect_event(), &config),
            Disposition::Shelve
        );
        assert_eq!(
            dispose(
                State::Reconnecting,
                &Event::ConnectSuccess(MockChannel::new(7)),
                &config
            ),
            Disposition::Transition(State::Connected)
        );

        // Reconnect failure always returns to the backoff wait regardless
        // of configuration
        let lazy_config = Config {
            lazy: true,
            persistent: false,
            ..Config::default()
        };
        assert_eq!(
            dispose(State::Reconnecting, &failure_event(), &lazy_config),
            Disposition::Transition(State::ReconnectWait)
        );
    }

    #[test]
    fn test_non_applicable_events_are_ignored() {
        let config = Config::default();
        assert_eq!(
            dispose(State::NotConnected, &Event::<MockChannel>::ReconnectDelayElapsed, &config),
            Disposition::Ignore
        );
        assert_eq!(
            dispose(State::Idle, &Event::<MockChannel>::ChannelIdle, &config),
            Disposition::Ignore
        );
        assert_eq!(
            dispose(State::NotConnected, &Event::<MockChannel>::DisconnectSuccess, &config),
            Disposition::Ignore
        );
    }

    #[test]
    fn test_shelving_states() {
        assert!(shelves(State::Connecting));
        assert!(shelves(State::Disconnecting));
        assert!(shelves(State::Reconnecting));
        assert!(!shelves(State::NotConnected));
        assert!(!shelves(State::Connected));
        assert!(!shelves(State::Idle));
        assert!(!shelves(State::ReconnectWait));
    }
}
