//! Mutable state owned by the machine's task
//!
//! Holds the current channel, the shared sets of completion handles, and the
//! backoff progression. The context is owned exclusively by the actor task,
//! so nothing here needs a lock.

use crate::error::{Error, Result};
use crate::scheduler::Cancellable;
use crate::transport::Channel;

use super::state::{ChannelReply, DisconnectReply, State};

pub(crate) struct FsmContext<C: Channel> {
    /// Most recently committed state - only the actor writes it
    pub(crate) state: State,
    /// Channel produced by the last successful connect, if any
    pub(crate) channel: Option<C>,

    /// Handles attached to the pending connect attempt. All of them resolve
    /// together when the attempt settles.
    connect_waiters: Vec<ChannelReply<C>>,
    /// Whether a connect attempt (or a backoff wait leading to one) is live
    connect_pending: bool,

    /// Handles attached to the pending disconnect
    disconnect_waiters: Vec<DisconnectReply>,
    disconnect_pending: bool,

    /// Whole seconds waited before the attempt currently pending (or just
    /// failed). `None` between retry episodes.
    reconnect_delay: Option<u64>,
    /// Armed backoff timer, present while the machine sits in the backoff wait
    reconnect_timer: Option<Box<dyn Cancellable>>,
}

impl<C: Channel> FsmContext<C> {
    pub(crate) fn new(state: State) -> Self {
        Self {
            state,
            channel: None,
            connect_waiters: Vec::new(),
            connect_pending: false,
            disconnect_waiters: Vec::new(),
            disconnect_pending: false,
            reconnect_delay: None,
            reconnect_timer: None,
        }
    }

    /// Open a fresh shared connect attempt, optionally seeding it with the
    /// handle of the caller that triggered it
    pub(crate) fn begin_connect(&mut self, reply: Option<ChannelReply<C>>) {
        debug_assert!(!self.connect_pending, "connect attempt already pending");
        self.connect_pending = true;
        if let Some(reply) = reply {
            self.connect_waiters.push(reply);
        }
    }

    /// Attach another caller to the attempt already in flight
    pub(crate) fn attach_connect_waiter(&mut self, reply: ChannelReply<C>) {
        self.connect_waiters.push(reply);
    }

    /// Resolve every attached caller with a clone of `channel`
    pub(crate) fn resolve_connect(&mut self, channel: &C) {
        self.connect_pending = false;
        for reply in self.connect_waiters.drain(..) {
            // Callers that dropped their receiver are safe to miss
            let _ = reply.send(Ok(channel.clone()));
        }
    }

    /// Fail every attached caller with a clone of `error`
    pub(crate) fn reject_connect(&mut self, error: Error) {
        self.connect_pending = false;
        for reply in self.connect_waiters.drain(..) {
            let _ = reply.send(Err(error.clone()));
        }
    }

    pub(crate) fn begin_disconnect(&mut self, reply: DisconnectReply) {
        self.disconnect_pending = true;
        self.disconnect_waiters.push(reply);
    }

    pub(crate) fn attach_disconnect_waiter(&mut self, reply: DisconnectReply) {
        self.disconnect_waiters.push(reply);
    }

    pub(crate) fn resolve_disconnect(&mut self) {
        self.disconnect_pending = false;
        for reply in self.disconnect_waiters.drain(..) {
            let _ = reply.send(());
        }
    }

    /// Advance the backoff progression and return the delay to arm, in whole
    /// seconds: 1 on a fresh episode, then doubling up to `cap`
    pub(crate) fn next_backoff(&mut self, cap: u64) -> u64 {
        let next = match self.reconnect_delay {
            None => 1,
            Some(previous) => previous.saturating_mul(2).min(cap),
        };
        self.reconnect_delay = Some(next);
        next
    }

    /// Forget the backoff progression
    ///
    /// Any stored timer handle is dropped without cancelling; callers that
    /// need cancellation use [`cancel_backoff`](Self::cancel_backoff).
    pub(crate) fn clear_backoff(&mut self) {
        self.reconnect_delay = None;
        self.reconnect_timer = None;
    }

    /// Cancel the armed timer (if any) and forget the progression
    pub(crate) fn cancel_backoff(&mut self) {
        if let Some(mut timer) = self.reconnect_timer.take() {
            timer.cancel();
        }
        self.reconnect_delay = None;
    }

    pub(crate) fn arm_timer(&mut self, timer: Box<dyn Cancellable>) {
        self.reconnect_timer = Some(timer);
    }

    /// Drop the spent timer handle after it fired
    pub(crate) fn disarm_timer(&mut self) {
        self.reconnect_timer = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::MockChannel;
    use tokio::sync::oneshot;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut ctx: FsmContext<MockChannel> = FsmContext::new(State::NotConnected);
        let delays: Vec<u64> = (0..7).map(|_| ctx.next_backoff(32)).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 32]);

        // Starts over at 1 after the progression is cleared
        ctx.clear_backoff();
        assert_eq!(ctx.next_backoff(32), 1);
    }

    #[tokio::test]
    async fn test_connect_waiters_share_one_resolution() {
        let mut ctx: FsmContext<MockChannel> = FsmContext::new(State::Connecting);
        let (first, first_rx) = oneshot::channel();
        let (second, second_rx) = oneshot::channel();

        ctx.begin_connect(Some(first));
        ctx.attach_connect_waiter(second);

        let channel = MockChannel::new(9);
        ctx.resolve_connect(&channel);

        assert_eq!(first_rx.await.unwrap().unwrap().id(), 9);
        assert_eq!(second_rx.await.unwrap().unwrap().id(), 9);
    }

    #[tokio::test]
    async fn test_reject_fans_the_error_out() {
        let mut ctx: FsmContext<MockChannel> = FsmContext::new(State::Reconnecting);
        let (first, first_rx) = oneshot::channel();
        let (second, second_rx) = oneshot::channel();
        ctx.begin_connect(Some(first));
        ctx.attach_connect_waiter(second);

        ctx.reject_connect(Error::Disconnected);

        assert_eq!(first_rx.await.unwrap().unwrap_err(), Error::Disconnected);
        assert_eq!(second_rx.await.unwrap().unwrap_err(), Error::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_waiters_all_resolve() {
        let mut ctx: FsmContext<MockChannel> = FsmContext::new(State::Disconnecting);
        let (first, first_rx) = oneshot::channel();
        let (second, second_rx) = oneshot::channel();
        ctx.begin_disconnect(first);
        ctx.attach_disconnect_waiter(second);

        ctx.resolve_disconnect();
        first_rx.await.unwrap();
        second_rx.await.unwrap();
    }
}
