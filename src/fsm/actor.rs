//! Impure event execution for the connection lifecycle
//!
//! A single task owns the context and consumes events one at a time; this is
//! the machine's serialization guarantee. The full effect of one event,
//! deferred-event replay included, completes before the next external event
//! is accepted. Delegate operations (connect, disconnect, keep-alive) run on
//! separate spawned tasks and their outcomes flow back in as internal events.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Error;
use crate::scheduler::Scheduler;
use crate::transport::{Channel, Transport};

use super::context::FsmContext;
use super::shelf::Shelf;
use super::state::{Event, EventKind, State};
use super::transition::{self, Disposition};
use super::{FsmInput, Snapshot, TransitionListener};

pub(crate) struct FsmActor<C: Channel> {
    pub(crate) config: Config,
    pub(crate) transport: Arc<dyn Transport<C>>,
    pub(crate) scheduler: Arc<dyn Scheduler>,
    pub(crate) ctx: FsmContext<C>,
    pub(crate) shelf: Shelf<C>,
    pub(crate) event_rx: mpsc::UnboundedReceiver<FsmInput<C>>,
    pub(crate) event_tx: mpsc::UnboundedSender<FsmInput<C>>,
    pub(crate) snapshot_tx: watch::Sender<Snapshot<C>>,
    pub(crate) listeners: Arc<Mutex<Vec<TransitionListener>>>,
}

impl<C: Channel> FsmActor<C> {
    /// Consume events until every facade handle has been dropped
    pub(crate) async fn run(mut self) {
        while let Some(input) = self.event_rx.recv().await {
            self.process(input);
        }
        debug!("Event channel closed, lifecycle task exiting");
    }

    /// Process one external event to quiescence, shelf replay included
    fn process(&mut self, input: FsmInput<C>) {
        let FsmInput { event, done } = input;

        let mut queue: VecDeque<Event<C>> = VecDeque::new();
        queue.push_back(event);

        while let Some(event) = queue.pop_front() {
            let from = self.ctx.state;
            self.apply(event);

            // Leaving a shelving state replays every deferred event, in
            // arrival order, ahead of anything still queued
            if transition::shelves(from) && self.ctx.state != from && !self.shelf.is_empty() {
                for deferred in self.shelf.take_all().into_iter().rev() {
                    queue.push_front(deferred);
                }
            }
        }

        if let Some(done) = done {
            let _ = done.send(self.ctx.state);
        }
    }

    fn apply(&mut self, event: Event<C>) {
        let from = self.ctx.state;
        let kind = event.kind();

        match transition::dispose(from, &event, &self.config) {
            Disposition::Ignore => {
                debug!("Dropping {} - not applicable in {}", kind, from);
                return;
            }
            Disposition::Shelve => {
                debug!("Shelving {} until {} completes", kind, from);
                self.shelf.push(event);
            }
            Disposition::Internal => {
                self.on_internal(event);
            }
            Disposition::Transition(to) => {
                self.on_transition(from, to, event);
                self.ctx.state = to;
                info!("Connection state: {} -> {} ({})", from, to, kind);
            }
        }

        let _ = self.snapshot_tx.send_replace(Snapshot {
            state: self.ctx.state,
            channel: self.ctx.channel.clone(),
        });
        self.notify(from, self.ctx.state, kind);
    }

    /// Handle an event that acts within the current state
    fn on_internal(&mut self, event: Event<C>) {
        match (self.ctx.state, event) {
            (State::NotConnected, Event::GetChannel { reply, .. }) => {
                let _ = reply.send(Err(Error::NotConnected));
            }
            (State::NotConnected, Event::Disconnect { reply }) => {
                let _ = reply.send(());
            }

            (
                State::Connecting | State::Reconnecting,
                Event::Connect { reply } | Event::GetChannel { reply, .. },
            ) => {
                self.ctx.attach_connect_waiter(reply);
            }

            (State::Connected, Event::Connect { reply } | Event::GetChannel { reply, .. }) => {
                let _ = match &self.ctx.channel {
                    Some(channel) => reply.send(Ok(channel.clone())),
                    None => reply.send(Err(Error::NotConnected)),
                };
            }
            (State::Connected, Event::ChannelIdle) => {
                self.spawn_keep_alive();
            }

            (State::Disconnecting, Event::Disconnect { reply }) => {
                self.ctx.attach_disconnect_waiter(reply);
            }

            (State::ReconnectWait, Event::Connect { reply }) => {
                self.ctx.attach_connect_waiter(reply);
            }
            (
                State::ReconnectWait,
                Event::GetChannel {
                    wait_for_reconnect,
                    reply,
                },
            ) => {
                if wait_for_reconnect {
                    self.ctx.attach_connect_waiter(reply);
                } else {
                    let _ = reply.send(Err(Error::NotConnected));
                }
            }

            (state, event) => {
                debug!("Internal event {} has no effect in {}", event.kind(), state);
            }
        }
    }

    /// Run the exit/entry actions of a committed transition
    fn on_transition(&mut self, from: State, to: State, event: Event<C>) {
        match event {
            // NotConnected -> Connecting, or Idle -> Reconnecting
            Event::Connect { reply } | Event::GetChannel { reply, .. } => {
                self.ctx.begin_connect(Some(reply));
                self.spawn_connect();
            }

            Event::ConnectSuccess(channel) => {
                self.ctx.channel = Some(channel.clone());
                self.ctx.resolve_connect(&channel);
                self.ctx.clear_backoff();
            }

            Event::ConnectFailure(error) => {
                warn!("Connect attempt failed in {}: {}", from, error);
                self.ctx.reject_connect(error);
                if to == State::ReconnectWait {
                    self.enter_reconnect_wait();
                }
            }

            Event::Disconnect { reply } => match from {
                State::Connected => {
                    self.ctx.begin_disconnect(reply);
                    self.spawn_disconnect();
                }
                State::ReconnectWait => {
                    self.ctx.cancel_backoff();
                    self.ctx.reject_connect(Error::Disconnected);
                    let _ = reply.send(());
                }
                // Idle: nothing in flight, succeed on the spot
                _ => {
                    let _ = reply.send(());
                }
            },

            Event::DisconnectSuccess => {
                self.ctx.channel = None;
                self.ctx.resolve_disconnect();
                self.ctx.clear_backoff();
            }

            Event::ChannelInactive => {
                warn!("Connection lost");
                self.ctx.channel = None;
                if to == State::ReconnectWait {
                    self.enter_reconnect_wait();
                }
            }

            Event::KeepAliveFailure(error) => {
                warn!("Keep-alive failed, closing channel: {}", error);
                if let Some(channel) = self.ctx.channel.take() {
                    tokio::spawn(async move { channel.close().await });
                }
                if to == State::ReconnectWait {
                    self.enter_reconnect_wait();
                }
            }

            Event::ReconnectDelayElapsed => {
                self.ctx.disarm_timer();
                self.spawn_connect();
            }

            // Unreachable per the transition table; kept for exhaustiveness
            Event::ChannelIdle => {}
        }
    }

    /// Arm the backoff timer and open the shared attempt it will trigger
    fn enter_reconnect_wait(&mut self) {
        self.ctx.begin_connect(None);

        let delay = self.ctx.next_backoff(self.config.reconnect_delay_cap());
        info!("Next reconnect attempt in {}s", delay);

        let event_tx = self.event_tx.clone();
        let timer = self.scheduler.schedule(
            Duration::from_secs(delay),
            Box::new(move || {
                let _ = event_tx.send(FsmInput::event(Event::ReconnectDelayElapsed));
            }),
        );
        self.ctx.arm_timer(timer);
    }

    fn spawn_connect(&self) {
        let transport = self.transport.clone();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let outcome = match transport.connect().await {
                Ok(channel) => Event::ConnectSuccess(channel),
                Err(error) => Event::ConnectFailure(error),
            };
            let _ = event_tx.send(FsmInput::event(outcome));
        });
    }

    fn spawn_disconnect(&self) {
        let transport = self.transport.clone();
        let event_tx = self.event_tx.clone();
        let channel = self.ctx.channel.clone();
        tokio::spawn(async move {
            if let Some(channel) = channel {
                if let Err(error) = transport.disconnect(channel).await {
                    warn!("Disconnect delegate failed: {}", error);
                }
            }
            // The machine advances regardless of the delegate's outcome
            let _ = event_tx.send(FsmInput::event(Event::DisconnectSuccess));
        });
    }

    fn spawn_keep_alive(&self) {
        // A zero idle threshold disables keep-alive probing entirely
        if self.config.max_idle.is_zero() {
            debug!("Keep-alive disabled, dropping idle notification");
            return;
        }
        let Some(channel) = self.ctx.channel.clone() else {
            return;
        };

        let transport = self.transport.clone();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            if let Err(error) = transport.keep_alive(channel).await {
                let _ = event_tx.send(FsmInput::event(Event::KeepAliveFailure(error)));
            }
        });
    }

    fn notify(&self, from: State, to: State, kind: EventKind) {
        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for listener in listeners.iter() {
            listener(from, to, &kind);
        }
    }
}
