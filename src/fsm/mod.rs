//! Connection lifecycle state machine
//!
//! [`ConnectionFsm`] is the cheaply cloneable handle applications hold. All
//! state is owned by one background task and events are fed
//! to it over an unbounded channel, which is the machine's serialization
//! guarantee: the full effect of one event completes before the next external
//! event is accepted. Callers receive oneshot completion handles, so
//! concurrent requests share a single connect attempt instead of racing.

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot, watch};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::scheduler::{Scheduler, TokioScheduler};
use crate::transport::{Channel, Transport};

pub mod state;

pub(crate) mod actor;
pub(crate) mod context;
pub(crate) mod shelf;
pub(crate) mod transition;


pub use state::{Event, EventKind, State};

use actor::FsmActor;
use context::FsmContext;
use shelf::Shelf;

/// Observer invoked after every processed event with `(from, to, event)`
///
/// Internal and deferred events are reported too; `from == to` for activity
/// that stays within one state. Listeners run on the machine's task and must
/// not block.
pub type TransitionListener = Box<dyn Fn(State, State, &EventKind) + Send + Sync>;

/// One unit of work for the machine's task: an event plus an optional
/// acknowledgement resolved with the state committed after processing
pub(crate) struct FsmInput<C: Channel> {
    pub(crate) event: Event<C>,
    pub(crate) done: Option<oneshot::Sender<State>>,
}

impl<C: Channel> FsmInput<C> {
    pub(crate) fn event(event: Event<C>) -> Self {
        Self { event, done: None }
    }

    pub(crate) fn acknowledged(event: Event<C>, done: oneshot::Sender<State>) -> Self {
        Self {
            event,
            done: Some(done),
        }
    }
}

/// Externally observable condition of the machine at one instant
#[derive(Debug, Clone)]
pub struct Snapshot<C: Channel> {
    /// Most recently committed state
    pub state: State,
    /// Channel produced by the last successful connect, if still held
    pub channel: Option<C>,
}

/// Handle to a running connection lifecycle state machine
///
/// Cloning the handle shares the underlying machine. The machine keeps
/// running until every handle has been dropped.
pub struct ConnectionFsm<C: Channel> {
    event_tx: mpsc::UnboundedSender<FsmInput<C>>,
    snapshot_rx: watch::Receiver<Snapshot<C>>,
    listeners: Arc<Mutex<Vec<TransitionListener>>>,
}

impl<C: Channel> Clone for ConnectionFsm<C> {
    fn clone(&self) -> Self {
        Self {
            event_tx: self.event_tx.clone(),
            snapshot_rx: self.snapshot_rx.clone(),
            listeners: self.listeners.clone(),
        }
    }
}

impl<C: Channel> ConnectionFsm<C> {
    /// Start a machine in `NotConnected` with the default tokio-backed timer
    pub fn new(config: Config, transport: Arc<dyn Transport<C>>) -> Self {
        Self::with_scheduler(config, transport, Arc::new(TokioScheduler))
    }

    /// Start a machine with an injected timer facility
    pub fn with_scheduler(
        config: Config,
        transport: Arc<dyn Transport<C>>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self::with_initial_state(State::NotConnected, config, transport, scheduler)
    }

    /// Start a machine in an arbitrary initial state
    ///
    /// The lifecycle graph is cyclic with no terminal state, so every state
    /// is a valid starting point. Primarily useful for testing.
    pub fn with_initial_state(
        initial: State,
        config: Config,
        transport: Arc<dyn Transport<C>>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot {
            state: initial,
            channel: None,
        });
        let listeners: Arc<Mutex<Vec<TransitionListener>>> = Arc::new(Mutex::new(Vec::new()));

        let actor = FsmActor {
            config,
            transport,
            scheduler,
            ctx: FsmContext::new(initial),
            shelf: Shelf::new(),
            event_rx,
            event_tx: event_tx.clone(),
            snapshot_tx,
            listeners: listeners.clone(),
        };
        tokio::spawn(actor.run());

        Self {
            event_tx,
            snapshot_rx,
            listeners,
        }
    }

    /// Request a connection and wait for the shared attempt to settle
    ///
    /// Starts a new attempt if none is pending; otherwise attaches to the
    /// attempt already in flight.
    pub async fn connect(&self) -> Result<C> {
        let (reply, rx) = oneshot::channel();
        self.send(FsmInput::event(Event::Connect { reply }))?;
        rx.await.map_err(|_| Error::Shutdown)?
    }

    /// Obtain the current channel without forcing a brand-new connection
    ///
    /// When already connected this resolves immediately from the latest
    /// snapshot. During the backoff wait, `wait_for_reconnect` chooses
    /// between attaching to the pending retry and failing fast.
    pub async fn get_channel(&self, wait_for_reconnect: bool) -> Result<C> {
        // Fast path: the handle may be stale by delivery time, exactly like
        // any handle obtained just before a connection loss would be
        {
            let snapshot = self.snapshot_rx.borrow();
            if snapshot.state == State::Connected {
                if let Some(channel) = &snapshot.channel {
                    return Ok(channel.clone());
                }
            }
        }

        let (reply, rx) = oneshot::channel();
        self.send(FsmInput::event(Event::GetChannel {
            wait_for_reconnect,
            reply,
        }))?;
        rx.await.map_err(|_| Error::Shutdown)?
    }

    /// Request a disconnect and wait until the machine settles back in
    /// `NotConnected`
    ///
    /// Only fails when the machine is gone.
    pub async fn disconnect(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(FsmInput::event(Event::Disconnect { reply }))?;
        rx.await.map_err(|_| Error::Shutdown)
    }

    /// Inject an event without waiting for it to be processed
    ///
    /// This is how the embedding transport layer reports channel-inactive
    /// and channel-idle notifications.
    pub fn fire_event(&self, event: Event<C>) -> Result<()> {
        self.send(FsmInput::event(event))
    }

    /// Inject an event and wait until its full effect has been committed,
    /// deferred-event replay included
    ///
    /// Resolves with the state the machine settled in.
    pub async fn fire_event_blocking(&self, event: Event<C>) -> Result<State> {
        let (done, rx) = oneshot::channel();
        self.send(FsmInput::acknowledged(event, done))?;
        rx.await.map_err(|_| Error::Shutdown)
    }

    /// Get the most recently committed state
    pub fn state(&self) -> State {
        self.snapshot_rx.borrow().state
    }

    /// Get the current channel, if the machine holds one
    pub fn channel(&self) -> Option<C> {
        self.snapshot_rx.borrow().channel.clone()
    }

    /// Register an observer for processed events
    pub fn add_transition_listener(&self, listener: TransitionListener) {
        self.listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(listener);
    }

    fn send(&self, input: FsmInput<C>) -> Result<()> {
        self.event_tx.send(input).map_err(|_| Error::Shutdown)
    }
}
