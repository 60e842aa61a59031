//! Deterministic test doubles for the transport and scheduler seams

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::error::Result;
use crate::fsm::{ConnectionFsm, State};
use crate::scheduler::{Cancellable, Scheduler};
use crate::transport::{Channel, Transport};

/// In-memory channel with an id and an open flag
#[derive(Debug, Clone)]
pub struct MockChannel {
    id: u32,
    open: Arc<AtomicBool>,
}

impl MockChannel {
    /// Create an open channel with the given id
    pub fn new(id: u32) -> Self {
        Self {
            id,
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Get this channel's id
    pub fn id(&self) -> u32 {
        self.id
    }
}

#[async_trait]
impl Channel for MockChannel {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

/// Transport whose outcomes are scripted ahead of time
///
/// Unscripted connect calls succeed with sequentially numbered channels.
/// Optional semaphore gates let a test hold a connect or disconnect open
/// until it decides to release it.
pub struct ScriptedTransport {
    connect_results: Mutex<VecDeque<Result<MockChannel>>>,
    keep_alive_results: Mutex<VecDeque<Result<()>>>,
    next_id: AtomicU32,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    keep_alives: AtomicUsize,
    connect_gate: Option<Arc<Semaphore>>,
    disconnect_gate: Option<Arc<Semaphore>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            connect_results: Mutex::new(VecDeque::new()),
            keep_alive_results: Mutex::new(VecDeque::new()),
            next_id: AtomicU32::new(1),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            keep_alives: AtomicUsize::new(0),
            connect_gate: None,
            disconnect_gate: None,
        }
    }

    /// Block connect calls on the given semaphore
    pub fn with_connect_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.connect_gate = Some(gate);
        self
    }

    /// Block disconnect calls on the given semaphore
    pub fn with_disconnect_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.disconnect_gate = Some(gate);
        self
    }

    /// Queue the outcome of the next connect call
    pub fn push_connect(&self, result: Result<MockChannel>) {
        self.connect_results.lock().unwrap().push_back(result);
    }

    /// Queue the outcome of the next keep-alive call
    pub fn push_keep_alive(&self, result: Result<()>) {
        self.keep_alive_results.lock().unwrap().push_back(result);
    }

    /// Number of connect calls made so far
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Number of disconnect calls made so far
    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Number of keep-alive calls made so far
    pub fn keep_alives(&self) -> usize {
        self.keep_alives.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport<MockChannel> for ScriptedTransport {
    async fn connect(&self) -> Result<MockChannel> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.connect_gate {
            gate.acquire().await.unwrap().forget();
        }
        let scripted = self.connect_results.lock().unwrap().pop_front();
        match scripted {
            Some(result) => result,
            None => Ok(MockChannel::new(self.next_id.fetch_add(1, Ordering::SeqCst))),
        }
    }

    async fn disconnect(&self, _channel: MockChannel) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.disconnect_gate {
            gate.acquire().await.unwrap().forget();
        }
        Ok(())
    }

    async fn keep_alive(&self, _channel: MockChannel) -> Result<()> {
        self.keep_alives.fetch_add(1, Ordering::SeqCst);
        let scripted = self.keep_alive_results.lock().unwrap().pop_front();
        scripted.unwrap_or(Ok(()))
    }
}

struct ManualTimer {
    delay: u64,
    callback: Option<Box<dyn FnOnce() + Send>>,
}

/// Scheduler driven explicitly by the test instead of the clock
///
/// Every armed delay is recorded, even after the timer fires, so tests can
/// assert on the whole backoff progression.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    timers: Arc<Mutex<Vec<ManualTimer>>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays of every timer ever armed, in whole seconds, in arming order
    pub fn armed_delays(&self) -> Vec<u64> {
        self.timers.lock().unwrap().iter().map(|t| t.delay).collect()
    }

    /// Number of timers armed but not yet fired or cancelled
    pub fn pending(&self) -> usize {
        self.timers
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.callback.is_some())
            .count()
    }

    /// Fire the oldest pending timer; false if none is pending
    pub fn fire_next(&self) -> bool {
        let callback = {
            let mut timers = self.timers.lock().unwrap();
            timers.iter_mut().find_map(|t| t.callback.take())
        };
        match callback {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, callback: Box<dyn FnOnce() + Send>) -> Box<dyn Cancellable> {
        let mut timers = self.timers.lock().unwrap();
        let index = timers.len();
        timers.push(ManualTimer {
            delay: delay.as_secs(),
            callback: Some(callback),
        });
        Box::new(ManualCancellable {
            timers: self.timers.clone(),
            index,
        })
    }
}

struct ManualCancellable {
    timers: Arc<Mutex<Vec<ManualTimer>>>,
    index: usize,
}

impl Cancellable for ManualCancellable {
    fn cancel(&mut self) -> bool {
        let mut timers = self.timers.lock().unwrap();
        let timer = &mut timers[self.index];
        timer.callback.take().is_some()
    }
}

/// Poll until the machine reaches `expected`, panicking after a bounded
/// number of scheduler yields
pub async fn wait_for_state(fsm: &ConnectionFsm<MockChannel>, expected: State) {
    for _ in 0..1000 {
        if fsm.state() == expected {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!(
        "state never reached {} (currently {})",
        expected,
        fsm.state()
    );
}
