//! Event deferral queue (the shelf)

use std::collections::VecDeque;

use crate::transport::Channel;

use super::state::Event;

/// FIFO buffer for events that arrived while the machine could not process
/// them yet
///
/// Drained in original arrival order whenever the machine leaves a shelving
/// state; replayed events are processed before any new external event is
/// accepted.
#[derive(Debug)]
pub(crate) struct Shelf<C: Channel> {
    events: VecDeque<Event<C>>,
}

impl<C: Channel> Shelf<C> {
    pub(crate) fn new() -> Self {
        Self {
            events: VecDeque::new(),
        }
    }

    /// Defer an event, keeping its caller handle (if any) alive
    pub(crate) fn push(&mut self, event: Event<C>) {
        self.events.push_back(event);
    }

    /// Take every deferred event, leaving the shelf empty
    pub(crate) fn take_all(&mut self) -> VecDeque<Event<C>> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsm::state::EventKind;
    use crate::testing::mocks::MockChannel;

    #[test]
    fn test_take_all_preserves_arrival_order() {
        let mut shelf: Shelf<MockChannel> = Shelf::new();
        shelf.push(Event::ChannelInactive);
        shelf.push(Event::ChannelIdle);
        shelf.push(Event::DisconnectSuccess);
        assert_eq!(shelf.len(), 3);

        let drained: Vec<EventKind> = shelf.take_all().iter().map(Event::kind).collect();
        assert_eq!(
            drained,
            vec![
                EventKind::ChannelInactive,
                EventKind::ChannelIdle,
                EventKind::DisconnectSuccess,
            ]
        );
        assert!(shelf.is_empty());
    }
}
