//! Process-wide event bus (component C12).
//!
//! A single-threaded publisher with an unbounded, registration-ordered list of
//! handlers, run on the main event-loop thread alongside timers, sockets, and SIP
//! transaction processing (SPEC_FULL §4.11/§5). Handlers are held weakly: a module
//! that drops its subscriber is unsubscribed for free, and explicit unsubscription is
//! idempotent. Dispatch snapshots the handler list before invoking anyone, so a handler
//! that subscribes or unsubscribes during dispatch never reorders or skips handlers
//! already in this round.

use std::cell::RefCell;
use std::fmt;
use std::rc::Weak;

/// Reason a call closed, as surfaced to the event bus (SPEC_FULL §4.9/§7.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    Bye,
    Rejected { code: u16, reason: String },
    Cancelled,
    MediaError(String),
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UaId(pub u64);

/// Events emitted onto the bus (SPEC_FULL §4.10/§4.9).
#[derive(Debug, Clone)]
pub enum Event {
    RegisterOk { ua: UaId },
    RegisterFail { ua: UaId, reason: String },
    Unregistering { ua: UaId },
    ShuttingDown,
    CallIncoming { ua: UaId, call: CallId, from: String },
    CallEstablished { call: CallId },
    CallClosed { call: CallId, reason: CloseReason },
    RemoteSdp { call: CallId },
    VuTx { call: CallId, level: f32 },
    VuRx { call: CallId, level: f32 },
    DtmfPressed { call: CallId, digit: char },
    DtmfReleased { call: CallId, digit: char },
    ModuleEvent { module: &'static str, message: String },
}

/// Implemented by anything that wants to receive events. Subscribers are registered by
/// [`Weak`] reference, so dropping the `Rc` the bus holds a weak pointer into
/// unsubscribes automatically.
pub trait EventSink {
    fn handle(&self, event: &Event);
}

pub type SubscriptionId = u64;

struct Slot {
    id: SubscriptionId,
    sink: Weak<dyn EventSink>,
}

pub struct EventBus {
    slots: RefCell<Vec<Slot>>,
    next_id: RefCell<SubscriptionId>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.slots.borrow().len())
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            slots: RefCell::new(Vec::new()),
            next_id: RefCell::new(0),
        }
    }

    /// Registers `sink` and returns a handle usable with [`EventBus::unsubscribe`].
    /// Registration order determines dispatch order.
    pub fn subscribe(&self, sink: Weak<dyn EventSink>) -> SubscriptionId {
        let mut next_id = self.next_id.borrow_mut();
        let id = *next_id;
        *next_id += 1;
        self.slots.borrow_mut().push(Slot { id, sink });
        id
    }

    /// Removes a subscription. A no-op if `id` was already removed or never existed.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.slots.borrow_mut().retain(|slot| slot.id != id);
    }

    /// Dispatches `event` to every live subscriber, in registration order, on a
    /// snapshot of the subscriber list taken before the first handler runs.
    pub fn publish(&self, event: Event) {
        let snapshot: Vec<Weak<dyn EventSink>> =
            self.slots.borrow().iter().map(|slot| slot.sink.clone()).collect();

        for sink in &snapshot {
            if let Some(sink) = sink.upgrade() {
                sink.handle(&event);
            }
        }

        // Opportunistic compaction: drop slots whose sink has been dropped. This is not
        // required for correctness (dispatch already skips dead weaks); it just keeps
        // `slots` from growing unbounded across a long-running process.
        self.slots.borrow_mut().retain(|slot| slot.sink.strong_count() > 0);
    }

    pub fn subscriber_count(&self) -> usize {
        self.slots.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    struct Recorder(RefCell<Vec<&'static str>>);

    impl Recorder {
        fn new() -> Rc<Self> {
            Rc::new(Self(RefCell::new(Vec::new())))
        }
    }

    struct Named(&'static str, Rc<Recorder>);

    impl EventSink for Named {
        fn handle(&self, _event: &Event) {
            self.1.0.borrow_mut().push(self.0);
        }
    }

    #[test]
    fn dispatch_is_registration_ordered() {
        let bus = EventBus::new();
        let recorder = Recorder::new();

        let a = Rc::new(Named("a", recorder.clone()));
        let b = Rc::new(Named("b", recorder.clone()));
        let c = Rc::new(Named("c", recorder.clone()));

        bus.subscribe(Rc::downgrade(&a) as Weak<dyn EventSink>);
        bus.subscribe(Rc::downgrade(&b) as Weak<dyn EventSink>);
        bus.subscribe(Rc::downgrade(&c) as Weak<dyn EventSink>);

        bus.publish(Event::ShuttingDown);

        assert_eq!(*recorder.0.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn dropped_subscriber_is_silently_skipped() {
        let bus = EventBus::new();
        let recorder = Recorder::new();

        let a = Rc::new(Named("a", recorder.clone()));
        bus.subscribe(Rc::downgrade(&a) as Weak<dyn EventSink>);
        drop(a);

        bus.publish(Event::ShuttingDown);
        assert!(recorder.0.borrow().is_empty());
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let bus = EventBus::new();
        let recorder = Recorder::new();
        let a = Rc::new(Named("a", recorder.clone()));
        let id = bus.subscribe(Rc::downgrade(&a) as Weak<dyn EventSink>);

        bus.unsubscribe(id);
        bus.unsubscribe(id);

        bus.publish(Event::ShuttingDown);
        assert!(recorder.0.borrow().is_empty());
    }

    struct Unsubscriber<'a> {
        id: RefCell<Option<SubscriptionId>>,
        bus: &'a EventBus,
        recorder: Rc<Recorder>,
    }

    impl EventSink for Unsubscriber<'_> {
        fn handle(&self, _event: &Event) {
            self.recorder.0.borrow_mut().push("unsub");
            if let Some(id) = self.id.borrow_mut().take() {
                self.bus.unsubscribe(id);
            }
        }
    }

    #[test]
    fn unsubscribing_during_dispatch_does_not_skip_remaining_handlers() {
        let bus = EventBus::new();
        let recorder = Recorder::new();

        let unsub = Rc::new(Unsubscriber {
            id: RefCell::new(None),
            bus: &bus,
            recorder: recorder.clone(),
        });
        let id = bus.subscribe(Rc::downgrade(&unsub) as Weak<dyn EventSink>);
        *unsub.id.borrow_mut() = Some(id);

        let tail = Rc::new(Named("tail", recorder.clone()));
        bus.subscribe(Rc::downgrade(&tail) as Weak<dyn EventSink>);

        bus.publish(Event::ShuttingDown);

        assert_eq!(*recorder.0.borrow(), vec!["unsub", "tail"]);
        assert_eq!(bus.subscriber_count(), 1);
    }
}
