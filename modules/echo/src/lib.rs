//! Multi-call echo module.
//!
//! Ported from the upstream `echo` module (see `module_init`/`module_close` and the
//! per-call `session` bookkeeping it built around `UA_EVENT_CALL_INCOMING`). The
//! original bridges each accepted call's own audio back to itself; the event bus here
//! only ever carries observations, not a media handle to splice two streams together,
//! so this module keeps the session-tracking and logging half of the original and
//! leaves the actual loopback to whatever owns the `Ua`/`Call` (see `core/ua::Ua`,
//! which is where an auto-answering account would live instead).

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::{Rc, Weak};

use event_bus::{CallId, Event, EventBus, EventSink};
use registry::{ModuleCategory, ModuleDescriptor};

/// Tracks every call this module has seen since it was installed.
pub struct EchoModule {
    sessions: RefCell<HashSet<CallId>>,
}

impl EchoModule {
    /// Subscribes to `bus` and returns the handle the caller must keep alive for the
    /// module to keep receiving events -- dropping it unsubscribes for free.
    pub fn install(bus: &EventBus) -> Rc<Self> {
        let module = Rc::new(Self {
            sessions: RefCell::new(HashSet::new()),
        });
        bus.subscribe(Rc::downgrade(&module) as Weak<dyn EventSink>);
        module
    }
}

impl EventSink for EchoModule {
    fn handle(&self, event: &Event) {
        match event {
            Event::CallIncoming { call, from, .. } => {
                log::info!("echo: CALL_INCOMING: peer={from} call={call:?}");
                self.sessions.borrow_mut().insert(*call);
            }
            Event::CallClosed { call, reason } => {
                if self.sessions.borrow_mut().remove(call) {
                    log::debug!("echo: CALL_CLOSED: {reason:?}");
                }
            }
            Event::DtmfPressed { call, digit } => {
                if self.sessions.borrow().contains(call) {
                    log::debug!("echo: relaying DTMF event: key = '{digit}'");
                }
            }
            _ => {}
        }
    }
}

fn init(_registry: &mut registry::Registry) -> Result<(), registry::ModuleError> {
    log::debug!("echo: module loaded");
    Ok(())
}

fn close(_registry: &mut registry::Registry) {
    log::debug!("echo: module closing..");
}

/// Registry bookkeeping entry; actual event subscription happens via [`EchoModule::install`].
pub fn descriptor() -> ModuleDescriptor {
    ModuleDescriptor {
        name: "echo",
        category: ModuleCategory::Application,
        init,
        close,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_and_drops_sessions() {
        let bus = EventBus::new();
        let module = EchoModule::install(&bus);

        bus.publish(Event::CallIncoming {
            ua: event_bus::UaId(0),
            call: CallId(1),
            from: "sip:alice@example.com".into(),
        });
        assert!(module.sessions.borrow().contains(&CallId(1)));

        bus.publish(Event::CallClosed {
            call: CallId(1),
            reason: event_bus::CloseReason::Bye,
        });
        assert!(!module.sessions.borrow().contains(&CallId(1)));
    }
}
