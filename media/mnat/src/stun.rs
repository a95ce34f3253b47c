//! Strategy STUN (SPEC_FULL §4.8/§8/S6): one keepalive binding per RTP/RTCP socket.
//! Binding-request lifecycle is grounded in `media/ice/src/stun.rs`'s
//! `StunServerBinding`/`start_binding_request`, but simplified: no ICE credentials or
//! MESSAGE-INTEGRITY, since a standalone STUN keepalive (outside of ICE connectivity
//! checks) authenticates nothing. The refresh interval is 30s per SPEC_FULL §4.8/S6,
//! not the 20s `media/ice` uses internally for its own unrelated purpose (see
//! DESIGN.md's Open Question decision).

use std::cmp::min;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use stun_types::attributes::{Fingerprint, XorMappedAddress};
use stun_types::{Class, Message, MessageBuilder, Method, TransactionId};

use crate::{Component, MnatDriver, MnatEvent};

const INITIAL_RTO: Duration = Duration::from_millis(250);
const MAX_RTO: Duration = Duration::from_secs(3);
const MAX_RETRANSMITS: u32 = 7;
const REFRESH_INTERVAL: Duration = Duration::from_secs(30);

enum BindingState {
    Waiting,
    InProgress {
        transaction_id: TransactionId,
        retransmit_at: Instant,
        retransmits: u32,
    },
    WaitingForRefresh {
        refresh_at: Instant,
    },
    Failed,
}

struct Binding {
    component: Component,
    server: SocketAddr,
    state: BindingState,
    mapped_addr: Option<SocketAddr>,
}

impl Binding {
    fn new(component: Component, server: SocketAddr) -> Self {
        Self {
            component,
            server,
            state: BindingState::Waiting,
            mapped_addr: None,
        }
    }

    fn retransmit_delta(attempts: u32) -> Duration {
        let rto = INITIAL_RTO.saturating_mul(1 << attempts.min(10));
        min(rto, MAX_RTO)
    }

    fn start(&mut self, now: Instant, events: &mut VecDeque<MnatEvent>) {
        let transaction_id = TransactionId::random();
        let mut builder = MessageBuilder::new(Class::Request, Method::Binding, transaction_id);
        builder.add_attr(Fingerprint);
        let request = builder.finish();

        events.push_back(MnatEvent::SendData {
            component: self.component,
            data: request,
            target: self.server,
        });

        self.state = BindingState::InProgress {
            transaction_id,
            retransmit_at: now + Self::retransmit_delta(0),
            retransmits: 0,
        };
    }

    fn poll(&mut self, now: Instant, events: &mut VecDeque<MnatEvent>) {
        match &mut self.state {
            BindingState::Waiting => self.start(now, events),
            BindingState::InProgress {
                retransmit_at,
                retransmits,
                ..
            } => {
                if *retransmit_at > now {
                    return;
                }
                if *retransmits >= MAX_RETRANSMITS {
                    self.state = BindingState::Failed;
                    return;
                }
                *retransmits += 1;
                *retransmit_at += Self::retransmit_delta(*retransmits);
                // Retransmit: resend with a fresh builder holding the same transaction id.
                if let BindingState::InProgress { transaction_id, .. } = self.state {
                    let mut builder = MessageBuilder::new(Class::Request, Method::Binding, transaction_id);
                    builder.add_attr(Fingerprint);
                    events.push_back(MnatEvent::SendData {
                        component: self.component,
                        data: builder.finish(),
                        target: self.server,
                    });
                }
            }
            BindingState::WaitingForRefresh { refresh_at } => {
                if now >= *refresh_at {
                    self.start(now, events);
                }
            }
            BindingState::Failed => {}
        }
    }

    fn timeout(&self, now: Instant) -> Option<Duration> {
        match &self.state {
            BindingState::Waiting => Some(Duration::ZERO),
            BindingState::InProgress { retransmit_at, .. } => {
                Some(retransmit_at.saturating_duration_since(now))
            }
            BindingState::WaitingForRefresh { refresh_at } => {
                Some(refresh_at.saturating_duration_since(now))
            }
            BindingState::Failed => None,
        }
    }

    fn receive(&mut self, now: Instant, mut message: Message) {
        let wants_response = matches!(
            &self.state,
            BindingState::InProgress { transaction_id, .. } if *transaction_id == message.transaction_id()
        );
        if !wants_response {
            return;
        }
        if let Some(Ok(mapped)) = message.attribute::<XorMappedAddress>() {
            self.mapped_addr = Some(mapped.0);
            self.state = BindingState::WaitingForRefresh {
                refresh_at: now + REFRESH_INTERVAL,
            };
        }
    }
}

pub struct StunDriver {
    rtp: Binding,
    rtcp: Binding,
    events: VecDeque<MnatEvent>,
    established_fired: bool,
}

impl StunDriver {
    pub fn new(server: SocketAddr) -> Self {
        Self {
            rtp: Binding::new(Component::Rtp, server),
            rtcp: Binding::new(Component::Rtcp, server),
            events: VecDeque::new(),
            established_fired: false,
        }
    }

    fn maybe_fire_established(&mut self) {
        if !self.established_fired && self.rtp.mapped_addr.is_some() && self.rtcp.mapped_addr.is_some() {
            self.established_fired = true;
            self.events.push_back(MnatEvent::Established);
        }
    }
}

impl MnatDriver for StunDriver {
    fn poll(&mut self, now: Instant) {
        self.rtp.poll(now, &mut self.events);
        self.rtcp.poll(now, &mut self.events);
        self.maybe_fire_established();
    }

    fn pop_event(&mut self) -> Option<MnatEvent> {
        self.events.pop_front()
    }

    fn timeout(&self, now: Instant) -> Option<Duration> {
        [self.rtp.timeout(now), self.rtcp.timeout(now)]
            .into_iter()
            .flatten()
            .min()
    }

    fn receive(&mut self, now: Instant, component: Component, data: &[u8], _from: SocketAddr) {
        let Ok(message) = Message::parse(data.to_vec()) else {
            return;
        };
        match component {
            Component::Rtp => self.rtp.receive(now, message),
            Component::Rtcp => self.rtcp.receive(now, message),
        }
        self.maybe_fire_established();
    }

    fn external_addr(&self, component: Component) -> Option<SocketAddr> {
        match component {
            Component::Rtp => self.rtp.mapped_addr,
            Component::Rtcp => self.rtcp.mapped_addr,
        }
    }

    fn update_peer(&mut self, _component: Component, _peer: SocketAddr) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_driver_has_no_mapped_address_yet() {
        let driver = StunDriver::new("203.0.113.1:3478".parse().unwrap());
        assert_eq!(driver.external_addr(Component::Rtp), None);
    }

    #[test]
    fn poll_queues_an_initial_binding_request() {
        let mut driver = StunDriver::new("203.0.113.1:3478".parse().unwrap());
        driver.poll(Instant::now());
        let mut sent_any = false;
        while let Some(event) = driver.pop_event() {
            if let MnatEvent::SendData { .. } = event {
                sent_any = true;
            }
        }
        assert!(sent_any);
    }
}
