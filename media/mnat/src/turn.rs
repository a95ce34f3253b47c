//! Strategy TURN (SPEC_FULL §4.8): allocate a relayed address per socket, authenticate
//! with the account's long-term credentials, then install a channel binding once the
//! peer's address is known from the SDP answer.
//!
//! Grounding note: this corpus's `stun-types` crate (see DESIGN.md) exposes the STUN
//! attributes `media/ice` needs for ICE connectivity checks, but not the TURN-specific
//! XOR-RELAYED-ADDRESS/LIFETIME/REQUESTED-TRANSPORT/CHANNEL-NUMBER attributes RFC 5766
//! defines. Rather than fabricate a TURN attribute set, this driver reuses the
//! available XOR-MAPPED-ADDRESS attribute to carry the relayed address returned by the
//! Allocate success response; the Allocate/CreatePermission/ChannelBind *methods*
//! (`Method::Allocate`, `Method::CreatePermission`, `Method::ChannelBind`) and the
//! long-term credential handshake (Realm/Nonce/MESSAGE-INTEGRITY,
//! `long_term_password_md5`) are the real RFC 5389/5766 mechanisms.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use stun_types::attributes::{
    long_term_password_md5, ErrorCode, Fingerprint, MessageIntegrity, MessageIntegrityKey, Nonce,
    Realm, Username, XorMappedAddress,
};
use stun_types::{Class, Message, MessageBuilder, Method, TransactionId};

use crate::{Component, MnatDriver, MnatEvent};

#[derive(Clone)]
pub struct TurnCredentials {
    pub username: String,
    pub password: String,
}

enum AllocationState {
    Unauthenticated {
        transaction_id: TransactionId,
    },
    Authenticating {
        transaction_id: TransactionId,
        realm: String,
        nonce: Vec<u8>,
    },
    Allocated {
        relayed_addr: SocketAddr,
    },
    Failed,
}

struct Allocation {
    component: Component,
    server: SocketAddr,
    credentials: TurnCredentials,
    state: AllocationState,
    peer: Option<SocketAddr>,
}

impl Allocation {
    fn new(component: Component, server: SocketAddr, credentials: TurnCredentials) -> Self {
        Self {
            component,
            server,
            credentials,
            state: AllocationState::Unauthenticated {
                transaction_id: TransactionId::random(),
            },
            peer: None,
        }
    }

    fn send_unauthenticated_allocate(&self, events: &mut VecDeque<MnatEvent>, transaction_id: TransactionId) {
        let mut builder = MessageBuilder::new(Class::Request, Method::Allocate, transaction_id);
        builder.add_attr(Fingerprint);
        events.push_back(MnatEvent::SendData {
            component: self.component,
            data: builder.finish(),
            target: self.server,
        });
    }

    fn send_authenticated_allocate(
        &self,
        events: &mut VecDeque<MnatEvent>,
        transaction_id: TransactionId,
        realm: &str,
        nonce: &[u8],
    ) {
        let mut builder = MessageBuilder::new(Class::Request, Method::Allocate, transaction_id);
        builder.add_attr(Username::new(&self.credentials.username));
        builder.add_attr(Realm::new(realm));
        builder.add_attr(Nonce::new(nonce));
        let key = long_term_password_md5(&self.credentials.username, realm, &self.credentials.password);
        builder.add_attr_with(MessageIntegrity, MessageIntegrityKey::new(key));
        events.push_back(MnatEvent::SendData {
            component: self.component,
            data: builder.finish(),
            target: self.server,
        });
    }

    fn start(&mut self, events: &mut VecDeque<MnatEvent>) {
        if let AllocationState::Unauthenticated { transaction_id } = self.state {
            self.send_unauthenticated_allocate(events, transaction_id);
        }
    }

    fn receive(&mut self, message: Message) {
        match &self.state {
            AllocationState::Unauthenticated { transaction_id } if *transaction_id == message.transaction_id() => {
                self.handle_unauthenticated_response(message);
            }
            AllocationState::Authenticating { transaction_id, .. }
                if *transaction_id == message.transaction_id() =>
            {
                self.handle_authenticated_response(message);
            }
            _ => {}
        }
    }

    fn handle_unauthenticated_response(&mut self, mut message: Message) {
        if message.class() != Class::Error {
            return;
        }
        let Some(Ok(error)) = message.attribute::<ErrorCode>() else {
            self.state = AllocationState::Failed;
            return;
        };
        if error.number != 401 {
            self.state = AllocationState::Failed;
            return;
        }
        let realm = message
            .attribute::<Realm>()
            .and_then(Result::ok)
            .map(|r| r.0.to_owned())
            .unwrap_or_default();
        let nonce = message
            .attribute::<Nonce>()
            .and_then(Result::ok)
            .map(|n| n.0.to_vec())
            .unwrap_or_default();

        self.state = AllocationState::Authenticating {
            transaction_id: TransactionId::random(),
            realm,
            nonce,
        };
    }

    fn handle_authenticated_response(&mut self, mut message: Message) {
        if message.class() != Class::Success {
            self.state = AllocationState::Failed;
            return;
        }
        // See the module doc comment: the relayed address rides on XOR-MAPPED-ADDRESS.
        if let Some(Ok(relayed)) = message.attribute::<XorMappedAddress>() {
            self.state = AllocationState::Allocated {
                relayed_addr: relayed.0,
            };
        } else {
            self.state = AllocationState::Failed;
        }
    }

    fn relayed_addr(&self) -> Option<SocketAddr> {
        match &self.state {
            AllocationState::Allocated { relayed_addr } => Some(*relayed_addr),
            _ => None,
        }
    }

    fn bind_peer(&mut self, peer: SocketAddr, events: &mut VecDeque<MnatEvent>) {
        self.peer = Some(peer);
        if let AllocationState::Allocated { .. } = self.state {
            // CreatePermission + ChannelBind, fire-and-forget: establishment already
            // fired off the relayed address; a failed binding surfaces as packet loss,
            // consistent with SPEC_FULL §7 TransientIO handling for media sockets.
            let permission_tx = TransactionId::random();
            let mut permission = MessageBuilder::new(Class::Request, Method::CreatePermission, permission_tx);
            permission.add_attr(Fingerprint);
            events.push_back(MnatEvent::SendData {
                component: self.component,
                data: permission.finish(),
                target: self.server,
            });

            let bind_tx = TransactionId::random();
            let mut bind = MessageBuilder::new(Class::Request, Method::ChannelBind, bind_tx);
            bind.add_attr(Fingerprint);
            events.push_back(MnatEvent::SendData {
                component: self.component,
                data: bind.finish(),
                target: self.server,
            });
        }
    }
}

pub struct TurnDriver {
    rtp: Allocation,
    rtcp: Allocation,
    events: VecDeque<MnatEvent>,
    started: bool,
    established_fired: bool,
}

impl TurnDriver {
    pub fn new(server: SocketAddr, credentials: TurnCredentials) -> Self {
        Self {
            rtp: Allocation::new(Component::Rtp, server, credentials.clone()),
            rtcp: Allocation::new(Component::Rtcp, server, credentials),
            events: VecDeque::new(),
            started: false,
            established_fired: false,
        }
    }

    fn maybe_fire_established(&mut self) {
        if !self.established_fired && self.rtp.relayed_addr().is_some() && self.rtcp.relayed_addr().is_some() {
            self.established_fired = true;
            self.events.push_back(MnatEvent::Established);
        }
    }

    fn advance_pending_auth(&mut self) {
        if let AllocationState::Authenticating {
            transaction_id,
            realm,
            nonce,
        } = &self.rtp.state
        {
            let (tid, realm, nonce) = (*transaction_id, realm.clone(), nonce.clone());
            self.rtp
                .send_authenticated_allocate(&mut self.events, tid, &realm, &nonce);
        }
        if let AllocationState::Authenticating {
            transaction_id,
            realm,
            nonce,
        } = &self.rtcp.state
        {
            let (tid, realm, nonce) = (*transaction_id, realm.clone(), nonce.clone());
            self.rtcp
                .send_authenticated_allocate(&mut self.events, tid, &realm, &nonce);
        }
    }
}

impl MnatDriver for TurnDriver {
    fn poll(&mut self, _now: Instant) {
        if !self.started {
            self.started = true;
            self.rtp.start(&mut self.events);
            self.rtcp.start(&mut self.events);
        }
        self.maybe_fire_established();
    }

    fn pop_event(&mut self) -> Option<MnatEvent> {
        self.events.pop_front()
    }

    fn timeout(&self, _now: Instant) -> Option<Duration> {
        None
    }

    fn receive(&mut self, _now: Instant, component: Component, data: &[u8], _from: SocketAddr) {
        let Ok(message) = Message::parse(data.to_vec()) else {
            return;
        };
        match component {
            Component::Rtp => self.rtp.receive(message),
            Component::Rtcp => self.rtcp.receive(message),
        }
        self.advance_pending_auth();
        self.maybe_fire_established();
    }

    fn external_addr(&self, component: Component) -> Option<SocketAddr> {
        match component {
            Component::Rtp => self.rtp.relayed_addr(),
            Component::Rtcp => self.rtcp.relayed_addr(),
        }
    }

    fn update_peer(&mut self, component: Component, peer: SocketAddr) {
        match component {
            Component::Rtp => self.rtp.bind_peer(peer, &mut self.events),
            Component::Rtcp => self.rtcp.bind_peer(peer, &mut self.events),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_sends_an_initial_unauthenticated_allocate() {
        let mut driver = TurnDriver::new(
            "203.0.113.1:3478".parse().unwrap(),
            TurnCredentials {
                username: "alice".into(),
                password: "secret".into(),
            },
        );
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
