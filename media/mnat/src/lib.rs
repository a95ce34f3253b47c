//! Media NAT-traversal strategies (component C8).
//!
//! All four strategies share one sans-IO shape — `poll`/`pop_event`/`timeout`/
//! `receive` — grounded directly in `media/ice`'s `IceAgent` (see its `poll`/
//! `pop_event`/`timeout`/`receive` methods) and, for the STUN binding lifecycle
//! specifically, in `media/ice/src/stun.rs`'s internal `StunServerBinding`. NONE/STUN/
//! TURN are authored fresh against this shape (the corpus has no standalone STUN/TURN
//! client); ICE wraps the existing `IceAgent` unchanged.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use thiserror::Error;

pub mod ice;
pub mod none;
pub mod session;
pub mod stun;
pub mod turn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Rtp,
    Rtcp,
}

impl From<Component> for ::ice::Component {
    fn from(c: Component) -> Self {
        match c {
            Component::Rtp => ::ice::Component::Rtp,
            Component::Rtcp => ::ice::Component::Rtcp,
        }
    }
}

impl From<::ice::Component> for Component {
    fn from(c: ::ice::Component) -> Self {
        match c {
            ::ice::Component::Rtp => Component::Rtp,
            ::ice::Component::Rtcp => Component::Rtcp,
        }
    }
}

#[derive(Debug, Error)]
pub enum MnatError {
    #[error("media NAT gather timed out")]
    Timeout,
    #[error("STUN/TURN server did not respond")]
    ServerUnreachable,
    #[error("TURN authentication failed")]
    AuthFailed,
}

/// Events emitted by a driver. `Established` fires **at most once** per session
/// (SPEC_FULL §8 invariant 4); the session wrapper in [`session`] enforces this even
/// if an individual driver were to emit it twice.
#[derive(Debug)]
pub enum MnatEvent {
    SendData {
        component: Component,
        data: Vec<u8>,
        target: SocketAddr,
    },
    /// Every RTP/RTCP entry now has an external address written into its SDP media.
    Established,
    Failed(MnatError),
}

/// Uniform capability implemented by every strategy driver.
pub trait MnatDriver: Send {
    fn poll(&mut self, now: Instant);
    fn pop_event(&mut self) -> Option<MnatEvent>;
    fn timeout(&self, now: Instant) -> Option<Duration>;
    fn receive(&mut self, now: Instant, component: Component, data: &[u8], from: SocketAddr);

    /// The address this driver has learned for `component`, if any (mapped, relayed,
    /// or simply the local socket address for the NONE strategy).
    fn external_addr(&self, component: Component) -> Option<SocketAddr>;

    /// Called once the remote SDP answer/offer's peer addresses are known. TURN uses
    /// this to install a channel binding; ICE uses it to set remote candidates; STUN
    /// and NONE ignore it.
    fn update_peer(&mut self, component: Component, peer: SocketAddr);
}
