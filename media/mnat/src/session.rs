//! Per-call NAT-traversal session (SPEC_FULL §4.8): selects one [`MnatDriver`]
//! implementation and enforces invariant 4 ("established fires at most once") as the
//! single authoritative point, even though every driver already self-guards.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use ice::IceAgent;

use crate::ice::IceDriver;
use crate::none::NoneDriver;
use crate::stun::StunDriver;
use crate::turn::{TurnCredentials, TurnDriver};
use crate::{Component, MnatDriver, MnatEvent};

/// Selects which [`MnatDriver`] a [`MnatSession`] wraps for a call's media streams.
pub enum MnatStrategy {
    None {
        rtp: SocketAddr,
        rtcp: SocketAddr,
    },
    Stun {
        server: SocketAddr,
    },
    Turn {
        server: SocketAddr,
        credentials: TurnCredentials,
    },
    Ice {
        agent: IceAgent,
    },
}

pub struct MnatSession {
    driver: Box<dyn MnatDriver>,
    established_delivered: bool,
}

impl MnatSession {
    pub fn new(strategy: MnatStrategy) -> Self {
        let driver: Box<dyn MnatDriver> = match strategy {
            MnatStrategy::None { rtp, rtcp } => Box::new(NoneDriver::new(rtp, rtcp)),
            MnatStrategy::Stun { server } => Box::new(StunDriver::new(server)),
            MnatStrategy::Turn { server, credentials } => Box::new(TurnDriver::new(server, credentials)),
            MnatStrategy::Ice { agent } => Box::new(IceDriver::new(agent)),
        };
        Self {
            driver,
            established_delivered: false,
        }
    }

    pub fn poll(&mut self, now: Instant) {
        self.driver.poll(now);
    }

    /// Pops the next event, swallowing any `Established` after the first one has
    /// already been delivered to the caller.
    pub fn pop_event(&mut self) -> Option<MnatEvent> {
        loop {
            match self.driver.pop_event()? {
                MnatEvent::Established if self.established_delivered => continue,
                MnatEvent::Established => {
                    self.established_delivered = true;
                    return Some(MnatEvent::Established);
                }
                other => return Some(other),
            }
        }
    }

    pub fn timeout(&self, now: Instant) -> Option<Duration> {
        self.driver.timeout(now)
    }

    pub fn receive(&mut self, now: Instant, component: Component, data: &[u8], from: SocketAddr) {
        self.driver.receive(now, component, data, from);
    }

    pub fn external_addr(&self, component: Component) -> Option<SocketAddr> {
        self.driver.external_addr(component)
    }

    pub fn update_peer(&mut self, component: Component, peer: SocketAddr) {
        self.driver.update_peer(component, peer);
    }

    pub fn is_established(&self) -> bool {
        self.established_delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn established_is_delivered_exactly_once_through_the_session() {
        let mut session = MnatSession::new(MnatStrategy::None {
            rtp: "127.0.0.1:10000".parse().unwrap(),
            rtcp: "127.0.0.1:10001".parse().unwrap(),
        });
        let now = Instant::now();
        session.poll(now);
        session.poll(now);

        let mut established_count = 0;
        while let Some(event) = session.pop_event() {
            if matches!(event, MnatEvent::Established) {
                established_count += 1;
            }
        }
        assert_eq!(established_count, 1);
        assert!(session.is_established());
    }
}
