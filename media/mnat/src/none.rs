//! Strategy NONE (SPEC_FULL §4.8): no-op, local socket addresses used verbatim.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::{Component, MnatDriver, MnatEvent};

pub struct NoneDriver {
    rtp: SocketAddr,
    rtcp: SocketAddr,
    events: VecDeque<MnatEvent>,
    established_fired: bool,
}

impl NoneDriver {
    pub fn new(rtp: SocketAddr, rtcp: SocketAddr) -> Self {
        Self {
            rtp,
            rtcp,
            events: VecDeque::new(),
            established_fired: false,
        }
    }
}

impl MnatDriver for NoneDriver {
    fn poll(&mut self, _now: Instant) {
        if !self.established_fired {
            self.established_fired = true;
            self.events.push_back(MnatEvent::Established);
        }
    }

    fn pop_event(&mut self) -> Option<MnatEvent> {
        self.events.pop_front()
    }

    fn timeout(&self, _now: Instant) -> Option<Duration> {
        None
    }

    fn receive(&mut self, _now: Instant, _component: Component, _data: &[u8], _from: SocketAddr) {}

    fn external_addr(&self, component: Component) -> Option<SocketAddr> {
        Some(match component {
            Component::Rtp => self.rtp,
            Component::Rtcp => self.rtcp,
        })
    }

    fn update_peer(&mut self, _component: Component, _peer: SocketAddr) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn established_fires_exactly_once() {
        let mut driver = NoneDriver::new("127.0.0.1:10000".parse().unwrap(), "127.0.0.1:10001".parse().unwrap());
        let now = Instant::now();
        driver.poll(now);
        driver.poll(now);
        let mut count = 0;
        while let Some(event) = driver.pop_event() {
            if matches!(event, MnatEvent::Established) {
                count += 1;
            }
        }
        assert_eq!(count, 1);
    }
}
