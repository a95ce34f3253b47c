//! Strategy ICE (SPEC_FULL §4.8): thin adapter from `media/ice`'s `IceAgent` onto the
//! shared [`MnatDriver`] shape. All gathering/connectivity-check/nomination logic stays
//! in `IceAgent`; this module only translates event and call shapes.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use ice::{IceAgent, IceConnectionState, IceEvent, ReceivedPkt};

use crate::{Component, MnatDriver, MnatEvent};

pub struct IceDriver {
    agent: IceAgent,
    established_fired: bool,
}

impl IceDriver {
    /// Wraps an already-configured agent: host candidates, STUN servers, and (once the
    /// SDP answer is known) remote credentials/candidates via `IceAgent::set_remote_data`
    /// are the caller's responsibility, since that information doesn't fit the single
    /// peer-address shape of [`MnatDriver::update_peer`].
    pub fn new(agent: IceAgent) -> Self {
        Self {
            agent,
            established_fired: false,
        }
    }

    pub fn agent(&self) -> &IceAgent {
        &self.agent
    }

    pub fn agent_mut(&mut self) -> &mut IceAgent {
        &mut self.agent
    }
}

impl MnatDriver for IceDriver {
    fn poll(&mut self, now: Instant) {
        self.agent.poll(now);
    }

    fn pop_event(&mut self) -> Option<MnatEvent> {
        while let Some(event) = self.agent.pop_event() {
            match event {
                IceEvent::SendData {
                    component, data, target, ..
                } => {
                    return Some(MnatEvent::SendData {
                        component: component.into(),
                        data,
                        target,
                    });
                }
                IceEvent::ConnectionStateChanged {
                    new: IceConnectionState::Connected,
                    ..
                } => {
                    if !self.established_fired {
                        self.established_fired = true;
                        return Some(MnatEvent::Established);
                    }
                }
                IceEvent::ConnectionStateChanged { .. } | IceEvent::GatheringStateChanged { .. } | IceEvent::DiscoveredAddr { .. } => {
                    continue;
                }
            }
        }
        None
    }

    fn timeout(&self, now: Instant) -> Option<Duration> {
        self.agent.timeout(now)
    }

    fn receive(&mut self, _now: Instant, component: Component, data: &[u8], from: SocketAddr) {
        // `destination` is only used by the agent to pick a response source address;
        // since the socket layer lives outside this driver, reuse `from` as a
        // placeholder dual-purpose address when the real local address isn't known here.
        self.agent.receive(ReceivedPkt {
            data: data.to_vec(),
            source: from,
            destination: from,
            component: component.into(),
        });
    }

    fn external_addr(&self, component: Component) -> Option<SocketAddr> {
        self.agent.discovered_addr(component.into()).map(|(_, target)| target)
    }

    fn update_peer(&mut self, _component: Component, _peer: SocketAddr) {
        // No-op: remote credentials/candidates for ICE arrive as a batch from the SDP
        // answer via `IceAgent::set_remote_data`, called directly on the wrapped agent
        // before this driver starts polling.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ice::IceCredentials;

    #[test]
    fn fresh_driver_has_no_external_addr_yet() {
        let agent = IceAgent::new_for_offer(IceCredentials::random(), true, false);
        let driver = IceDriver::new(agent);
        assert_eq!(driver.external_addr(Component::Rtp), None);
    }
}
