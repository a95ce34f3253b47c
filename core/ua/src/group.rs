//! Routes incoming INVITEs to the [`Ua`] whose account matches the request's `To` AOR,
//! and drives serial registration across accounts grouped by `;prio`.
//!
//! The routing half generalizes `sip/sip`'s `ClientLayer`: that layer hardcodes one
//! contact and declines every INVITE unconditionally. Here the same "build an
//! `InboundCall` from the raw request, respond with a failure on construction error"
//! shape is kept, but the contact and the accept/reject decision both come from a real
//! per-account lookup instead of a single hardcoded value.

use std::collections::HashMap;

use async_trait::async_trait;
use event_bus::UaId;
use parking_lot::RwLock;
use sip_core::{Endpoint, IncomingRequest, Layer, MayTake};
use sip_types::Method;
use sip_types::StatusCode;
use sip_types::header::typed::Contact;
use sip_types::uri::SipUri;
use sip_ua::{InboundCall, NoMedia};

use crate::ua::IncomingSender;

struct Route {
    ua: UaId,
    aor: SipUri,
    contact: Contact,
    catchall: bool,
    tx: IncomingSender,
}

/// The `sip_core::Layer` that fans incoming INVITEs out to registered [`Ua`](crate::Ua)s.
///
/// `Endpoint::build` takes layers by value and only ever hands back `&L` afterwards
/// (`Endpoint::layer`), so routes live behind a lock rather than needing `&mut self`:
/// callers add one once the endpoint is already built, via the shared reference the
/// endpoint itself hands back.
pub struct UaGroupLayer {
    routes: RwLock<Vec<Route>>,
}

impl Default for UaGroupLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl UaGroupLayer {
    pub fn new() -> Self {
        Self {
            routes: RwLock::new(Vec::new()),
        }
    }

    /// Registers a `Ua`'s inbound-call route. Called once per account while the group is
    /// being assembled, before the endpoint starts accepting traffic.
    pub fn add_route(
        &self,
        ua: UaId,
        aor: SipUri,
        contact: Contact,
        catchall: bool,
        tx: IncomingSender,
    ) {
        self.routes.write().push(Route {
            ua,
            aor,
            contact,
            catchall,
            tx,
        });
    }

    fn find_route(&self, to: &SipUri) -> Option<Contact> {
        let routes = self.routes.read();
        routes
            .iter()
            .find(|route| route.aor.compare(to))
            .or_else(|| routes.iter().find(|route| route.catchall))
            .map(|route| route.contact.clone())
    }

    fn send_to_route(&self, to: &SipUri, pair: (InboundCall<NoMedia>, String)) -> Result<(), ()> {
        let routes = self.routes.read();
        let route = routes
            .iter()
            .find(|route| route.aor.compare(to))
            .or_else(|| routes.iter().find(|route| route.catchall))
            .ok_or(())?;
        route.tx.send(pair).map_err(|_| {
            log::warn!("ua {:?} is no longer listening for incoming calls", route.ua);
        })
    }
}

#[async_trait]
impl Layer for UaGroupLayer {
    fn name(&self) -> &'static str {
        "ua-group"
    }

    async fn receive(&self, endpoint: &Endpoint, request: MayTake<'_, IncomingRequest>) {
        if request.line.method != Method::INVITE {
            return;
        }

        let to = request.base_headers.to.uri.clone();
        let from = request.base_headers.from.uri.to_string();

        let Some(contact) = self.find_route(&to) else {
            let mut invite = request.take();
            let response = endpoint.create_response(&invite, StatusCode::NOT_FOUND, None);

            if let Err(e) = endpoint
                .create_server_inv_tsx(&mut invite)
                .respond_failure(response)
                .await
            {
                log::warn!("failed to respond with NOT_FOUND to unrouted INVITE: {e}");
            }

            return;
        };

        let invite = request.take();

        let inbound =
            match InboundCall::<NoMedia>::from_invite(endpoint.clone(), invite, contact) {
                Ok(inbound) => inbound,
                Err(err) => {
                    let (mut invite, e) = *err;
                    log::warn!("failed to build inbound call from INVITE: {e}");

                    let response = endpoint.create_response(&invite, StatusCode::BAD_REQUEST, None);

                    if let Err(e) = endpoint
                        .create_server_inv_tsx(&mut invite)
                        .respond_failure(response)
                        .await
                    {
                        log::warn!("failed to respond with BAD_REQUEST to incoming INVITE: {e}");
                    }

                    return;
                }
            };

        let _ = self.send_to_route(&to, (inbound, from));
    }
}

/// Registration priority tiers, lowest first: accounts with the same `;prio` register
/// together, and the group only moves to the next tier once every account in the
/// current one has failed to register.
pub fn priority_tiers<'a>(
    accounts: impl IntoIterator<Item = (UaId, &'a crate::account::Account)>,
) -> Vec<Vec<UaId>> {
    let mut by_prio: HashMap<u32, Vec<UaId>> = HashMap::new();
    for (id, account) in accounts {
        by_prio.entry(account.prio).or_default().push(id);
    }

    let mut prios: Vec<u32> = by_prio.keys().copied().collect();
    prios.sort_unstable();
    prios.into_iter().map(|p| by_prio.remove(&p).unwrap()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;

    #[test]
    fn groups_accounts_by_priority_ascending() {
        let a0 = Account::parse("sip:a@example.com;prio=1").unwrap();
        let b0 = Account::parse("sip:b@example.com;prio=0").unwrap();
        let c0 = Account::parse("sip:c@example.com;prio=1").unwrap();

        let tiers = priority_tiers([
            (UaId(0), &a0),
            (UaId(1), &b0),
            (UaId(2), &c0),
        ]);

        assert_eq!(tiers, vec![vec![UaId(1)], vec![UaId(0), UaId(2)]]);
    }
}
