//! Account parsing, per-account registration lifecycle, and multi-account call
//! routing: the layer that turns a list of accounts-file lines into a set of live,
//! independently-registered identities sharing one SIP endpoint.

mod account;
mod backoff;
mod group;
mod ua;

pub use account::{Account, AccountParseError, AnswerMode, parse_accounts};
pub use group::{UaGroupLayer, priority_tiers};
pub use ua::{Ua, UaError, UaEvent};

use std::net::IpAddr;
use std::sync::Arc;

use event_bus::{EventBus, UaId};
use registry::Registry;
use sip_core::Endpoint;

use ua::IncomingSender;

/// Builds a [`Ua`] for `account` and wires its inbound-call route into `layer`.
///
/// `layer` is the same [`UaGroupLayer`] already installed on `endpoint` (fetch it back
/// out with `endpoint.layer::<UaGroupLayer>()` after `EndpointBuilder::build`); callers
/// assemble a whole group by calling this once per parsed account, allocating `id`
/// themselves, e.g. from an incrementing counter.
pub async fn spawn_ua(
    id: UaId,
    account: Account,
    endpoint: Endpoint,
    registry: Arc<Registry>,
    bus: Arc<EventBus>,
    local_addr: IpAddr,
    catchall: bool,
    layer: &UaGroupLayer,
) -> Result<Ua, sip_core::Error> {
    let (mut ua, tx): (Ua, IncomingSender) =
        ua::Ua::new(id, account, endpoint, registry, bus, local_addr).await?;
    ua.set_catchall(catchall);

    layer.add_route(
        ua.id(),
        ua.account().aor.clone(),
        ua.contact().clone(),
        catchall,
        tx,
    );

    Ok(ua)
}
