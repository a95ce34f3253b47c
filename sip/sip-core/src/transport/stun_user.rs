use super::{TpHandle, Transports};
use crate::{Result, StunError};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::time::Duration;
use stun_types::attributes::{MappedAddress, Software, XorMappedAddress};
use stun_types::{Class, Message, MessageBuilder, Method, TransactionId};
use tokio::sync::oneshot;

const RESPONSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Matches STUN responses arriving on a SIP transport back to the request that sent
/// them. `ezk-stun`'s `StunEndpoint` filled this role in the corpus but its source was
/// not part of this retrieval; `Transports::receive_stun` dispatches here instead of
/// to that crate (see DESIGN.md). Kept as a linear scan rather than a hash map since
/// `TransactionId`'s `Hash` impl isn't visible from outside `stun-types` in this
/// retrieval, only `PartialEq`; the signaling path only ever has a handful of public
/// address lookups in flight at once.
#[derive(Default)]
pub(crate) struct SignalingStunClient {
    pending: Mutex<Vec<(TransactionId, oneshot::Sender<Message>)>>,
}

impl SignalingStunClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    async fn send_request(
        &self,
        bytes: &[u8],
        tsx_id: TransactionId,
        target: SocketAddr,
        transport: &TpHandle,
    ) -> Result<Option<Message>, StunError> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().push((tsx_id, tx));

        let send_result = transport.send(bytes, target).await;
        if let Err(e) = send_result {
            self.pending.lock().retain(|(id, _)| *id != tsx_id);
            return Err(StunError::Io(e));
        }

        match tokio::time::timeout(RESPONSE_TIMEOUT, rx).await {
            Ok(Ok(message)) => Ok(Some(message)),
            _ => {
                self.pending.lock().retain(|(id, _)| *id != tsx_id);
                Ok(None)
            }
        }
    }

    /// Routes an incoming STUN message to the pending request it answers, if any.
    /// Messages outside of a tracked transaction are silently dropped.
    pub(crate) async fn receive(&self, message: Message) {
        let tsx_id = message.transaction_id();
        let mut pending = self.pending.lock();
        if let Some(pos) = pending.iter().position(|(id, _)| *id == tsx_id) {
            let (_, tx) = pending.remove(pos);
            let _ = tx.send(message);
        }
    }
}

impl Transports {
    pub async fn discover_public_address(
        &self,
        stun_server: SocketAddr,
        transport: &TpHandle,
    ) -> Result<SocketAddr, StunError> {
        if transport.reliable() {
            return Ok(transport.sent_by());
        }

        let tsx_id = TransactionId::random();

        let mut msg = MessageBuilder::new(Class::Request, Method::Binding, tsx_id);
        msg.add_attr(Software::new("ezk"));
        let bytes = msg.finish();

        let mut response = self
            .stun
            .send_request(&bytes, tsx_id, stun_server, transport)
            .await?
            .ok_or(StunError::RequestTimedOut)?;

        if let Some(addr) = response.attribute::<XorMappedAddress>() {
            addr.map(|addr| addr.0)
                .map_err(StunError::MalformedResponse)
        } else if let Some(addr) = response.attribute::<MappedAddress>() {
            addr.map(|addr| addr.0)
                .map_err(StunError::MalformedResponse)
        } else {
            Err(StunError::InvalidResponse)
        }
    }
}
