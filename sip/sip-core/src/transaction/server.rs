use super::consts::T1;
use super::TsxRegistration;
use crate::transport::OutgoingResponse;
use crate::{IncomingRequest, Result};
use sip_types::{CodeKind, Method};
use std::time::Instant;
use tokio::time::timeout_at;

/// Server non-INVITE transaction. Used to respond to the incoming request.
#[derive(Debug)]
pub struct ServerTsx {
    registration: TsxRegistration,
}

impl ServerTsx {
    /// Internal: Used by [`Endpoint::create_server_tsx`](crate::Endpoint::create_server_tsx)
    pub(crate) fn new(request: &mut IncomingRequest) -> Self {
        assert!(
            !matches!(request.line.method, Method::INVITE | Method::ACK),
            "tried to create server transaction from {} request",
            request.line.method
        );

        Self {
            registration: request.take_tsx_registration(),
        }
    }

    /// Respond with a provisional response (1XX)
    ///
    /// # Panics
    /// Panics if the given response is not a provisional response
    pub async fn respond_provisional(&mut self, response: &mut OutgoingResponse) -> Result<()> {
        assert_eq!(response.msg.line.code.kind(), CodeKind::Provisional);

        self.registration
            .endpoint
            .send_outgoing_response(response)
            .await?;

        Ok(())
    }

    /// Respond with the final response to the request
    ///
    /// # Panics
    /// Panics if the given response is a provisional response
    pub async fn respond(mut self, mut response: OutgoingResponse) -> Result<()> {
        assert_ne!(response.msg.line.code.kind(), CodeKind::Provisional);

        self.registration
            .endpoint
            .send_outgoing_response(&mut response)
            .await?;

        if response.parts.transport.reliable() {
            return Ok(());
        }

        let abandon = Instant::now() + T1 * 64;

        tokio::spawn(async move {
            while let Ok(msg) = timeout_at(abandon.into(), self.registration.receive()).await {
                if msg.line.is_request() {
                    if let Err(e) = self
                        .registration
                        .endpoint
                        .send_outgoing_response(&mut response)
                        .await
                    {
                        log::warn!("Failed to retransmit message, {}", e);
                    }
                }
            }
        });

        Ok(())
    }
}
