use crate::dialog::layer::DialogEntry;
use crate::util::random_sequence_number;
use bytesstr::BytesStr;
use sip_core::transport::{OutgoingResponse, TargetTransportInfo};
use sip_core::{Endpoint, IncomingRequest, Request, Result};
use sip_types::header::typed::{CSeq, CallID, Contact, FromTo, Routing};
use sip_types::header::HeaderError;
use sip_types::{Method, Name, StatusCode};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Mutex;

mod key;
mod layer;

pub use key::DialogKey;
pub use layer::{register_usage, DialogLayer, Usage, UsageGuard};

/// A SIP dialog as established by an INVITE transaction or other dialog-creating request.
///
/// Holds the state required to construct in-dialog requests and responses: the local and
/// peer `From`/`To` bindings, the call's `Call-ID`, the negotiated route set and transport
/// target.
#[derive(Debug)]
pub struct Dialog {
    pub endpoint: Endpoint,

    /// Local CSeq number, increments with every request constructed using this dialog
    local_cseq: AtomicU32,

    /// `From`/`To` header used to construct requests, representing our own side of the dialog
    ///
    /// All dialog code assumes that the tag is set
    pub local_fromto: FromTo,

    /// `From`/`To` header used to construct requests, representing the peer's side of the dialog
    pub peer_fromto: FromTo,

    /// Local Contact header, used to construct requests inside the dialog
    pub local_contact: Contact,

    /// Remote Contact header, used to construct requests inside the dialog
    /// as it is the target URI.
    pub peer_contact: Contact,

    /// CallID of the Dialog, which is part of the dialog key
    pub call_id: CallID,

    /// Dialog's Route set, must be set with every request
    pub route_set: Vec<Routing>,

    /// Was a secure transport used to construct this dialog.
    /// Requires all future requests to also use secure transports.
    pub secure: bool,

    /// Transport the dialog currently targets its requests at
    pub target_tp_info: Mutex<TargetTransportInfo>,
}

impl Dialog {
    /// Create a dialog from an incoming (possibly early) INVITE request, using `contact`
    /// as our own local contact.
    pub fn new_server(
        endpoint: Endpoint,
        invite: &IncomingRequest,
        contact: Contact,
    ) -> Result<Self, HeaderError> {
        let peer_contact = invite.headers.get_named::<Contact>()?;
        let route_set = invite.headers.get(Name::RECORD_ROUTE).unwrap_or_default();

        // Requests inside the dialog are sent from our point of view: our side of the
        // dialog is the peer of the incoming request and vice versa.
        let local_fromto = FromTo::new(
            invite.base_headers.to.uri.clone(),
            Some(crate::util::random_string()),
        );
        let peer_fromto = FromTo::new(
            invite.base_headers.from.uri.clone(),
            invite.base_headers.from.tag.clone(),
        );

        let dialog = Self {
            endpoint,
            local_cseq: AtomicU32::new(random_sequence_number()),
            local_fromto,
            peer_fromto,
            local_contact: contact,
            peer_contact,
            call_id: invite.base_headers.call_id.clone(),
            route_set,
            secure: invite.line.uri.sips,
            target_tp_info: Mutex::new(TargetTransportInfo {
                via_host_port: None,
                transport: Some((invite.tp_info.transport.clone(), invite.tp_info.source)),
            }),
        };

        let entry = DialogEntry::new(Some(invite.base_headers.cseq.cseq));

        endpoint
            .layer::<DialogLayer>()
            .dialogs
            .lock()
            .insert(dialog.key(), entry);

        Ok(dialog)
    }

    /// Create a key that the dialog can be identified with
    pub fn key(&self) -> DialogKey {
        DialogKey {
            call_id: self.call_id.0.clone(),
            peer_tag: self.peer_fromto.tag.clone(),
            local_tag: self.local_fromto.tag.clone().unwrap(),
        }
    }

    pub fn create_request(&self, method: Method) -> Request {
        let mut request = Request::new(method.clone(), self.peer_contact.uri.uri.clone());

        let local_cseq = self.local_cseq.fetch_add(1, Ordering::SeqCst);
        let cseq = CSeq::new(local_cseq, method);

        request.headers.insert_type(Name::FROM, &self.local_fromto);
        request.headers.insert_type(Name::TO, &self.peer_fromto);
        request.headers.insert_named(&self.call_id);
        request.headers.insert_named(&cseq);
        request
            .headers
            .insert_type(Name::ROUTE, &self.route_set);

        request
    }

    pub fn create_response(
        &self,
        request: &IncomingRequest,
        code: StatusCode,
        reason: Option<BytesStr>,
    ) -> Result<OutgoingResponse> {
        let mut response = self.endpoint.create_response(request, code, reason);

        if code == StatusCode::TRYING {
            // remove tag from 100 response
            response
                .msg
                .headers
                .edit(Name::TO, |to: &mut FromTo| to.tag = None)?;
        }

        if request.line.method == Method::INVITE {
            let code = code.into_u16();

            if let 101..=399 | 485 = code {
                if !response.msg.headers.contains(&Name::CONTACT) {
                    response.msg.headers.insert_named(&self.local_contact);
                }
            }

            if let 180..=189 | 200..=299 | 405 = code {
                response.msg.headers.insert_named(self.endpoint.allowed());
            }

            if let 200..=299 = code {
                response.msg.headers.insert_named(self.endpoint.supported());
            }
        }

        Ok(response)
    }

    /// Register a [`Usage`] to receive in-dialog requests that match this dialog.
    pub fn register_usage<U: Usage>(&self, usage: U) -> UsageGuard {
        // Unwrap is safe as the dialog entry was inserted when the dialog was created
        // and this `Dialog` keeps it alive until it is dropped.
        register_usage(self.endpoint.clone(), self.key(), usage).unwrap()
    }
}

impl Drop for Dialog {
    fn drop(&mut self) {
        self.endpoint
            .layer::<DialogLayer>()
            .dialogs
            .lock()
            .remove(&self.key());
    }
}
