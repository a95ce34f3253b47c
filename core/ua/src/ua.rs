//! A single registered identity: one account, its registration lifecycle, and the
//! calls placed or accepted under it.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use call::{Call, CallMediaBackend, MediaNatConfig};
use event_bus::{CallId, Event, EventBus, UaId};
use registry::Registry;
use sip_auth::{DigestAuthenticator, DigestCredentials, DigestUser};
use sip_core::Endpoint;
use sip_types::StatusCode;
use sip_types::header::typed::Contact;
use sip_types::uri::NameAddr;
use sip_ua::{InboundCall, NoMedia, RegistrarConfig, Registration};
use tokio::sync::mpsc;

use crate::account::Account;
use crate::backoff::Backoff;

static NEXT_CALL_ID: AtomicU64 = AtomicU64::new(1);

fn next_call_id() -> CallId {
    CallId(NEXT_CALL_ID.fetch_add(1, Ordering::Relaxed))
}

#[derive(Debug, thiserror::Error)]
pub enum UaError {
    #[error(transparent)]
    Core(#[from] sip_core::Error),
    #[error("no call with id {0:?}")]
    UnknownCall(CallId),
    #[error("registration failed: {0}")]
    Register(String),
    #[error(transparent)]
    Decline(#[from] sip_ua::invite::acceptor::Error),
    #[error(transparent)]
    Dial(#[from] call::CallDialError),
    #[error(transparent)]
    Accept(#[from] call::CallAcceptError),
    #[error(transparent)]
    Media(#[from] call::CallMediaError),
}

/// What arrived while driving [`Ua::run`]; mirrors what was already published to the
/// event bus, so a caller that only cares about bus events can ignore this.
#[derive(Debug)]
pub enum UaEvent {
    Registered,
    RegistrationFailed,
    IncomingCall(CallId),
    CallClosed(CallId),
}

/// One parsed account plus everything it takes to keep it registered and to place or
/// accept calls under its identity.
pub struct Ua {
    id: UaId,
    account: Account,
    endpoint: Endpoint,
    registry: Arc<Registry>,
    bus: Arc<EventBus>,
    local_addr: IpAddr,

    from: NameAddr,
    contact: Contact,

    registration: Option<Registration>,
    backoff: Backoff,
    catchall: bool,

    calls: HashMap<CallId, Call>,
    pending_inbound: HashMap<CallId, InboundCall<NoMedia>>,
    incoming_rx: mpsc::UnboundedReceiver<(InboundCall<NoMedia>, String)>,
}

pub(crate) type IncomingSender = mpsc::UnboundedSender<(InboundCall<NoMedia>, String)>;

impl Ua {
    pub(crate) async fn new(
        id: UaId,
        account: Account,
        endpoint: Endpoint,
        registry: Arc<Registry>,
        bus: Arc<EventBus>,
        local_addr: IpAddr,
    ) -> Result<(Self, IncomingSender), sip_core::Error> {
        let (transport, _remote_addr) = endpoint.select_transport(account.registrar()).await?;

        let contact = Contact::new(NameAddr::uri(
            sip_types::uri::SipUri::new(transport.sent_by().into())
                .user(account.auth_user.clone().into()),
        ));

        let from = match &account.display_name {
            Some(name) => NameAddr::new(name.clone(), account.aor.clone()),
            None => NameAddr::uri(account.aor.clone()),
        };

        let regint = account.regint;
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();

        Ok((
            Self {
                id,
                account,
                endpoint,
                registry,
                bus,
                local_addr,
                from,
                contact,
                registration: None,
                backoff: Backoff::new(regint),
                catchall: false,
                calls: HashMap::new(),
                pending_inbound: HashMap::new(),
                incoming_rx,
            },
            incoming_tx,
        ))
    }

    pub fn id(&self) -> UaId {
        self.id
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn contact(&self) -> &Contact {
        &self.contact
    }

    pub fn is_catchall(&self) -> bool {
        self.catchall
    }

    pub fn set_catchall(&mut self, catchall: bool) {
        self.catchall = catchall;
    }

    pub fn is_registered(&mut self) -> bool {
        self.registration
            .as_mut()
            .is_some_and(Registration::is_registered)
    }

    fn digest_credentials(&self) -> DigestCredentials {
        let mut credentials = DigestCredentials::new();
        credentials.set_default(DigestUser::new(
            self.account.auth_user.clone(),
            self.account.auth_pass.clone(),
        ));
        credentials
    }

    /// Sends the initial REGISTER. Publishes `RegisterOk`/`RegisterFail` and, on
    /// success, leaves a background keep-alive running (owned by `sip_ua`); failures
    /// after that are picked up and retried with backoff from [`Ua::run`].
    pub async fn register(&mut self) -> Result<(), UaError> {
        let config = RegistrarConfig {
            registrar: self.account.registrar().clone(),
            username: self.account.auth_user.clone(),
            display_name: self.account.display_name.clone(),
            override_id: Some(self.from.clone()),
            override_contact: Some(self.contact.clone()),
            expiry: Some(self.account.regint),
        };

        match Registration::register(self.endpoint.clone(), config, self.digest_authenticator()).await {
            Ok(registration) => {
                self.registration = Some(registration);
                self.backoff.reset();
                self.bus.publish(Event::RegisterOk { ua: self.id });
                Ok(())
            }
            Err(e) => {
                self.bus.publish(Event::RegisterFail {
                    ua: self.id,
                    reason: e.to_string(),
                });
                Err(UaError::Register(e.to_string()))
            }
        }
    }

    /// Drops the registration, letting `sip_ua` send the zero-expiry REGISTER that
    /// removes the binding.
    pub fn unregister(&mut self) {
        self.bus.publish(Event::Unregistering { ua: self.id });
        self.registration = None;
    }

    fn digest_authenticator(&self) -> DigestAuthenticator {
        DigestAuthenticator::new(self.digest_credentials())
    }

    fn media_nat_config(&self) -> MediaNatConfig {
        match (self.account.medianat.as_deref(), self.account.stunserver) {
            (Some("ice"), stun) => MediaNatConfig::Ice { stun },
            (_, Some(stun)) => MediaNatConfig::Stun(stun),
            _ => MediaNatConfig::None,
        }
    }

    fn media_backend(&self) -> Result<CallMediaBackend, UaError> {
        CallMediaBackend::new(
            self.local_addr,
            self.media_nat_config(),
            self.registry.clone(),
            Default::default(),
        )
        .map_err(UaError::from)
    }

    /// Places an outbound call to `target`, returning the new call's id once it's
    /// established.
    pub async fn connect(&mut self, target: sip_types::uri::SipUri) -> Result<CallId, UaError> {
        let id = next_call_id();
        let media = self.media_backend()?;

        let call = Call::dial(
            id,
            self.endpoint.clone(),
            self.digest_credentials(),
            self.from.clone(),
            self.contact.clone(),
            target,
            media,
            self.bus.clone(),
        )
        .await?;

        self.calls.insert(id, call);
        Ok(id)
    }

    /// Accepts a pending inbound call previously surfaced via `CallIncoming`.
    pub async fn answer(&mut self, call: CallId) -> Result<(), UaError> {
        let inbound = self
            .pending_inbound
            .remove(&call)
            .ok_or(UaError::UnknownCall(call))?;
        let media = self.media_backend()?;

        let accepted = Call::accept(call, inbound, media, self.bus.clone()).await?;

        self.calls.insert(call, accepted);
        Ok(())
    }

    /// Declines a pending inbound call without ever establishing it.
    pub async fn decline(&mut self, call: CallId, code: StatusCode) -> Result<(), UaError> {
        let inbound = self
            .pending_inbound
            .remove(&call)
            .ok_or(UaError::UnknownCall(call))?;

        Call::decline(call, inbound, code, &self.bus)
            .await
            .map_err(UaError::Decline)
    }

    /// Hangs up an established call with a BYE.
    pub async fn hangup(&mut self, call: CallId) -> Result<(), UaError> {
        let call_obj = self.calls.remove(&call).ok_or(UaError::UnknownCall(call))?;
        call_obj.terminate().await.map_err(UaError::Core)
    }

    /// Drives this account's registration-failure backoff, inbound-call intake and
    /// live-call event loops for one step.
    pub async fn run(&mut self) -> Result<UaEvent, UaError> {
        loop {
            let mut call_futs: Vec<_> = self
                .calls
                .iter_mut()
                .map(|(id, call)| {
                    let id = *id;
                    Box::pin(async move { (id, call.run().await) })
                })
                .collect();
            let has_calls = !call_futs.is_empty();

            tokio::select! {
                _ = wait_registration_failure(&mut self.registration) => {
                    return self.handle_registration_failure().await;
                }
                incoming = self.incoming_rx.recv() => {
                    if let Some(event) = self.handle_incoming(incoming) {
                        return Ok(event);
                    }
                }
                (done_id, result) = select_first(call_futs), if has_calls => {
                    match result {
                        Ok(false) => {}
                        Ok(true) => {
                            self.calls.remove(&done_id);
                            return Ok(UaEvent::CallClosed(done_id));
                        }
                        Err(e) => {
                            log::warn!("call {done_id:?} errored: {e}");
                            self.calls.remove(&done_id);
                            return Ok(UaEvent::CallClosed(done_id));
                        }
                    }
                }
            }
        }
    }

    async fn handle_registration_failure(&mut self) -> Result<UaEvent, UaError> {
        self.registration = None;
        self.bus.publish(Event::RegisterFail {
            ua: self.id,
            reason: "registration expired or rejected".to_owned(),
        });

        tokio::time::sleep(self.backoff.next_delay()).await;

        match self.register().await {
            Ok(()) => Ok(UaEvent::Registered),
            Err(_) => Ok(UaEvent::RegistrationFailed),
        }
    }

    fn handle_incoming(&mut self, incoming: Option<(InboundCall<NoMedia>, String)>) -> Option<UaEvent> {
        let (inbound, from) = incoming?;
        let id = next_call_id();
        self.pending_inbound.insert(id, inbound);
        self.bus.publish(Event::CallIncoming {
            ua: self.id,
            call: id,
            from,
        });
        Some(UaEvent::IncomingCall(id))
    }
}

/// Resolves once the active registration reports a failure; never resolves while
/// unregistered, so it drops out of whichever `select!` it's raced against.
async fn wait_registration_failure(registration: &mut Option<Registration>) {
    match registration {
        Some(registration) => registration.wait_for_registration_failure().await,
        None => std::future::pending().await,
    }
}

type CallRunFuture<'a> =
    std::pin::Pin<Box<dyn std::future::Future<Output = (CallId, Result<bool, sip_ua::CallError<call::CallMediaError>>)> + 'a>>;

/// Races every live call's run loop and returns the first one to produce an event.
async fn select_first(
    futs: Vec<CallRunFuture<'_>>,
) -> (CallId, Result<bool, sip_ua::CallError<call::CallMediaError>>) {
    let (result, _index, _rest) = futures_util::future::select_all(futs).await;
    result
}
