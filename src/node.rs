//! Node-level event wiring
//!
//! [`PicoNode`] owns the registrar and the multiplexer and implements
//! [`EventHandler`], turning the raw gateway events into the provisioning and
//! subscription flows. The session itself is owned by the embedding loop and
//! passed through `dispatch`.

use crate::endpoint::{DeviceId, Endpoint};
use crate::error::{Error, Result};
use crate::event::{DiscoveryResult, EventHandler, RequestKind};
use crate::multiplexer::{
    SubscribeOutcome, SubscriptionMux, DEFAULT_GROUP_CAPACITY, DEFAULT_SUBS_PER_ENDPOINT,
};
use crate::registrar::{Registrar, SetupProgress, DEFAULT_SERVICE_CAPACITY};
use crate::session::GatewaySession;
use crate::transport::{GatewayInfo, Transport};

/// Discovery timeout handed to SEARCHGW, in seconds.
pub const SEARCH_GATEWAY_TIMEOUT: u16 = 100;

/// Discovery rounds before the node gives up.
pub const SEARCH_GATEWAY_TRIES: u8 = 20;

/// The whole client-side node: registrar, multiplexer and their event wiring.
#[derive(Debug)]
pub struct PicoNode<
    const MAX_SERVICES: usize = DEFAULT_SERVICE_CAPACITY,
    const MAX_GROUPS: usize = DEFAULT_GROUP_CAPACITY,
    const MAX_SUBS_PER_ENDPOINT: usize = DEFAULT_SUBS_PER_ENDPOINT,
> {
    registrar: Registrar<MAX_SERVICES>,
    mux: SubscriptionMux<MAX_GROUPS, MAX_SUBS_PER_ENDPOINT>,
    device_id: DeviceId,
    search_tries: u8,
}

impl<const MAX_SERVICES: usize, const MAX_GROUPS: usize, const MAX_SUBS_PER_ENDPOINT: usize>
    PicoNode<MAX_SERVICES, MAX_GROUPS, MAX_SUBS_PER_ENDPOINT>
{
    pub const fn new(device_id: DeviceId) -> Self {
        Self {
            registrar: Registrar::new(),
            mux: SubscriptionMux::new(),
            device_id,
            search_tries: 0,
        }
    }

    /// Kick off gateway discovery; failed rounds are retried from
    /// `on_search_gateway_timeout` up to [`SEARCH_GATEWAY_TRIES`] times.
    pub fn start_discovery<T: Transport>(
        &mut self,
        session: &mut GatewaySession<T>,
    ) -> Result<()> {
        self.search_tries = 1;
        session.search_gateway(SEARCH_GATEWAY_TIMEOUT)
    }

    /// Subscribe a local endpoint to another node's topic.
    pub fn subscribe_external<T: Transport>(
        &mut self,
        session: &mut GatewaySession<T>,
        endpoint: Endpoint,
        raw_name: &str,
    ) -> Result<SubscribeOutcome> {
        self.mux
            .subscribe(&mut self.registrar, session, endpoint, raw_name)
    }

    pub fn registrar(&self) -> &Registrar<MAX_SERVICES> {
        &self.registrar
    }

    pub fn multiplexer(&self) -> &SubscriptionMux<MAX_GROUPS, MAX_SUBS_PER_ENDPOINT> {
        &self.mux
    }
}

impl<
        T: Transport,
        const MAX_SERVICES: usize,
        const MAX_GROUPS: usize,
        const MAX_SUBS_PER_ENDPOINT: usize,
    > EventHandler<T> for PicoNode<MAX_SERVICES, MAX_GROUPS, MAX_SUBS_PER_ENDPOINT>
{
    fn on_gateway_found(
        &mut self,
        _session: &mut GatewaySession<T>,
        _gateway: &GatewayInfo,
    ) -> Result<()> {
        self.search_tries = 0;
        Ok(())
    }

    /// Session established: begin the self-service provisioning walk.
    fn on_connected(&mut self, session: &mut GatewaySession<T>) -> Result<()> {
        self.mux.reset();
        self.registrar.start(session, self.device_id.clone())
    }

    fn on_disconnect_permit(&mut self, _session: &mut GatewaySession<T>) -> Result<()> {
        log::info!("session closed by the gateway");
        Ok(())
    }

    fn on_registered(
        &mut self,
        session: &mut GatewaySession<T>,
        msg_id: u16,
        topic_id: u16,
    ) -> Result<()> {
        let _ = self.registrar.on_registered(session, msg_id, topic_id)?;
        Ok(())
    }

    fn on_published(&mut self, _session: &mut GatewaySession<T>, msg_id: u16) -> Result<()> {
        log::info!("publish acknowledged (message id {})", msg_id);
        Ok(())
    }

    fn on_subscribed(
        &mut self,
        session: &mut GatewaySession<T>,
        msg_id: u16,
        topic_id: u16,
    ) -> Result<()> {
        if self.registrar.pending_is_external() {
            let _ = self
                .mux
                .on_subscribe_ack(&mut self.registrar, msg_id, topic_id)?;
            return Ok(());
        }
        if self.registrar.on_subscribed(session, msg_id, topic_id)?
            == SetupProgress::AllRegistered
        {
            log::info!(
                "self-service provisioning complete: {} services online",
                self.registrar.records().len()
            );
        }
        Ok(())
    }

    fn on_unsubscribed(&mut self, _session: &mut GatewaySession<T>, msg_id: u16) -> Result<()> {
        log::info!("unsubscribe acknowledged (message id {})", msg_id);
        Ok(())
    }

    /// Fan inbound content out to the endpoints following its topic id.
    fn on_received(
        &mut self,
        _session: &mut GatewaySession<T>,
        topic_id: u16,
        payload: &[u8],
    ) -> Result<()> {
        match self.mux.endpoints_for(topic_id) {
            Some(endpoints) => {
                for endpoint in endpoints {
                    log::info!(
                        "{} bytes for {} (topic id {})",
                        payload.len(),
                        endpoint,
                        topic_id
                    );
                }
            }
            None => log::warn!("content for unknown topic id {} dropped", topic_id),
        }
        Ok(())
    }

    /// A request exhausted the transport's retransmissions: retry it, and
    /// tear the session down once the retry budget is spent too.
    fn on_timeout(
        &mut self,
        session: &mut GatewaySession<T>,
        msg_id: u16,
        kind: RequestKind,
    ) -> Result<()> {
        let outcome = match kind {
            RequestKind::Register => self.registrar.retry_register(session, msg_id),
            RequestKind::Subscribe => self.registrar.retry_subscribe(session, msg_id),
            _ => {
                log::warn!("unrecoverable timeout for message id {}", msg_id);
                return Ok(());
            }
        };
        match outcome {
            Ok(_) => Ok(()),
            Err(Error::RetryLimitExceeded { limit }) => {
                self.mux.abandon();
                log::error!(
                    "message id {} gave up after {} retries; disconnecting",
                    msg_id,
                    limit
                );
                session.disconnect()
            }
            Err(e) => Err(e),
        }
    }

    fn on_search_gateway_timeout(
        &mut self,
        session: &mut GatewaySession<T>,
        result: DiscoveryResult,
    ) -> Result<()> {
        if result == DiscoveryResult::Finished {
            return session.connect();
        }
        if self.search_tries < SEARCH_GATEWAY_TRIES {
            self.search_tries += 1;
            log::warn!(
                "gateway discovery failed; retrying ({}/{})",
                self.search_tries,
                SEARCH_GATEWAY_TRIES
            );
            return session.search_gateway(SEARCH_GATEWAY_TIMEOUT);
        }
        log::error!("no gateway found after {} rounds", SEARCH_GATEWAY_TRIES);
        Err(Error::NoGateway)
    }
}
