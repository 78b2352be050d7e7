//! Inbound gateway events and their handler interface
//!
//! Every asynchronous protocol outcome surfaces as one [`GatewayEvent`]. The
//! per-event callback table of the underlying client is expressed as the
//! [`EventHandler`] trait: one method per event kind, checked for
//! exhaustiveness at compile time. Default bodies log the event as unhandled
//! and drop it.

use crate::error::Result;
use crate::session::GatewaySession;
use crate::transport::{GatewayInfo, Transport};

/// An asynchronous event from the gateway session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayEvent<'a> {
    /// GWINFO: an active gateway answered discovery.
    GatewayFound { gateway: GatewayInfo },
    /// CONNACK: the session is established.
    Connected,
    /// DISCONNECT: the gateway permitted the disconnect.
    DisconnectPermit,
    /// REGACK: a topic registration was acknowledged.
    Registered { msg_id: u16, topic_id: u16 },
    /// PUBACK: a publish was acknowledged.
    Published { msg_id: u16 },
    /// SUBACK: a subscription was acknowledged.
    Subscribed { msg_id: u16, topic_id: u16 },
    /// UNSUBACK: an unsubscription was acknowledged.
    Unsubscribed { msg_id: u16 },
    /// PUBLISH: content arrived for a subscribed topic id.
    Received { topic_id: u16, payload: &'a [u8] },
    /// The retransmission engine gave up on a request.
    Timeout { msg_id: u16, kind: RequestKind },
    /// The gateway discovery procedure finished.
    SearchGatewayTimeout { result: DiscoveryResult },
}

/// Which outbound request a [`GatewayEvent::Timeout`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Connect,
    Register,
    Subscribe,
    Unsubscribe,
    Publish,
    PingRequest,
}

/// Result code of a gateway discovery round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryResult {
    /// A gateway was found.
    Finished,
    /// The transport failed while searching.
    TransportFailed,
    /// The underlying platform reported an error.
    PlatformFailed,
    /// The timeout elapsed without an answer.
    NoGatewayFound,
}

/// Handler of inbound gateway events
///
/// Implement the methods for the events the node cares about; the rest are
/// logged and dropped by the default bodies. A non-`Ok` return is logged by
/// the dispatcher and never retried at that layer.
pub trait EventHandler<T: Transport> {
    fn on_gateway_found(
        &mut self,
        session: &mut GatewaySession<T>,
        gateway: &GatewayInfo,
    ) -> Result<()> {
        let _ = (session, gateway);
        log::warn!("unhandled event: gateway found");
        Ok(())
    }

    fn on_connected(&mut self, session: &mut GatewaySession<T>) -> Result<()> {
        let _ = session;
        log::warn!("unhandled event: connected");
        Ok(())
    }

    fn on_disconnect_permit(&mut self, session: &mut GatewaySession<T>) -> Result<()> {
        let _ = session;
        log::warn!("unhandled event: disconnect permit");
        Ok(())
    }

    fn on_registered(
        &mut self,
        session: &mut GatewaySession<T>,
        msg_id: u16,
        topic_id: u16,
    ) -> Result<()> {
        let _ = (session, msg_id, topic_id);
        log::warn!("unhandled event: registered");
        Ok(())
    }

    fn on_published(&mut self, session: &mut GatewaySession<T>, msg_id: u16) -> Result<()> {
        let _ = (session, msg_id);
        log::warn!("unhandled event: published");
        Ok(())
    }

    fn on_subscribed(
        &mut self,
        session: &mut GatewaySession<T>,
        msg_id: u16,
        topic_id: u16,
    ) -> Result<()> {
        let _ = (session, msg_id, topic_id);
        log::warn!("unhandled event: subscribed");
        Ok(())
    }

    fn on_unsubscribed(&mut self, session: &mut GatewaySession<T>, msg_id: u16) -> Result<()> {
        let _ = (session, msg_id);
        log::warn!("unhandled event: unsubscribed");
        Ok(())
    }

    fn on_received(
        &mut self,
        session: &mut GatewaySession<T>,
        topic_id: u16,
        payload: &[u8],
    ) -> Result<()> {
        let _ = (session, topic_id, payload);
        log::warn!("unhandled event: received");
        Ok(())
    }

    fn on_timeout(
        &mut self,
        session: &mut GatewaySession<T>,
        msg_id: u16,
        kind: RequestKind,
    ) -> Result<()> {
        let _ = (session, msg_id, kind);
        log::warn!("unhandled event: timeout");
        Ok(())
    }

    fn on_search_gateway_timeout(
        &mut self,
        session: &mut GatewaySession<T>,
        result: DiscoveryResult,
    ) -> Result<()> {
        let _ = (session, result);
        log::warn!("unhandled event: search gateway timeout");
        Ok(())
    }
}
