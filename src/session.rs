//! Gateway session manager
//!
//! Single point of contact with the MQTT-SN transport. Holds the connection
//! parameters, remembers the discovered gateway and dispatches every inbound
//! event to the registered [`EventHandler`].

use heapless::String;

use crate::error::{Error, Result};
use crate::event::{EventHandler, GatewayEvent};
use crate::transport::{ClientState, ConnectRequest, GatewayInfo, Transport};

/// Maximum length of the client identifier carried in CONNECT.
pub const MAX_CLIENT_ID_LENGTH: usize = 23;

/// Maximum length of a topic name in REGISTER/SUBSCRIBE.
pub const MAX_TOPIC_NAME_LENGTH: usize = 32;

/// Default keep-alive interval in seconds.
pub const DEFAULT_ALIVE_DURATION: u16 = 60;

/// Default clean-session flag.
pub const DEFAULT_CLEAN_SESSION: bool = true;

/// Default will flag.
pub const DEFAULT_WILL_FLAG: bool = false;

/// Connect options derived at initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub alive_duration: u16,
    pub clean_session: bool,
    pub will_flag: bool,
    pub client_id: String<MAX_CLIENT_ID_LENGTH>,
}

/// The one session this node keeps with its gateway.
#[derive(Debug)]
pub struct GatewaySession<T: Transport> {
    transport: T,
    options: ConnectOptions,
    gateway: Option<GatewayInfo>,
    publish_msg_id: u16,
}

impl<T: Transport> GatewaySession<T> {
    /// Bind the transport and derive default connect options.
    ///
    /// The client identifier is copied from the device's factory identity;
    /// fails with [`Error::ClientIdTooLong`] if it exceeds the buffer.
    pub fn new(transport: T, client_id: &str) -> Result<Self> {
        let client_id =
            String::try_from(client_id).map_err(|_| Error::ClientIdTooLong {
                max: MAX_CLIENT_ID_LENGTH,
                actual: client_id.len(),
            })?;
        Ok(Self {
            transport,
            options: ConnectOptions {
                alive_duration: DEFAULT_ALIVE_DURATION,
                clean_session: DEFAULT_CLEAN_SESSION,
                will_flag: DEFAULT_WILL_FLAG,
                client_id,
            },
            gateway: None,
            publish_msg_id: 0,
        })
    }

    /// Request gateway discovery; the result arrives later as a
    /// [`GatewayEvent::SearchGatewayTimeout`].
    pub fn search_gateway(&mut self, timeout_secs: u16) -> Result<()> {
        self.transport.search_gateway(timeout_secs).map_err(|e| {
            log::error!("SEARCHGW could not be sent: {}", e);
            Error::from(e)
        })?;
        log::info!("SEARCHGW sent (timeout {} s)", timeout_secs);
        Ok(())
    }

    /// Open a session with the discovered gateway.
    pub fn connect(&mut self) -> Result<()> {
        let Some(gateway) = self.gateway else {
            return Err(Error::NoGateway);
        };
        let request = ConnectRequest {
            alive_duration: self.options.alive_duration,
            clean_session: self.options.clean_session,
            will_flag: self.options.will_flag,
            client_id: self.options.client_id.as_str(),
        };
        self.transport.connect(&gateway, &request).map_err(|e| {
            log::error!("CONNECT could not be sent: {}", e);
            Error::from(e)
        })
    }

    /// Close the session.
    pub fn disconnect(&mut self) -> Result<()> {
        self.transport.disconnect().map_err(|e| {
            log::error!("DISCONNECT could not be sent: {}", e);
            Error::from(e)
        })
    }

    /// Forward a REGISTER under the caller's correlation id.
    pub fn register_topic(&mut self, name: &str, msg_id: u16) -> Result<()> {
        self.check_name(name)?;
        self.transport.register(name, msg_id).map_err(|e| {
            log::error!("REGISTER could not be sent: {}", e);
            Error::from(e)
        })
    }

    /// Forward a SUBSCRIBE under the caller's correlation id.
    pub fn subscribe_topic(&mut self, name: &str, msg_id: u16) -> Result<()> {
        self.check_name(name)?;
        self.transport.subscribe(name, msg_id).map_err(|e| {
            log::error!("SUBSCRIBE could not be sent: {}", e);
            Error::from(e)
        })
    }

    /// Publish a payload to a registered topic id.
    ///
    /// Returns the message id the eventual PUBACK will carry.
    pub fn publish(&mut self, topic_id: u16, payload: &[u8]) -> Result<u16> {
        let msg_id = self.publish_msg_id;
        self.publish_msg_id = self.publish_msg_id.wrapping_add(1);
        self.transport
            .publish(topic_id, payload, msg_id)
            .map_err(|e| {
                log::error!("PUBLISH could not be sent: {}", e);
                Error::from(e)
            })?;
        Ok(msg_id)
    }

    /// Dispatch one inbound event to the handler.
    ///
    /// Gateway identity carried by [`GatewayEvent::GatewayFound`] is recorded
    /// here before the handler runs. A non-`Ok` handler return is logged and
    /// dropped; retry is the registrar's concern.
    pub fn dispatch<H: EventHandler<T>>(&mut self, event: GatewayEvent<'_>, handler: &mut H) {
        let result = match event {
            GatewayEvent::GatewayFound { gateway } => {
                log::info!("gateway found: id {} at {}", gateway.gateway_id, gateway.address);
                self.gateway = Some(gateway);
                handler.on_gateway_found(self, &gateway)
            }
            GatewayEvent::Connected => {
                log::info!("client connected");
                handler.on_connected(self)
            }
            GatewayEvent::DisconnectPermit => {
                log::info!("client disconnected");
                handler.on_disconnect_permit(self)
            }
            GatewayEvent::Registered { msg_id, topic_id } => {
                log::info!("topic registered with id {}", topic_id);
                handler.on_registered(self, msg_id, topic_id)
            }
            GatewayEvent::Published { msg_id } => handler.on_published(self, msg_id),
            GatewayEvent::Subscribed { msg_id, topic_id } => {
                log::info!("subscribed to topic id {}", topic_id);
                handler.on_subscribed(self, msg_id, topic_id)
            }
            GatewayEvent::Unsubscribed { msg_id } => handler.on_unsubscribed(self, msg_id),
            GatewayEvent::Received { topic_id, payload } => {
                handler.on_received(self, topic_id, payload)
            }
            GatewayEvent::Timeout { msg_id, kind } => {
                log::warn!("request timed out: message id {}", msg_id);
                handler.on_timeout(self, msg_id, kind)
            }
            GatewayEvent::SearchGatewayTimeout { result } => {
                handler.on_search_gateway_timeout(self, result)
            }
        };
        if let Err(e) = result {
            log::error!("event handler returned with error: {}", e);
        }
    }

    /// The gateway recorded from the last GWINFO, if any.
    pub fn gateway(&self) -> Option<&GatewayInfo> {
        self.gateway.as_ref()
    }

    /// Wire client state as reported by the transport.
    pub fn state(&self) -> ClientState {
        self.transport.state()
    }

    pub fn client_id(&self) -> &str {
        self.options.client_id.as_str()
    }

    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn check_name(&self, name: &str) -> Result<()> {
        if name.len() > MAX_TOPIC_NAME_LENGTH {
            return Err(Error::TopicNameTooLong {
                max: MAX_TOPIC_NAME_LENGTH,
                actual: name.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{gateway, MockTransport, Sent};

    struct NoopHandler;
    impl EventHandler<MockTransport> for NoopHandler {}

    #[test]
    fn test_client_id_length_checked() {
        assert!(GatewaySession::new(MockTransport::new(), "nRF52840").is_ok());
        let too_long = "an-identifier-that-is-way-too-long";
        assert_eq!(
            GatewaySession::new(MockTransport::new(), too_long).unwrap_err(),
            Error::ClientIdTooLong {
                max: MAX_CLIENT_ID_LENGTH,
                actual: too_long.len(),
            }
        );
    }

    #[test]
    fn test_connect_requires_discovered_gateway() {
        let mut session = GatewaySession::new(MockTransport::new(), "nRF52840").unwrap();
        assert_eq!(session.connect(), Err(Error::NoGateway));

        let mut handler = NoopHandler;
        session.dispatch(GatewayEvent::GatewayFound { gateway: gateway() }, &mut handler);
        assert_eq!(session.gateway(), Some(&gateway()));
        session.connect().unwrap();
        assert_eq!(session.transport().last(), Some(&Sent::Connect));
    }

    #[test]
    fn test_topic_name_length_checked() {
        let mut session = GatewaySession::new(MockTransport::new(), "nRF52840").unwrap();
        let long_name = "a-topic-name-that-exceeds-the-fixed-buffer";
        assert_eq!(
            session.register_topic(long_name, 1),
            Err(Error::TopicNameTooLong {
                max: MAX_TOPIC_NAME_LENGTH,
                actual: long_name.len(),
            })
        );
        assert!(session.transport().sent.is_empty());

        session.register_topic("nRF52840/data", 1).unwrap();
        assert_eq!(session.transport().registers(), 1);
    }

    #[test]
    fn test_send_failure_is_returned_not_retried() {
        let mut transport = MockTransport::new();
        transport.fail_sends = true;
        let mut session = GatewaySession::new(transport, "nRF52840").unwrap();
        assert_eq!(
            session.search_gateway(100),
            Err(Error::Transport {
                error: crate::transport::TransportError::Io,
            })
        );
        assert!(session.transport().sent.is_empty());
    }

    #[test]
    fn test_publish_allocates_distinct_message_ids() {
        let mut session = GatewaySession::new(MockTransport::new(), "nRF52840").unwrap();
        let first = session.publish(7, b"on").unwrap();
        let second = session.publish(7, b"off").unwrap();
        assert_ne!(first, second);
        assert_eq!(session.transport().sent.len(), 2);
    }

    #[test]
    fn test_unhandled_events_are_dropped() {
        let mut session = GatewaySession::new(MockTransport::new(), "nRF52840").unwrap();
        let mut handler = NoopHandler;
        session.dispatch(GatewayEvent::Connected, &mut handler);
        session.dispatch(
            GatewayEvent::Received {
                topic_id: 3,
                payload: b"on",
            },
            &mut handler,
        );
        // Nothing was sent in response; the events were logged and dropped.
        assert!(session.transport().sent.is_empty());
    }
}
