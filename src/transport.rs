//! Transport collaborator interface
//!
//! The session core drives one MQTT-SN wire client through this seam. The
//! wire codec, retransmission timers and network join machinery all live
//! behind it; the core only issues requests and consumes the asynchronous
//! events they produce.

/// MQTT-SN transport primitive
///
/// All request methods are non-blocking: they return a submitted/rejected
/// status immediately, and the protocol outcome arrives later as a
/// [`GatewayEvent`](crate::event::GatewayEvent). Correlation message ids are
/// supplied by the caller so a timed-out request can be re-sent with the
/// identical id.
pub trait Transport {
    /// Request gateway discovery with the given timeout in seconds.
    fn search_gateway(&mut self, timeout_secs: u16) -> Result<(), TransportError>;

    /// Open a session with a previously discovered gateway.
    fn connect(
        &mut self,
        gateway: &GatewayInfo,
        options: &ConnectRequest<'_>,
    ) -> Result<(), TransportError>;

    /// Close the current session.
    fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Send a REGISTER for the topic name under the given message id.
    fn register(&mut self, topic_name: &str, msg_id: u16) -> Result<(), TransportError>;

    /// Send a SUBSCRIBE for the topic name under the given message id.
    fn subscribe(&mut self, topic_name: &str, msg_id: u16) -> Result<(), TransportError>;

    /// Publish a payload to a registered topic id.
    fn publish(&mut self, topic_id: u16, payload: &[u8], msg_id: u16)
        -> Result<(), TransportError>;

    /// Current wire client state.
    fn state(&self) -> ClientState;
}

/// Gateway network address (Thread mesh, IPv6)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayAddress {
    pub addr: [u8; 16],
    pub port: u16,
}

impl core::fmt::Display for GatewayAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (i, chunk) in self.addr.chunks(2).enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{:02x}{:02x}", chunk[0], chunk[1])?;
        }
        write!(f, "#{}", self.port)
    }
}

/// Identity of a discovered gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayInfo {
    pub address: GatewayAddress,
    pub gateway_id: u8,
}

/// Parameters of a CONNECT exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectRequest<'a> {
    pub alive_duration: u16,
    pub clean_session: bool,
    pub will_flag: bool,
    pub client_id: &'a str,
}

/// Wire client state as reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Searching,
    Connecting,
    Connected,
    Disconnecting,
}

/// Transport error enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// I/O error on the underlying network stack
    Io,
    /// Transport cannot take another request right now
    Busy,
    /// Request is not valid in the current client state
    InvalidState,
}

impl core::fmt::Display for TransportError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TransportError::Io => write!(f, "I/O error occurred"),
            TransportError::Busy => write!(f, "Transport is busy"),
            TransportError::InvalidState => {
                write!(f, "Request not valid in the current client state")
            }
        }
    }
}

impl defmt::Format for TransportError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            TransportError::Io => defmt::write!(f, "I/O error occurred"),
            TransportError::Busy => defmt::write!(f, "Transport is busy"),
            TransportError::InvalidState => {
                defmt::write!(f, "Request not valid in the current client state")
            }
        }
    }
}

impl core::error::Error for TransportError {}
