//! # PicoNode - MQTT-SN Session and Topic Lifecycle for Embedded Nodes
//!
//! The client-side orchestration layer of a constrained sensor/actuator node
//! talking MQTT-SN to a gateway, designed for embedded no_std environments.
//!
//! The crate drives three flows on top of a caller-supplied wire transport:
//!
//! - **Gateway session** - discovery, connect parameters and event dispatch
//! - **Self-service provisioning** - every local (endpoint, service type)
//!   pair is registered and subscribed through a single-request pipeline
//! - **External subscriptions** - local endpoints follow other nodes' topics
//!   with at most one gateway subscription per topic name
//!
//! ## Features
//!
//! - **no_std** compatible - Fully embedded, no standard library
//! - **Heapless** - All stack/static allocation, no heap usage
//! - **Generic transport** - Works with any MQTT-SN wire client
//! - **Configurable** - Compile-time capacities via const generics
//!
//! ## Limitations
//!
//! - One gateway, one connection (no gateway fail-over)
//! - No persistence across reboots; state is rebuilt per session
//! - Packet framing and network addressing live below the [`Transport`] seam
//!
//! ## Example
//!
//! ```rust,ignore
//! use piconode::{DeviceId, GatewaySession, PicoNode};
//!
//! let device_id = DeviceId::try_from("s4t0dOpl8i2f")?;
//! let mut session = GatewaySession::new(transport, device_id.as_str())?;
//! let mut node: PicoNode = PicoNode::new(device_id);
//!
//! node.start_discovery(&mut session)?;
//! loop {
//!     // The wire client yields events; provisioning and subscription
//!     // bookkeeping happen inside dispatch.
//!     let event = wire.next_event().await;
//!     session.dispatch(event, &mut node);
//! }
//! ```
//!
//! ## Configuration
//!
//! Capacities are const generic parameters with defaults matching an 8
//! endpoint node:
//!
//! - `MAX_SERVICES`: service database slots (default 60)
//! - `MAX_GROUPS`: external topic groups (default 20)
//! - `MAX_SUBS_PER_ENDPOINT`: external names one endpoint may follow
//!   (default 8)

#![no_std]

pub mod endpoint;
pub mod error;
pub mod event;
pub mod multiplexer;
pub mod node;
pub mod registrar;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use endpoint::{DeviceId, Endpoint, ExternalName, ServiceType};
pub use error::{Error, Result};
pub use event::{DiscoveryResult, EventHandler, GatewayEvent, RequestKind};
pub use multiplexer::{AckOutcome, SubscribeOutcome, SubscriptionMux, TopicGroup};
pub use node::PicoNode;
pub use registrar::{Registrar, RetryOutcome, ServiceRecord, SetupProgress};
pub use session::{ConnectOptions, GatewaySession};
pub use transport::{
    ClientState, ConnectRequest, GatewayAddress, GatewayInfo, Transport, TransportError,
};

/// Common node configurations
pub mod prelude {
    use super::PicoNode;

    /// Small configuration: 10 services, 4 groups, 2 subscriptions each
    pub type SmallNode = PicoNode<10, 4, 2>;

    /// Default configuration: 60 services, 20 groups, 8 subscriptions each
    pub type DefaultNode = PicoNode;

    /// Large configuration: 120 services, 40 groups, 16 subscriptions each
    pub type LargeNode = PicoNode<120, 40, 16>;
}
