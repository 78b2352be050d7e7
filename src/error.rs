//! Error types for PicoNode
//!
//! no_std compatible error handling with defmt support

use crate::endpoint::Endpoint;
use crate::transport::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Client identifier does not fit the connect option buffer
    ClientIdTooLong { max: usize, actual: usize },
    /// Topic name does not fit the fixed topic name buffer
    TopicNameTooLong { max: usize, actual: usize },
    /// Device identifier is not exactly the factory identity length
    InvalidDeviceId { expected: usize, actual: usize },
    /// External topic name has the wrong length
    ExternalNameLength { expected: usize, actual: usize },
    /// External topic name is missing the separator slash
    ExternalNameMissingSlash,
    /// External topic name does not end with an ASCII digit
    ExternalNameBadDigit,
    /// Connect was requested before a gateway was discovered
    NoGateway,
    /// Another registration or subscription is already in flight
    RequestPending,
    /// No request is in flight for the attempted operation
    NoPendingRequest,
    /// Service database is full
    ServiceDatabaseFull { capacity: usize },
    /// External topic group table is full
    TopicGroupsFull { capacity: usize },
    /// Per-endpoint external subscription list is full
    SubscriptionListFull { endpoint: Endpoint, capacity: usize },
    /// Endpoint is already subscribed to the topic
    DuplicateSubscription { endpoint: Endpoint },
    /// Acknowledged topic id differs from the one recorded at registration
    TopicIdMismatch { expected: u16, actual: u16 },
    /// Acknowledgment does not match the in-flight request slot
    CorrelationMismatch,
    /// Retransmission retry limit reached, request abandoned
    RetryLimitExceeded { limit: u8 },
    /// Transport error occurred
    Transport { error: TransportError },
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::ClientIdTooLong { max, actual } => {
                write!(f, "Client id too long: {} (max: {})", actual, max)
            }
            Error::TopicNameTooLong { max, actual } => {
                write!(f, "Topic name too long: {} (max: {})", actual, max)
            }
            Error::InvalidDeviceId { expected, actual } => {
                write!(
                    f,
                    "Device id length is {} (expected exactly {})",
                    actual, expected
                )
            }
            Error::ExternalNameLength { expected, actual } => {
                write!(
                    f,
                    "External name length is {} (expected exactly {})",
                    actual, expected
                )
            }
            Error::ExternalNameMissingSlash => {
                write!(f, "External name is missing the separator slash")
            }
            Error::ExternalNameBadDigit => {
                write!(f, "External name does not end with an ASCII digit")
            }
            Error::NoGateway => write!(f, "No gateway has been discovered yet"),
            Error::RequestPending => {
                write!(f, "Another registration or subscription is in flight")
            }
            Error::NoPendingRequest => write!(f, "No request is in flight"),
            Error::ServiceDatabaseFull { capacity } => {
                write!(f, "Service database full (capacity: {})", capacity)
            }
            Error::TopicGroupsFull { capacity } => {
                write!(f, "External topic group table full (capacity: {})", capacity)
            }
            Error::SubscriptionListFull { endpoint, capacity } => {
                write!(
                    f,
                    "Subscription list of {} full (capacity: {})",
                    endpoint, capacity
                )
            }
            Error::DuplicateSubscription { endpoint } => {
                write!(f, "{} is already subscribed to the topic", endpoint)
            }
            Error::TopicIdMismatch { expected, actual } => {
                write!(
                    f,
                    "Acknowledged topic id {} does not match recorded id {}",
                    actual, expected
                )
            }
            Error::CorrelationMismatch => {
                write!(f, "Acknowledgment does not match the in-flight request")
            }
            Error::RetryLimitExceeded { limit } => {
                write!(f, "Retry limit reached: {}", limit)
            }
            Error::Transport { error } => write!(f, "Transport error occurred: {}", error),
        }
    }
}

impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::ClientIdTooLong { max, actual } => {
                defmt::write!(f, "Client id too long: {} (max: {})", actual, max)
            }
            Error::TopicNameTooLong { max, actual } => {
                defmt::write!(f, "Topic name too long: {} (max: {})", actual, max)
            }
            Error::InvalidDeviceId { expected, actual } => {
                defmt::write!(f, "Device id length is {} (expected {})", actual, expected)
            }
            Error::ExternalNameLength { expected, actual } => {
                defmt::write!(f, "External name length is {} (expected {})", actual, expected)
            }
            Error::ExternalNameMissingSlash => {
                defmt::write!(f, "External name is missing the separator slash")
            }
            Error::ExternalNameBadDigit => {
                defmt::write!(f, "External name does not end with an ASCII digit")
            }
            Error::NoGateway => defmt::write!(f, "No gateway has been discovered yet"),
            Error::RequestPending => {
                defmt::write!(f, "Another registration or subscription is in flight")
            }
            Error::NoPendingRequest => defmt::write!(f, "No request is in flight"),
            Error::ServiceDatabaseFull { capacity } => {
                defmt::write!(f, "Service database full (capacity: {})", capacity)
            }
            Error::TopicGroupsFull { capacity } => {
                defmt::write!(f, "External topic group table full (capacity: {})", capacity)
            }
            Error::SubscriptionListFull { capacity, .. } => {
                defmt::write!(f, "Subscription list full (capacity: {})", capacity)
            }
            Error::DuplicateSubscription { .. } => {
                defmt::write!(f, "Endpoint is already subscribed to the topic")
            }
            Error::TopicIdMismatch { expected, actual } => {
                defmt::write!(
                    f,
                    "Acknowledged topic id {} does not match recorded id {}",
                    actual,
                    expected
                )
            }
            Error::CorrelationMismatch => {
                defmt::write!(f, "Acknowledgment does not match the in-flight request")
            }
            Error::RetryLimitExceeded { limit } => {
                defmt::write!(f, "Retry limit reached: {}", limit)
            }
            Error::Transport { .. } => defmt::write!(f, "Transport error occurred"),
        }
    }
}

impl core::error::Error for Error {}

impl From<TransportError> for Error {
    fn from(error: TransportError) -> Self {
        Error::Transport { error }
    }
}

pub type Result<T> = core::result::Result<T, Error>;
