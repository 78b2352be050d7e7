//! Local endpoint and service identity types
//!
//! The node exposes a fixed set of I/O endpoints, each offering every service
//! type. Both sets are small, bounded enumerations; iteration over them drives
//! the self-service provisioning walk.

use heapless::String;

use crate::error::{Error, Result};

/// Number of endpoints on this platform.
pub const ENDPOINT_COUNT: usize = 8;

/// Number of service types each endpoint offers.
pub const SERVICE_TYPE_COUNT: usize = 5;

/// Exact length of the device factory identity string.
pub const DEVICE_ID_LENGTH: usize = 12;

/// Exact length of an external endpoint topic name.
pub const EXTERNAL_NAME_LENGTH: usize = 14;

/// A local I/O capability of the node.
///
/// Absence of an endpoint is expressed with `Option<Endpoint>`; there is no
/// in-band sentinel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Endpoint {
    Button0 = 0,
    Button1,
    Button2,
    Button3,
    Led0,
    Led1,
    Led2,
    Led3,
}

impl Endpoint {
    pub const ALL: [Endpoint; ENDPOINT_COUNT] = [
        Endpoint::Button0,
        Endpoint::Button1,
        Endpoint::Button2,
        Endpoint::Button3,
        Endpoint::Led0,
        Endpoint::Led1,
        Endpoint::Led2,
        Endpoint::Led3,
    ];

    /// First endpoint of the provisioning walk.
    pub const fn first() -> Self {
        Endpoint::Button0
    }

    /// Numeric index used in derived topic names.
    pub const fn index(self) -> u8 {
        self as u8
    }

    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Endpoint::Button0),
            1 => Some(Endpoint::Button1),
            2 => Some(Endpoint::Button2),
            3 => Some(Endpoint::Button3),
            4 => Some(Endpoint::Led0),
            5 => Some(Endpoint::Led1),
            6 => Some(Endpoint::Led2),
            7 => Some(Endpoint::Led3),
            _ => None,
        }
    }

    /// The next endpoint in walk order, or `None` past the last one.
    pub const fn next(self) -> Option<Self> {
        Self::from_index(self as u8 + 1)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Endpoint::Button0 => "button_0",
            Endpoint::Button1 => "button_1",
            Endpoint::Button2 => "button_2",
            Endpoint::Button3 => "button_3",
            Endpoint::Led0 => "led_0",
            Endpoint::Led1 => "led_1",
            Endpoint::Led2 => "led_2",
            Endpoint::Led3 => "led_3",
        }
    }
}

impl core::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Category of function offered at an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ServiceType {
    Info = 0,
    OnOff,
    ConfigSubscribe,
    ConfigUnsubscribe,
    ConfigList,
}

impl ServiceType {
    pub const ALL: [ServiceType; SERVICE_TYPE_COUNT] = [
        ServiceType::Info,
        ServiceType::OnOff,
        ServiceType::ConfigSubscribe,
        ServiceType::ConfigUnsubscribe,
        ServiceType::ConfigList,
    ];

    /// First service type of the provisioning walk.
    pub const fn first() -> Self {
        ServiceType::Info
    }

    pub const fn index(self) -> u8 {
        self as u8
    }

    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(ServiceType::Info),
            1 => Some(ServiceType::OnOff),
            2 => Some(ServiceType::ConfigSubscribe),
            3 => Some(ServiceType::ConfigUnsubscribe),
            4 => Some(ServiceType::ConfigList),
            _ => None,
        }
    }

    /// The next service type in walk order, or `None` past the last one.
    pub const fn next(self) -> Option<Self> {
        Self::from_index(self as u8 + 1)
    }

    /// Segment this service contributes to a derived topic name.
    pub const fn topic_str(self) -> &'static str {
        match self {
            ServiceType::Info => "info",
            ServiceType::OnOff => "onoff",
            ServiceType::ConfigSubscribe => "config/sub",
            ServiceType::ConfigUnsubscribe => "config/unsub",
            ServiceType::ConfigList => "config/list",
        }
    }
}

impl core::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.topic_str())
    }
}

/// Device factory identity
///
/// A base64-style identifier of exactly [`DEVICE_ID_LENGTH`] characters that
/// prefixes every self-service topic name.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId(String<DEVICE_ID_LENGTH>);

impl DeviceId {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<&str> for DeviceId {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        if value.len() != DEVICE_ID_LENGTH {
            return Err(Error::InvalidDeviceId {
                expected: DEVICE_ID_LENGTH,
                actual: value.len(),
            });
        }
        let id = String::try_from(value).map_err(|_| Error::InvalidDeviceId {
            expected: DEVICE_ID_LENGTH,
            actual: value.len(),
        })?;
        Ok(DeviceId(id))
    }
}

impl core::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External endpoint topic name
///
/// Names another party's sub-service: 12 identifier characters, a literal
/// `/`, and one ASCII decimal digit selecting the remote sub-service.
/// Example: `s4t0dOpl8i2f/0`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExternalName(String<EXTERNAL_NAME_LENGTH>);

impl ExternalName {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// The trailing digit selecting the remote sub-service.
    pub fn digit(&self) -> u8 {
        self.0.as_bytes()[EXTERNAL_NAME_LENGTH - 1] - b'0'
    }

    /// The remote sub-service the trailing digit maps to, if any.
    pub fn sub_service(&self) -> Option<ServiceType> {
        ServiceType::from_index(self.digit())
    }
}

impl TryFrom<&str> for ExternalName {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        let bytes = value.as_bytes();
        if bytes.len() != EXTERNAL_NAME_LENGTH {
            return Err(Error::ExternalNameLength {
                expected: EXTERNAL_NAME_LENGTH,
                actual: bytes.len(),
            });
        }
        if bytes[EXTERNAL_NAME_LENGTH - 2] != b'/' {
            return Err(Error::ExternalNameMissingSlash);
        }
        if !bytes[EXTERNAL_NAME_LENGTH - 1].is_ascii_digit() {
            return Err(Error::ExternalNameBadDigit);
        }
        let name = String::try_from(value).map_err(|_| Error::ExternalNameLength {
            expected: EXTERNAL_NAME_LENGTH,
            actual: bytes.len(),
        })?;
        Ok(ExternalName(name))
    }
}

impl core::fmt::Display for ExternalName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_walk_order_covers_all() {
        let mut cursor = Some(Endpoint::first());
        let mut visited = 0usize;
        while let Some(endpoint) = cursor {
            assert_eq!(Endpoint::ALL[visited], endpoint);
            visited += 1;
            cursor = endpoint.next();
        }
        assert_eq!(visited, ENDPOINT_COUNT);
    }

    #[test]
    fn test_service_type_walk_order_covers_all() {
        let mut cursor = Some(ServiceType::first());
        let mut visited = 0usize;
        while let Some(service) = cursor {
            assert_eq!(ServiceType::ALL[visited], service);
            visited += 1;
            cursor = service.next();
        }
        assert_eq!(visited, SERVICE_TYPE_COUNT);
    }

    #[test]
    fn test_endpoint_index_round_trip() {
        for endpoint in Endpoint::ALL {
            assert_eq!(Endpoint::from_index(endpoint.index()), Some(endpoint));
        }
        assert_eq!(Endpoint::from_index(ENDPOINT_COUNT as u8), None);
    }

    #[test]
    fn test_device_id_requires_exact_length() {
        assert!(DeviceId::try_from("s4t0dOpl8i2f").is_ok());
        assert_eq!(
            DeviceId::try_from("short"),
            Err(Error::InvalidDeviceId {
                expected: DEVICE_ID_LENGTH,
                actual: 5,
            })
        );
        assert!(DeviceId::try_from("s4t0dOpl8i2f0").is_err());
    }

    #[test]
    fn test_external_name_valid() {
        let name = ExternalName::try_from("abcdefghijkl/3").unwrap();
        assert_eq!(name.as_str(), "abcdefghijkl/3");
        assert_eq!(name.digit(), 3);
        assert_eq!(name.sub_service(), Some(ServiceType::ConfigUnsubscribe));
    }

    #[test]
    fn test_external_name_rejects_non_digit() {
        assert_eq!(
            ExternalName::try_from("abcdefghijkl/x"),
            Err(Error::ExternalNameBadDigit)
        );
    }

    #[test]
    fn test_external_name_rejects_missing_slash() {
        assert_eq!(
            ExternalName::try_from("abcdefghijklm3"),
            Err(Error::ExternalNameMissingSlash)
        );
    }

    #[test]
    fn test_external_name_rejects_wrong_length() {
        assert_eq!(
            ExternalName::try_from("abc/3"),
            Err(Error::ExternalNameLength {
                expected: EXTERNAL_NAME_LENGTH,
                actual: 5,
            })
        );
        assert!(ExternalName::try_from("abcdefghijklmn/3").is_err());
    }

    #[test]
    fn test_external_name_digit_without_service() {
        // Digits 5..=9 are syntactically valid but map to no known service.
        let name = ExternalName::try_from("abcdefghijkl/9").unwrap();
        assert_eq!(name.sub_service(), None);
    }
}
