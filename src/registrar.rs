//! Self-service registrar
//!
//! Walks every (endpoint, service type) pair the node exposes and drives each
//! one through a register -> ack -> subscribe -> ack exchange with the
//! gateway, committing completed pairs to the service database. Exactly one
//! request is in flight at any time; the same single slot is lent to the
//! external subscription multiplexer.

use core::fmt::Write as _;

use heapless::{String, Vec};

use crate::endpoint::{DeviceId, Endpoint, ExternalName, ServiceType};
use crate::error::{Error, Result};
use crate::session::{GatewaySession, MAX_TOPIC_NAME_LENGTH};
use crate::transport::Transport;

/// Retries granted to one request before it is abandoned.
pub const DEFAULT_RETRY_LIMIT: u8 = 4;

/// Default capacity of the service database.
pub const DEFAULT_SERVICE_CAPACITY: usize = 60;

/// A committed self-service entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceRecord {
    pub endpoint: Endpoint,
    pub service_type: ServiceType,
    pub topic_id: u16,
}

/// What the in-flight request was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOrigin {
    /// A pair of the provisioning walk.
    SelfService {
        endpoint: Endpoint,
        service_type: ServiceType,
    },
    /// An external subscription originated by the multiplexer.
    External,
}

/// Exchange phase of the in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestPhase {
    Created,
    RegisterSent,
    SubscribeSent,
}

/// The single in-flight registration or subscription.
#[derive(Debug, Clone)]
struct PendingRequest {
    topic_name: String<MAX_TOPIC_NAME_LENGTH>,
    msg_id: u16,
    retry_cnt: u8,
    phase: RequestPhase,
    topic_id: Option<u16>,
    origin: RequestOrigin,
}

/// Position of the provisioning walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    Idle,
    At {
        endpoint: Endpoint,
        service_type: ServiceType,
    },
    Done,
}

/// Progress report of an acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum SetupProgress {
    /// The walk continues; another request is in flight.
    InFlight,
    /// Every (endpoint, service type) pair has been committed.
    AllRegistered,
    /// The acknowledgment matched no in-flight request and was ignored.
    Stale,
}

/// Outcome of a timeout-triggered retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum RetryOutcome {
    /// The request was re-sent with an unchanged name and message id.
    Resent,
    /// The timeout matched no in-flight request and was ignored.
    Stale,
}

/// Sequencer of self-service registration and subscription.
#[derive(Debug)]
pub struct Registrar<const MAX_SERVICES: usize = DEFAULT_SERVICE_CAPACITY> {
    services: Vec<ServiceRecord, MAX_SERVICES>,
    pending: Option<PendingRequest>,
    cursor: Cursor,
    device_id: Option<DeviceId>,
    next_msg_id: u16,
    retry_limit: u8,
}

impl<const MAX_SERVICES: usize> Default for Registrar<MAX_SERVICES> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const MAX_SERVICES: usize> Registrar<MAX_SERVICES> {
    pub const fn new() -> Self {
        Self {
            services: Vec::new(),
            pending: None,
            cursor: Cursor::Idle,
            device_id: None,
            next_msg_id: 0,
            retry_limit: DEFAULT_RETRY_LIMIT,
        }
    }

    pub const fn with_retry_limit(retry_limit: u8) -> Self {
        Self {
            services: Vec::new(),
            pending: None,
            cursor: Cursor::Idle,
            device_id: None,
            next_msg_id: 0,
            retry_limit,
        }
    }

    /// Occupy the request slot for one (endpoint, service type) pair.
    ///
    /// Builds the derived topic name and allocates the next message id.
    /// Fails with [`Error::RequestPending`] while another request is in
    /// flight.
    pub fn create(
        &mut self,
        device_id: &DeviceId,
        endpoint: Endpoint,
        service_type: ServiceType,
    ) -> Result<()> {
        if self.pending.is_some() {
            return Err(Error::RequestPending);
        }

        let mut topic_name: String<MAX_TOPIC_NAME_LENGTH> = String::new();
        write!(
            &mut topic_name,
            "{}//{}//{}",
            device_id,
            endpoint.index(),
            service_type.topic_str()
        )
        .map_err(|_| Error::TopicNameTooLong {
            max: MAX_TOPIC_NAME_LENGTH,
            actual: device_id.as_str().len() + 5 + service_type.topic_str().len(),
        })?;

        let msg_id = self.alloc_msg_id();
        self.pending = Some(PendingRequest {
            topic_name,
            msg_id,
            retry_cnt: 0,
            phase: RequestPhase::Created,
            topic_id: None,
            origin: RequestOrigin::SelfService {
                endpoint,
                service_type,
            },
        });
        Ok(())
    }

    /// Occupy the request slot for an external topic name.
    ///
    /// Returns the allocated message id; the multiplexer stashes it as its
    /// acknowledgment correlation.
    pub fn create_external(&mut self, name: &ExternalName) -> Result<u16> {
        if self.pending.is_some() {
            return Err(Error::RequestPending);
        }

        let topic_name =
            String::try_from(name.as_str()).map_err(|_| Error::TopicNameTooLong {
                max: MAX_TOPIC_NAME_LENGTH,
                actual: name.as_str().len(),
            })?;
        let msg_id = self.alloc_msg_id();
        self.pending = Some(PendingRequest {
            topic_name,
            msg_id,
            retry_cnt: 0,
            phase: RequestPhase::Created,
            topic_id: None,
            origin: RequestOrigin::External,
        });
        Ok(msg_id)
    }

    /// Send the REGISTER for the request in the slot.
    pub fn register<T: Transport>(&mut self, session: &mut GatewaySession<T>) -> Result<()> {
        let Some(pending) = self.pending.as_mut() else {
            return Err(Error::NoPendingRequest);
        };
        session.register_topic(pending.topic_name.as_str(), pending.msg_id)?;
        pending.phase = RequestPhase::RegisterSent;
        Ok(())
    }

    /// Send the SUBSCRIBE for the request in the slot.
    pub fn subscribe<T: Transport>(&mut self, session: &mut GatewaySession<T>) -> Result<()> {
        let Some(pending) = self.pending.as_mut() else {
            return Err(Error::NoPendingRequest);
        };
        session.subscribe_topic(pending.topic_name.as_str(), pending.msg_id)?;
        pending.phase = RequestPhase::SubscribeSent;
        Ok(())
    }

    /// Reset volatile state and begin the provisioning walk.
    ///
    /// Creates and registers the first (endpoint, service type) pair; the
    /// rest of the walk is driven by acknowledgments.
    pub fn start<T: Transport>(
        &mut self,
        session: &mut GatewaySession<T>,
        device_id: DeviceId,
    ) -> Result<()> {
        self.reset();
        self.cursor = Cursor::At {
            endpoint: Endpoint::first(),
            service_type: ServiceType::first(),
        };
        self.create(&device_id, Endpoint::first(), ServiceType::first())?;
        self.device_id = Some(device_id);
        self.register(session)
    }

    /// Handle a REGACK: record the topic id and issue the SUBSCRIBE leg.
    ///
    /// A fresh message id is allocated for the subscribe exchange.
    pub fn on_registered<T: Transport>(
        &mut self,
        session: &mut GatewaySession<T>,
        msg_id: u16,
        topic_id: u16,
    ) -> Result<SetupProgress> {
        let matched = matches!(
            &self.pending,
            Some(p) if p.msg_id == msg_id && p.phase == RequestPhase::RegisterSent
        );
        if !matched {
            log::warn!("stale REGACK for message id {}", msg_id);
            return Ok(SetupProgress::Stale);
        }

        let new_msg_id = self.alloc_msg_id();
        if let Some(pending) = self.pending.as_mut() {
            pending.topic_id = Some(topic_id);
            pending.msg_id = new_msg_id;
        }
        self.subscribe(session)?;
        Ok(SetupProgress::InFlight)
    }

    /// Handle a SUBACK for a self-service pair: commit and advance the walk.
    ///
    /// A topic id differing from the one recorded at registration abandons
    /// the slot with [`Error::TopicIdMismatch`]; nothing is committed.
    pub fn on_subscribed<T: Transport>(
        &mut self,
        session: &mut GatewaySession<T>,
        msg_id: u16,
        topic_id: u16,
    ) -> Result<SetupProgress> {
        let matched = matches!(
            &self.pending,
            Some(p) if p.msg_id == msg_id
                && p.phase == RequestPhase::SubscribeSent
                && !matches!(p.origin, RequestOrigin::External)
        );
        if !matched {
            log::warn!("stale SUBACK for message id {}", msg_id);
            return Ok(SetupProgress::Stale);
        }

        let Some(pending) = self.pending.take() else {
            return Ok(SetupProgress::Stale);
        };
        if let Some(expected) = pending.topic_id {
            if expected != topic_id {
                return Err(Error::TopicIdMismatch {
                    expected,
                    actual: topic_id,
                });
            }
        }
        let RequestOrigin::SelfService {
            endpoint,
            service_type,
        } = pending.origin
        else {
            return Ok(SetupProgress::Stale);
        };

        self.services
            .push(ServiceRecord {
                endpoint,
                service_type,
                topic_id,
            })
            .map_err(|_| Error::ServiceDatabaseFull {
                capacity: MAX_SERVICES,
            })?;
        log::info!(
            "service committed: {} {} (topic id {})",
            endpoint,
            service_type,
            topic_id
        );
        self.advance(session)
    }

    /// Re-send a timed-out REGISTER.
    pub fn retry_register<T: Transport>(
        &mut self,
        session: &mut GatewaySession<T>,
        msg_id: u16,
    ) -> Result<RetryOutcome> {
        self.retry(session, msg_id, RequestPhase::RegisterSent)
    }

    /// Re-send a timed-out SUBSCRIBE.
    pub fn retry_subscribe<T: Transport>(
        &mut self,
        session: &mut GatewaySession<T>,
        msg_id: u16,
    ) -> Result<RetryOutcome> {
        self.retry(session, msg_id, RequestPhase::SubscribeSent)
    }

    /// Release the slot held by an external request after its SUBACK.
    pub fn complete_external(&mut self, msg_id: u16) -> Result<()> {
        let matched = matches!(
            &self.pending,
            Some(p) if p.msg_id == msg_id
                && p.phase == RequestPhase::SubscribeSent
                && matches!(p.origin, RequestOrigin::External)
        );
        if !matched {
            return Err(Error::CorrelationMismatch);
        }
        self.pending = None;
        Ok(())
    }

    /// The (endpoint, service type) pair the given message id is working on.
    pub fn lookup(&self, msg_id: u16) -> Option<(Endpoint, ServiceType)> {
        match &self.pending {
            Some(p) if p.msg_id == msg_id => match p.origin {
                RequestOrigin::SelfService {
                    endpoint,
                    service_type,
                } => Some((endpoint, service_type)),
                RequestOrigin::External => None,
            },
            _ => None,
        }
    }

    /// Committed service records, in commit order.
    pub fn records(&self) -> &[ServiceRecord] {
        &self.services
    }

    pub fn pending_msg_id(&self) -> Option<u16> {
        self.pending.as_ref().map(|p| p.msg_id)
    }

    pub fn pending_is_external(&self) -> bool {
        matches!(
            &self.pending,
            Some(p) if matches!(p.origin, RequestOrigin::External)
        )
    }

    /// Whether the provisioning walk has visited every pair.
    pub fn is_complete(&self) -> bool {
        matches!(self.cursor, Cursor::Done)
    }

    /// Drop all volatile state; the message id counter keeps running.
    pub fn reset(&mut self) {
        self.services.clear();
        self.pending = None;
        self.cursor = Cursor::Idle;
        self.device_id = None;
    }

    fn alloc_msg_id(&mut self) -> u16 {
        let msg_id = self.next_msg_id;
        self.next_msg_id = self.next_msg_id.wrapping_add(1);
        msg_id
    }

    /// Move the walk cursor to the next pair and kick off its exchange.
    fn advance<T: Transport>(&mut self, session: &mut GatewaySession<T>) -> Result<SetupProgress> {
        let Cursor::At {
            endpoint,
            service_type,
        } = self.cursor
        else {
            // Pair was driven outside the walk; nothing to advance.
            return Ok(SetupProgress::InFlight);
        };

        // Service type is the inner loop, endpoint the outer one.
        let next = match service_type.next() {
            Some(service_type) => Some((endpoint, service_type)),
            None => endpoint
                .next()
                .map(|endpoint| (endpoint, ServiceType::first())),
        };
        let Some((endpoint, service_type)) = next else {
            self.cursor = Cursor::Done;
            return Ok(SetupProgress::AllRegistered);
        };

        self.cursor = Cursor::At {
            endpoint,
            service_type,
        };
        let Some(device_id) = self.device_id.clone() else {
            log::error!("provisioning walk has no device identity");
            return Err(Error::NoPendingRequest);
        };
        self.create(&device_id, endpoint, service_type)?;
        self.register(session)?;
        Ok(SetupProgress::InFlight)
    }

    fn retry<T: Transport>(
        &mut self,
        session: &mut GatewaySession<T>,
        msg_id: u16,
        phase: RequestPhase,
    ) -> Result<RetryOutcome> {
        let matched = matches!(
            &self.pending,
            Some(p) if p.msg_id == msg_id && p.phase == phase
        );
        if !matched {
            log::warn!("stale timeout for message id {}", msg_id);
            return Ok(RetryOutcome::Stale);
        }

        let limit = self.retry_limit;
        let Some(pending) = self.pending.as_mut() else {
            return Ok(RetryOutcome::Stale);
        };
        pending.retry_cnt += 1;
        if pending.retry_cnt >= limit {
            self.pending = None;
            return Err(Error::RetryLimitExceeded { limit });
        }

        // Unchanged name and message id on the wire.
        match phase {
            RequestPhase::RegisterSent => {
                session.register_topic(pending.topic_name.as_str(), msg_id)?
            }
            _ => session.subscribe_topic(pending.topic_name.as_str(), msg_id)?,
        }
        Ok(RetryOutcome::Resent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{ENDPOINT_COUNT, SERVICE_TYPE_COUNT};
    use crate::transport::mock::{MockTransport, Sent};

    fn session() -> GatewaySession<MockTransport> {
        GatewaySession::new(MockTransport::new(), "nRF52840").unwrap()
    }

    fn device_id() -> DeviceId {
        DeviceId::try_from("s4t0dOpl8i2f").unwrap()
    }

    #[test]
    fn test_create_builds_derived_topic_name() {
        let mut session = session();
        let mut registrar: Registrar = Registrar::new();

        registrar
            .create(&device_id(), Endpoint::Button2, ServiceType::OnOff)
            .unwrap();
        registrar.register(&mut session).unwrap();

        let msg_id = registrar.pending_msg_id().unwrap();
        assert_eq!(
            session.transport().last(),
            Some(&Sent::Register {
                name: heapless::String::try_from("s4t0dOpl8i2f//2//onoff").unwrap(),
                msg_id,
            })
        );
    }

    #[test]
    fn test_create_rejects_second_request() {
        let mut registrar: Registrar = Registrar::new();
        registrar
            .create(&device_id(), Endpoint::Button0, ServiceType::Info)
            .unwrap();
        assert_eq!(
            registrar.create(&device_id(), Endpoint::Button1, ServiceType::Info),
            Err(Error::RequestPending)
        );
    }

    #[test]
    fn test_lookup_round_trip() {
        let mut registrar: Registrar = Registrar::new();
        registrar
            .create(&device_id(), Endpoint::Led1, ServiceType::ConfigList)
            .unwrap();
        let msg_id = registrar.pending_msg_id().unwrap();
        assert_eq!(
            registrar.lookup(msg_id),
            Some((Endpoint::Led1, ServiceType::ConfigList))
        );
        assert_eq!(registrar.lookup(msg_id.wrapping_add(1)), None);
    }

    #[test]
    fn test_register_ack_triggers_subscribe_and_commit() {
        let mut session = session();
        let mut registrar: Registrar = Registrar::new();

        registrar
            .create(&device_id(), Endpoint::Button2, ServiceType::OnOff)
            .unwrap();
        registrar.register(&mut session).unwrap();
        let register_id = registrar.pending_msg_id().unwrap();

        // REGACK with topic id 7 triggers the subscribe leg under a fresh id.
        let progress = registrar.on_registered(&mut session, register_id, 7).unwrap();
        assert_eq!(progress, SetupProgress::InFlight);
        let subscribe_id = registrar.pending_msg_id().unwrap();
        assert_ne!(subscribe_id, register_id);
        assert_eq!(
            session.transport().last(),
            Some(&Sent::Subscribe {
                name: heapless::String::try_from("s4t0dOpl8i2f//2//onoff").unwrap(),
                msg_id: subscribe_id,
            })
        );

        // Matching SUBACK commits the record.
        let progress = registrar.on_subscribed(&mut session, subscribe_id, 7).unwrap();
        assert_eq!(progress, SetupProgress::InFlight);
        assert_eq!(
            registrar.records(),
            &[ServiceRecord {
                endpoint: Endpoint::Button2,
                service_type: ServiceType::OnOff,
                topic_id: 7,
            }]
        );
        assert_eq!(registrar.pending_msg_id(), None);
    }

    #[test]
    fn test_suback_topic_id_mismatch_commits_nothing() {
        let mut session = session();
        let mut registrar: Registrar = Registrar::new();

        registrar
            .create(&device_id(), Endpoint::Button2, ServiceType::OnOff)
            .unwrap();
        registrar.register(&mut session).unwrap();
        let register_id = registrar.pending_msg_id().unwrap();
        let _ = registrar.on_registered(&mut session, register_id, 7).unwrap();
        let subscribe_id = registrar.pending_msg_id().unwrap();

        assert_eq!(
            registrar.on_subscribed(&mut session, subscribe_id, 8),
            Err(Error::TopicIdMismatch {
                expected: 7,
                actual: 8,
            })
        );
        assert!(registrar.records().is_empty());
        // The slot was abandoned; a new pair can be created.
        assert!(registrar
            .create(&device_id(), Endpoint::Button3, ServiceType::Info)
            .is_ok());
    }

    #[test]
    fn test_stale_acks_are_ignored() {
        let mut session = session();
        let mut registrar: Registrar = Registrar::new();

        registrar
            .create(&device_id(), Endpoint::Button0, ServiceType::Info)
            .unwrap();
        registrar.register(&mut session).unwrap();
        let msg_id = registrar.pending_msg_id().unwrap();

        let progress = registrar
            .on_registered(&mut session, msg_id.wrapping_add(9), 3)
            .unwrap();
        assert_eq!(progress, SetupProgress::Stale);
        assert_eq!(session.transport().subscribes(), 0);

        // A SUBACK before the subscribe leg is stale too.
        let progress = registrar.on_subscribed(&mut session, msg_id, 3).unwrap();
        assert_eq!(progress, SetupProgress::Stale);
        assert!(registrar.records().is_empty());
    }

    #[test]
    fn test_retry_limit_abandons_request() {
        let mut session = session();
        let mut registrar: Registrar = Registrar::new();

        registrar
            .create(&device_id(), Endpoint::Button0, ServiceType::Info)
            .unwrap();
        registrar.register(&mut session).unwrap();
        let msg_id = registrar.pending_msg_id().unwrap();

        for _ in 0..(DEFAULT_RETRY_LIMIT - 1) {
            let outcome = registrar.retry_register(&mut session, msg_id).unwrap();
            assert_eq!(outcome, RetryOutcome::Resent);
        }
        let sends_before = session.transport().registers();

        assert_eq!(
            registrar.retry_register(&mut session, msg_id),
            Err(Error::RetryLimitExceeded {
                limit: DEFAULT_RETRY_LIMIT,
            })
        );
        // No further send; the slot is free again.
        assert_eq!(session.transport().registers(), sends_before);
        assert_eq!(registrar.pending_msg_id(), None);
    }

    #[test]
    fn test_retry_keeps_message_id_and_name() {
        let mut session = session();
        let mut registrar: Registrar = Registrar::new();

        registrar
            .create(&device_id(), Endpoint::Button0, ServiceType::Info)
            .unwrap();
        registrar.register(&mut session).unwrap();
        let msg_id = registrar.pending_msg_id().unwrap();

        let _ = registrar.retry_register(&mut session, msg_id).unwrap();
        assert_eq!(
            session.transport().last(),
            Some(&Sent::Register {
                name: heapless::String::try_from("s4t0dOpl8i2f//0//info").unwrap(),
                msg_id,
            })
        );
    }

    #[test]
    fn test_stale_timeout_is_a_noop() {
        let mut session = session();
        let mut registrar: Registrar = Registrar::new();

        registrar
            .create(&device_id(), Endpoint::Button0, ServiceType::Info)
            .unwrap();
        registrar.register(&mut session).unwrap();
        let msg_id = registrar.pending_msg_id().unwrap();

        let outcome = registrar
            .retry_register(&mut session, msg_id.wrapping_add(1))
            .unwrap();
        assert_eq!(outcome, RetryOutcome::Stale);
        assert_eq!(session.transport().registers(), 1);
    }

    #[test]
    fn test_walk_visits_every_pair_once() {
        let mut session = session();
        let mut registrar: Registrar = Registrar::new();

        registrar.start(&mut session, device_id()).unwrap();

        let mut topic_id = 100u16;
        let progress = loop {
            let register_id = registrar.pending_msg_id().unwrap();
            let p = registrar
                .on_registered(&mut session, register_id, topic_id)
                .unwrap();
            assert_eq!(p, SetupProgress::InFlight);

            let subscribe_id = registrar.pending_msg_id().unwrap();
            let p = registrar
                .on_subscribed(&mut session, subscribe_id, topic_id)
                .unwrap();
            topic_id += 1;
            if p != SetupProgress::InFlight {
                break p;
            }
        };

        assert_eq!(progress, SetupProgress::AllRegistered);
        assert!(registrar.is_complete());
        assert_eq!(registrar.records().len(), ENDPOINT_COUNT * SERVICE_TYPE_COUNT);
        assert_eq!(
            session.transport().registers(),
            ENDPOINT_COUNT * SERVICE_TYPE_COUNT
        );
        assert_eq!(
            session.transport().subscribes(),
            ENDPOINT_COUNT * SERVICE_TYPE_COUNT
        );
        for endpoint in Endpoint::ALL {
            for service_type in ServiceType::ALL {
                let count = registrar
                    .records()
                    .iter()
                    .filter(|r| r.endpoint == endpoint && r.service_type == service_type)
                    .count();
                assert_eq!(count, 1, "{} {} visited once", endpoint, service_type);
            }
        }
    }

    #[test]
    fn test_walk_order_is_service_type_inner() {
        let mut session = session();
        let mut registrar: Registrar = Registrar::new();

        registrar.start(&mut session, device_id()).unwrap();

        for expected in [
            (Endpoint::Button0, ServiceType::Info),
            (Endpoint::Button0, ServiceType::OnOff),
        ] {
            let register_id = registrar.pending_msg_id().unwrap();
            assert_eq!(registrar.lookup(register_id), Some(expected));
            let _ = registrar
                .on_registered(&mut session, register_id, 9)
                .unwrap();
            let subscribe_id = registrar.pending_msg_id().unwrap();
            let _ = registrar
                .on_subscribed(&mut session, subscribe_id, 9)
                .unwrap();
        }
    }

    #[test]
    fn test_database_capacity_error() {
        let mut session = session();
        let mut registrar: Registrar<1> = Registrar::new();

        registrar.start(&mut session, device_id()).unwrap();

        let register_id = registrar.pending_msg_id().unwrap();
        let _ = registrar.on_registered(&mut session, register_id, 1).unwrap();
        let subscribe_id = registrar.pending_msg_id().unwrap();
        let _ = registrar.on_subscribed(&mut session, subscribe_id, 1).unwrap();

        let register_id = registrar.pending_msg_id().unwrap();
        let _ = registrar.on_registered(&mut session, register_id, 2).unwrap();
        let subscribe_id = registrar.pending_msg_id().unwrap();
        assert_eq!(
            registrar.on_subscribed(&mut session, subscribe_id, 2),
            Err(Error::ServiceDatabaseFull { capacity: 1 })
        );
    }
}
