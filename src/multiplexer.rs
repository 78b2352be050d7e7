//! External subscription multiplexer
//!
//! Local endpoints ask to follow topics published by other nodes. The gateway
//! is subscribed at most once per topic name; endpoints asking for a name that
//! already has a group simply join it, with no wire traffic. Inbound content
//! is fanned out by resolving the publish topic id to the group's endpoints.

use heapless::Vec;

use crate::endpoint::{Endpoint, ExternalName, ENDPOINT_COUNT};
use crate::error::{Error, Result};
use crate::registrar::Registrar;
use crate::session::GatewaySession;
use crate::transport::Transport;

/// Default capacity of the external topic group table.
pub const DEFAULT_GROUP_CAPACITY: usize = 20;

/// Default number of external subscriptions one endpoint may hold.
pub const DEFAULT_SUBS_PER_ENDPOINT: usize = 8;

/// One externally subscribed topic and the endpoints following it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicGroup {
    pub name: ExternalName,
    pub topic_id: u16,
    pub endpoints: Vec<Endpoint, ENDPOINT_COUNT>,
}

/// How a subscribe call was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum SubscribeOutcome {
    /// The name already had a group; the endpoint joined it locally.
    Joined,
    /// A gateway subscription was issued; the group forms on its SUBACK.
    Requested,
}

/// Outcome of an external subscribe acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum AckOutcome {
    /// The group was created and the originating endpoint enrolled.
    Completed,
    /// The acknowledgment matched no outstanding request and was ignored.
    Stale,
}

/// The subscribe request currently on the wire.
#[derive(Debug, Clone)]
struct PendingExternal {
    name: ExternalName,
    msg_id: u16,
    endpoint: Endpoint,
}

/// Fan-out table of external subscriptions.
#[derive(Debug)]
pub struct SubscriptionMux<
    const MAX_GROUPS: usize = DEFAULT_GROUP_CAPACITY,
    const MAX_SUBS_PER_ENDPOINT: usize = DEFAULT_SUBS_PER_ENDPOINT,
> {
    groups: Vec<TopicGroup, MAX_GROUPS>,
    per_endpoint: [Vec<ExternalName, MAX_SUBS_PER_ENDPOINT>; ENDPOINT_COUNT],
    pending: Option<PendingExternal>,
}

impl<const MAX_GROUPS: usize, const MAX_SUBS_PER_ENDPOINT: usize> Default
    for SubscriptionMux<MAX_GROUPS, MAX_SUBS_PER_ENDPOINT>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<const MAX_GROUPS: usize, const MAX_SUBS_PER_ENDPOINT: usize>
    SubscriptionMux<MAX_GROUPS, MAX_SUBS_PER_ENDPOINT>
{
    pub const fn new() -> Self {
        Self {
            groups: Vec::new(),
            per_endpoint: [const { Vec::new() }; ENDPOINT_COUNT],
            pending: None,
        }
    }

    /// Subscribe an endpoint to an external topic name.
    ///
    /// An existing group is joined with no gateway traffic. A new name goes
    /// through the registrar's single request slot, so the call fails with
    /// [`Error::RequestPending`] while any other exchange is in flight.
    pub fn subscribe<T: Transport, const MAX_SERVICES: usize>(
        &mut self,
        registrar: &mut Registrar<MAX_SERVICES>,
        session: &mut GatewaySession<T>,
        endpoint: Endpoint,
        raw_name: &str,
    ) -> Result<SubscribeOutcome> {
        let name = ExternalName::try_from(raw_name)?;

        if let Some(group) = self.groups.iter_mut().find(|g| g.name == name) {
            if group.endpoints.contains(&endpoint) {
                return Err(Error::DuplicateSubscription { endpoint });
            }
            let list = &mut self.per_endpoint[endpoint.index() as usize];
            list.push(name.clone())
                .map_err(|_| Error::SubscriptionListFull {
                    endpoint,
                    capacity: MAX_SUBS_PER_ENDPOINT,
                })?;
            // Set semantics hold: membership was checked above.
            group
                .endpoints
                .push(endpoint)
                .map_err(|_| Error::DuplicateSubscription { endpoint })?;
            log::info!("{} joined existing group for {}", endpoint, name);
            return Ok(SubscribeOutcome::Joined);
        }

        // Precheck capacities before touching the gateway.
        if self.groups.is_full() {
            return Err(Error::TopicGroupsFull {
                capacity: MAX_GROUPS,
            });
        }
        if self.per_endpoint[endpoint.index() as usize].is_full() {
            return Err(Error::SubscriptionListFull {
                endpoint,
                capacity: MAX_SUBS_PER_ENDPOINT,
            });
        }
        if self.pending.is_some() {
            return Err(Error::RequestPending);
        }

        let msg_id = registrar.create_external(&name)?;
        registrar.subscribe(session)?;
        log::info!("external subscribe sent for {} (message id {})", name, msg_id);
        self.pending = Some(PendingExternal {
            name,
            msg_id,
            endpoint,
        });
        Ok(SubscribeOutcome::Requested)
    }

    /// Complete an external subscription on its SUBACK.
    ///
    /// The message id must match both the stashed correlation and the
    /// registrar's slot; registrar disagreement surfaces as
    /// [`Error::CorrelationMismatch`].
    pub fn on_subscribe_ack<const MAX_SERVICES: usize>(
        &mut self,
        registrar: &mut Registrar<MAX_SERVICES>,
        msg_id: u16,
        topic_id: u16,
    ) -> Result<AckOutcome> {
        let matched = matches!(&self.pending, Some(p) if p.msg_id == msg_id);
        if !matched {
            log::warn!("stale external SUBACK for message id {}", msg_id);
            return Ok(AckOutcome::Stale);
        }
        registrar.complete_external(msg_id)?;

        let Some(pending) = self.pending.take() else {
            return Ok(AckOutcome::Stale);
        };
        let list = &mut self.per_endpoint[pending.endpoint.index() as usize];
        list.push(pending.name.clone())
            .map_err(|_| Error::SubscriptionListFull {
                endpoint: pending.endpoint,
                capacity: MAX_SUBS_PER_ENDPOINT,
            })?;

        let mut endpoints = Vec::new();
        // Cannot fail: the vec is empty and sized for all endpoints.
        let _ = endpoints.push(pending.endpoint);
        self.groups
            .push(TopicGroup {
                name: pending.name,
                topic_id,
                endpoints,
            })
            .map_err(|_| Error::TopicGroupsFull {
                capacity: MAX_GROUPS,
            })?;
        log::info!("external group formed under topic id {}", topic_id);
        Ok(AckOutcome::Completed)
    }

    /// Drop the in-flight correlation after the underlying request was
    /// abandoned.
    pub fn abandon(&mut self) {
        if let Some(pending) = self.pending.take() {
            log::warn!("external subscribe to {} abandoned", pending.name);
        }
    }

    /// Endpoints following the group registered under the given topic id.
    pub fn endpoints_for(&self, topic_id: u16) -> Option<&[Endpoint]> {
        self.groups
            .iter()
            .find(|g| g.topic_id == topic_id)
            .map(|g| g.endpoints.as_slice())
    }

    pub fn is_subscribed(&self, endpoint: Endpoint, name: &ExternalName) -> bool {
        self.per_endpoint[endpoint.index() as usize].contains(name)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Whether an external subscribe is awaiting its acknowledgment.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop all groups, personal lists and the correlation.
    pub fn reset(&mut self) {
        self.groups.clear();
        for list in &mut self.per_endpoint {
            list.clear();
        }
        self.pending = None;
    }
}
