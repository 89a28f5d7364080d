use super::{
    errors::{StateMachineError, StateMachineResult},
    events::ServiceEvent,
    states::ServiceState,
};
use uuid::Uuid;

/// Pure state machine governing a booked service's status.
///
/// The transition graph is acyclic, so no event can re-enter a state the
/// service has already left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceStateMachine {
    service_uuid: Uuid,
    current_state: ServiceState,
}

impl ServiceStateMachine {
    /// Create a state machine seeded with the service's current status
    pub fn new(service_uuid: Uuid, current_state: ServiceState) -> Self {
        Self {
            service_uuid,
            current_state,
        }
    }

    pub fn service_uuid(&self) -> Uuid {
        self.service_uuid
    }

    pub fn current_state(&self) -> ServiceState {
        self.current_state
    }

    /// Attempt the event, moving the machine to the destination state on success
    pub fn transition(&mut self, event: ServiceEvent) -> StateMachineResult<ServiceState> {
        let target_state = Self::determine_target_state(self.current_state, event)?;

        tracing::debug!(
            service_uuid = %self.service_uuid,
            from = %self.current_state,
            to = %target_state,
            event = event.event_type(),
            "Service transition accepted"
        );

        self.current_state = target_state;
        Ok(target_state)
    }

    pub fn can(&self, event: ServiceEvent) -> bool {
        Self::determine_target_state(self.current_state, event).is_ok()
    }

    pub fn available_events(&self) -> Vec<ServiceEvent> {
        ServiceEvent::ALL
            .into_iter()
            .filter(|event| self.can(*event))
            .collect()
    }

    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current_state: ServiceState,
        event: ServiceEvent,
    ) -> StateMachineResult<ServiceState> {
        use ServiceEvent::*;
        use ServiceState::*;

        let target = match (current_state, event) {
            (Negotiating, Book) => Unpaid,
            (Negotiating, Abandon) => ServiceState::Canceled,
            (Unpaid, Paid) => ToBeFulfilled,
            (Unpaid, PayFailed) => PaymentFailed,
            (ToBeFulfilled, Cancel) => ServiceState::Canceled,
            (ToBeFulfilled, StartService) => Fulfilling,
            (ToBeFulfilled, ServiceEvent::Expired) => ServiceState::Expired,
            (Fulfilling, Complete) => Completed,

            (from_state, event) => {
                return Err(StateMachineError::InvalidTransition {
                    entity: "service",
                    from: from_state.to_string(),
                    event: event.to_string(),
                })
            }
        };

        Ok(target)
    }
}
