use super::{
    errors::{StateMachineError, StateMachineResult},
    events::InquiryEvent,
    states::InquiryState,
};
use uuid::Uuid;

/// Pure state machine governing an inquiry's status.
///
/// The machine is seeded with the status loaded from the relational store and
/// performs no I/O. Callers persist the destination state it computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InquiryStateMachine {
    inquiry_uuid: Uuid,
    current_state: InquiryState,
}

impl InquiryStateMachine {
    /// Create a state machine seeded with the inquiry's current status
    pub fn new(inquiry_uuid: Uuid, current_state: InquiryState) -> Self {
        Self {
            inquiry_uuid,
            current_state,
        }
    }

    pub fn inquiry_uuid(&self) -> Uuid {
        self.inquiry_uuid
    }

    pub fn current_state(&self) -> InquiryState {
        self.current_state
    }

    /// Attempt the event, moving the machine to the destination state on success.
    ///
    /// A rejected event leaves the machine untouched.
    pub fn transition(&mut self, event: InquiryEvent) -> StateMachineResult<InquiryState> {
        let target_state = Self::determine_target_state(self.current_state, event)?;

        tracing::debug!(
            inquiry_uuid = %self.inquiry_uuid,
            from = %self.current_state,
            to = %target_state,
            event = event.event_type(),
            "Inquiry transition accepted"
        );

        self.current_state = target_state;
        Ok(target_state)
    }

    /// Whether the event is legal from the current state
    pub fn can(&self, event: InquiryEvent) -> bool {
        Self::determine_target_state(self.current_state, event).is_ok()
    }

    /// Events legal from the current state
    pub fn available_events(&self) -> Vec<InquiryEvent> {
        InquiryEvent::ALL
            .into_iter()
            .filter(|event| self.can(*event))
            .collect()
    }

    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current_state: InquiryState,
        event: InquiryEvent,
    ) -> StateMachineResult<InquiryState> {
        use InquiryEvent::*;
        use InquiryState::*;

        let target = match (current_state, event) {
            (Inquiring, Pickup) => Asking,
            (Asking, Skip) => Inquiring,
            (Asking, AgreeToChat) => Chatting,
            (Chatting, RevertChat) => Inquiring,
            (Chatting, Book) => Booked,
            (Inquiring, InquiryEvent::Cancel) => Canceled,
            (Inquiring, Expire) => Expired,

            // Everything else, terminal and extended-flow states included, is rejected
            (from_state, event) => {
                return Err(StateMachineError::InvalidTransition {
                    entity: "inquiry",
                    from: from_state.to_string(),
                    event: event.to_string(),
                })
            }
        };

        Ok(target)
    }
}
