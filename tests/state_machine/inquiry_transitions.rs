use proptest::prelude::*;
use rendezvous_core::state_machine::{
    InquiryEvent, InquiryState, InquiryStateMachine, StateMachineError,
};
use uuid::Uuid;

/// Every accepted (state, event) pair and its destination
const ACCEPTED: [(InquiryState, InquiryEvent, InquiryState); 7] = [
    (InquiryState::Inquiring, InquiryEvent::Pickup, InquiryState::Asking),
    (InquiryState::Asking, InquiryEvent::Skip, InquiryState::Inquiring),
    (InquiryState::Asking, InquiryEvent::AgreeToChat, InquiryState::Chatting),
    (InquiryState::Chatting, InquiryEvent::RevertChat, InquiryState::Inquiring),
    (InquiryState::Chatting, InquiryEvent::Book, InquiryState::Booked),
    (InquiryState::Inquiring, InquiryEvent::Cancel, InquiryState::Canceled),
    (InquiryState::Inquiring, InquiryEvent::Expire, InquiryState::Expired),
];

fn expected(state: InquiryState, event: InquiryEvent) -> Option<InquiryState> {
    ACCEPTED
        .iter()
        .find(|(from, on, _)| *from == state && *on == event)
        .map(|(_, _, to)| *to)
}

fn any_state() -> impl Strategy<Value = InquiryState> {
    prop::sample::select(InquiryState::ALL.to_vec())
}

fn any_event() -> impl Strategy<Value = InquiryEvent> {
    prop::sample::select(InquiryEvent::ALL.to_vec())
}

proptest! {
    /// Property: the machine accepts exactly the pairs in the table
    #[test]
    fn transition_matches_table(state in any_state(), event in any_event()) {
        let mut machine = InquiryStateMachine::new(Uuid::new_v4(), state);
        let result = machine.transition(event);

        match expected(state, event) {
            Some(target) => {
                prop_assert_eq!(result, Ok(target));
                prop_assert_eq!(machine.current_state(), target);
            }
            None => {
                let is_invalid = matches!(result, Err(StateMachineError::InvalidTransition { .. }));
                prop_assert!(is_invalid);
                prop_assert_eq!(machine.current_state(), state);
            }
        }
    }

    /// Property: any event sequence only ever visits reachable states and
    /// never leaves a terminal one
    #[test]
    fn terminal_states_are_absorbing(events in prop::collection::vec(any_event(), 1..20)) {
        let mut machine = InquiryStateMachine::new(Uuid::new_v4(), InquiryState::Inquiring);
        for event in events {
            let before = machine.current_state();
            let accepted = machine.transition(event).is_ok();
            if before.is_terminal() {
                prop_assert!(!accepted);
                prop_assert_eq!(machine.current_state(), before);
            }
            prop_assert_ne!(machine.current_state(), InquiryState::WaitForInquirerApprove);
        }
    }
}

#[test]
fn test_available_events_follow_table() {
    for state in InquiryState::ALL {
        let machine = InquiryStateMachine::new(Uuid::new_v4(), state);
        let mut available = machine.available_events();
        let mut from_table: Vec<InquiryEvent> = ACCEPTED
            .iter()
            .filter(|(from, _, _)| *from == state)
            .map(|(_, event, _)| *event)
            .collect();
        available.sort_by_key(|event| event.event_type());
        from_table.sort_by_key(|event| event.event_type());
        assert_eq!(available, from_table, "events available from {state}");
    }
}

#[test]
fn test_only_open_inquiries_expire() {
    for state in InquiryState::ALL {
        let result = InquiryStateMachine::determine_target_state(state, InquiryEvent::Expire);
        if state == InquiryState::Inquiring {
            assert_eq!(result, Ok(InquiryState::Expired));
        } else {
            assert!(result.is_err(), "{state} must not expire");
        }
    }
}
