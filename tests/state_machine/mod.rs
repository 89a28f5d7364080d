//! State machine tests: transition tables and guard properties.

mod inquiry_transitions;
