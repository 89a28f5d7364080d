//! Reconciliation Scheduler Tests
//!
//! Scans are invoked directly with an explicit `now`; the scheduler loop
//! itself is exercised with a short tick.

mod inquiry_expiry;
mod unpaid_service;
