use super::errors::{actor_not_permitted, business_rule_violation, GuardResult};
use crate::models::{Inquiry, Service, User, UserRole};

/// Trait for implementing actor guards checked before a transition is attempted.
///
/// Guards are pure: they only look at the loaded entity and the acting user.
pub trait StateGuard<T> {
    /// Check if `actor` may drive the transition on `entity`
    fn check(&self, entity: &T, actor: &User) -> GuardResult<()>;

    /// Get a description of this guard for logging
    fn description(&self) -> &'static str;
}

/// Only the requester who raised the inquiry
pub struct RequesterOnlyGuard;

impl StateGuard<Inquiry> for RequesterOnlyGuard {
    fn check(&self, inquiry: &Inquiry, actor: &User) -> GuardResult<()> {
        if inquiry.inquirer_id != actor.user_id {
            return Err(actor_not_permitted(
                actor.user_uuid,
                format!("act as requester of inquiry {}", inquiry.inquiry_uuid),
            ));
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Actor must be the inquiry's requester"
    }
}

/// Only the provider currently holding the inquiry
pub struct PickerOnlyGuard;

impl StateGuard<Inquiry> for PickerOnlyGuard {
    fn check(&self, inquiry: &Inquiry, actor: &User) -> GuardResult<()> {
        if inquiry.picker_id != Some(actor.user_id) {
            return Err(actor_not_permitted(
                actor.user_uuid,
                format!("act as picker of inquiry {}", inquiry.inquiry_uuid),
            ));
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Actor must be the inquiry's picker"
    }
}

/// Requester or picker
pub struct InquiryPartyGuard;

impl StateGuard<Inquiry> for InquiryPartyGuard {
    fn check(&self, inquiry: &Inquiry, actor: &User) -> GuardResult<()> {
        if !inquiry.is_party(actor.user_id) {
            return Err(actor_not_permitted(
                actor.user_uuid,
                format!("act on inquiry {}", inquiry.inquiry_uuid),
            ));
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Actor must be a party of the inquiry"
    }
}

/// A provider other than the requester
pub struct EligiblePickerGuard;

impl StateGuard<Inquiry> for EligiblePickerGuard {
    fn check(&self, inquiry: &Inquiry, actor: &User) -> GuardResult<()> {
        if actor.role != UserRole::Provider {
            return Err(actor_not_permitted(actor.user_uuid, "pick up inquiries"));
        }
        if inquiry.inquirer_id == actor.user_id {
            return Err(business_rule_violation(format!(
                "User {} cannot pick up their own inquiry",
                actor.user_uuid
            )));
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Actor must be a provider other than the requester"
    }
}

/// Only the paying customer of a service
pub struct CustomerOnlyGuard;

impl StateGuard<Service> for CustomerOnlyGuard {
    fn check(&self, service: &Service, actor: &User) -> GuardResult<()> {
        if service.customer_id != actor.user_id {
            return Err(actor_not_permitted(
                actor.user_uuid,
                format!("act as customer of service {}", service.service_uuid),
            ));
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Actor must be the service's customer"
    }
}

/// Customer or provider
pub struct ServicePartyGuard;

impl StateGuard<Service> for ServicePartyGuard {
    fn check(&self, service: &Service, actor: &User) -> GuardResult<()> {
        if !service.is_party(actor.user_id) {
            return Err(actor_not_permitted(
                actor.user_uuid,
                format!("act on service {}", service.service_uuid),
            ));
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Actor must be a party of the service"
    }
}
