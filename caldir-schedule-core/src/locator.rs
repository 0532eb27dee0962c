//! Discovery of a principal's scheduling resources.

use std::sync::Arc;

use crate::access::{AccessDecision, Authorizer};
use crate::availability::AvailabilityDocument;
use crate::backend::{PrincipalRef, PropertyName, PropertySource, PropertyStatus, PropertyValue};
use crate::error::ScheduleResult;

const SCHEDULING_PROPERTIES: [PropertyName; 3] = [
    PropertyName::CalendarHomeSet,
    PropertyName::ScheduleInboxUrl,
    PropertyName::CalendarAvailability,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulingResources {
    pub calendar_home: String,
    pub inbox: String,
    pub availability: Option<AvailabilityDocument>,
}

/// Outcome of a lookup that itself succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Located {
    Found(SchedulingResources),
    NoCalendarHome,
    NoInbox,
}

#[derive(Clone)]
pub struct ResourceLocator {
    properties: Arc<dyn PropertySource>,
    authorizer: Arc<dyn Authorizer>,
}

impl ResourceLocator {
    pub fn new(properties: Arc<dyn PropertySource>, authorizer: Arc<dyn Authorizer>) -> Self {
        ResourceLocator {
            properties,
            authorizer,
        }
    }

    /// One batched property-find for home, inbox and availability.
    ///
    /// A target the requester may not see is reported like one whose
    /// properties are hidden: no calendar home.
    pub async fn locate(
        &self,
        requester: &PrincipalRef,
        principal: &PrincipalRef,
    ) -> ScheduleResult<Located> {
        if self.authorizer.authorize(requester, principal) == AccessDecision::Deny {
            tracing::debug!(%requester, target = %principal, "Free/busy access denied");
            return Ok(Located::NoCalendarHome);
        }

        let mut found = self
            .properties
            .fetch_properties(principal, &SCHEDULING_PROPERTIES)
            .await?;

        let Some(calendar_home) = take_href(&mut found, PropertyName::CalendarHomeSet) else {
            return Ok(Located::NoCalendarHome);
        };
        let Some(inbox) = take_href(&mut found, PropertyName::ScheduleInboxUrl) else {
            return Ok(Located::NoInbox);
        };

        let availability = match found.remove(&PropertyName::CalendarAvailability) {
            Some(PropertyStatus::Found(PropertyValue::Text(text))) if !text.trim().is_empty() => {
                Some(AvailabilityDocument::new(text))
            }
            _ => None,
        };

        Ok(Located::Found(SchedulingResources {
            calendar_home,
            inbox,
            availability,
        }))
    }

    /// The principal's `calendar-user-address-set`; empty when absent or hidden.
    pub async fn address_set(&self, principal: &PrincipalRef) -> ScheduleResult<Vec<String>> {
        let mut found = self
            .properties
            .fetch_properties(principal, &[PropertyName::CalendarUserAddressSet])
            .await?;

        Ok(match found.remove(&PropertyName::CalendarUserAddressSet) {
            Some(PropertyStatus::Found(PropertyValue::Hrefs(hrefs))) => hrefs,
            Some(PropertyStatus::Found(PropertyValue::Text(text))) => vec![text],
            _ => Vec::new(),
        })
    }
}

fn take_href(
    found: &mut crate::backend::PropertyMap,
    name: PropertyName,
) -> Option<String> {
    match found.remove(&name) {
        Some(PropertyStatus::Found(value)) => value.first_href().map(str::to_string),
        _ => None,
    }
}
