//! Attendee address to principal resolution.

use std::sync::Arc;

use crate::address::CalendarAddress;
use crate::backend::{PrincipalDirectory, PrincipalRef};
use crate::error::ScheduleResult;

#[derive(Clone)]
pub struct PrincipalResolver {
    directory: Arc<dyn PrincipalDirectory>,
}

impl PrincipalResolver {
    pub fn new(directory: Arc<dyn PrincipalDirectory>) -> Self {
        PrincipalResolver { directory }
    }

    /// First principal the directory returns for `address`, in the
    /// directory's order.
    pub async fn resolve(&self, address: &CalendarAddress) -> ScheduleResult<Option<PrincipalRef>> {
        let normalized = CalendarAddress::new(address.normalized());
        if normalized.as_str().is_empty() {
            return Ok(None);
        }

        let matches = self.directory.principals_by_address(&normalized).await?;
        if matches.len() > 1 {
            tracing::debug!(
                address = %address,
                count = matches.len(),
                "Address matches several principals, using the first"
            );
        }

        Ok(matches.into_iter().next())
    }
}
