//! Orchestration of a free/busy scheduling POST.
//!
//! A request is declined (`Ok(None)`) when it is not iCalendar data or not
//! aimed at an outbox, rejected (`Err`) when validation fails, and otherwise
//! always answered with one outcome per attendee. Attendees are processed
//! concurrently up to `max_concurrency`, each under its own timeout and the
//! shared request deadline. Only the owner of an outbox may post to it.

use std::sync::Arc;

use chrono::Utc;
use futures::{FutureExt, StreamExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::address::CalendarAddress;
use crate::backend::{Collaborators, NodeKind, PrincipalRef, ResourceTree};
use crate::calculator::FreeBusyCalculator;
use crate::config::DispatchLimits;
use crate::error::{RequestError, ScheduleError, ScheduleResult};
use crate::locator::{Located, ResourceLocator};
use crate::outcome::{AttendeeOutcome, AttendeeStatus, FreeBusyData};
use crate::principal::PrincipalResolver;
use crate::request::{SchedulingRequest, is_calendar_media_type, parse_request};
use crate::response::{ScheduleResponse, assemble_response};
use crate::time_range::TimeRange;

/// A POST as seen by the engine.
#[derive(Debug, Clone, Copy)]
pub struct OutboxPost<'a> {
    pub path: &'a str,
    pub content_type: &'a str,
    pub body: &'a str,
    /// The authenticated caller.
    pub requester: &'a PrincipalRef,
}

pub struct Dispatcher {
    tree: Arc<dyn ResourceTree>,
    resolver: PrincipalResolver,
    locator: ResourceLocator,
    calculator: FreeBusyCalculator,
    limits: DispatchLimits,
}

impl Dispatcher {
    pub fn new(collaborators: Collaborators, limits: DispatchLimits) -> Self {
        Dispatcher {
            tree: collaborators.tree,
            resolver: PrincipalResolver::new(collaborators.directory),
            locator: ResourceLocator::new(collaborators.properties, collaborators.authorizer),
            calculator: FreeBusyCalculator::new(collaborators.store),
            limits,
        }
    }

    pub fn limits(&self) -> &DispatchLimits {
        &self.limits
    }

    pub async fn handle_post(
        &self,
        post: &OutboxPost<'_>,
        cancel: CancellationToken,
    ) -> Result<Option<ScheduleResponse>, RequestError> {
        if !is_calendar_media_type(post.content_type) {
            tracing::debug!(content_type = post.content_type, "Declining non-calendar POST");
            return Ok(None);
        }

        match self.tree.node_kind(post.path).await? {
            Some(NodeKind::Outbox { owner }) if owner == *post.requester => {}
            Some(NodeKind::Outbox { owner }) => {
                tracing::debug!(requester = %post.requester, owner = %owner, "Refusing POST to another principal's outbox");
                return Err(RequestError::NotOutboxOwner);
            }
            other => {
                tracing::debug!(path = post.path, node = ?other, "Declining POST to a non-outbox resource");
                return Ok(None);
            }
        }

        let parsed = parse_request(post.body)?;
        let requester_addresses = self.locator.address_set(post.requester).await?;
        let request = parsed.validate(&requester_addresses)?;

        tracing::debug!(
            requester = %post.requester,
            organizer = %request.organizer,
            attendees = request.attendees.len(),
            "Accepted free/busy request"
        );

        let outcomes = self.collect_outcomes(&request, post.requester, &cancel).await;

        if cancel.is_cancelled() {
            return Err(RequestError::Backend(ScheduleError::Cancelled));
        }

        Ok(Some(assemble_response(&request, outcomes, Utc::now())))
    }

    /// Outcomes in attendee order. At most `max_concurrency` pipelines run at
    /// once; a finished pipeline frees its slot immediately, even while an
    /// earlier attendee is still running.
    async fn collect_outcomes(
        &self,
        request: &SchedulingRequest,
        requester: &PrincipalRef,
        cancel: &CancellationToken,
    ) -> Vec<AttendeeOutcome> {
        let deadline = Instant::now() + self.limits.request_deadline;

        let pipelines: Vec<_> = request
            .attendees
            .iter()
            .enumerate()
            .map(|(index, address)| {
                async move {
                    let outcome = self
                        .attendee_outcome(address, requester, &request.range, deadline, cancel)
                        .await;
                    (index, outcome)
                }
                .boxed()
            })
            .collect();

        let mut outcomes: Vec<(usize, AttendeeOutcome)> = futures::stream::iter(pipelines)
            .buffer_unordered(self.limits.max_concurrency)
            .collect()
            .await;

        outcomes.sort_by_key(|(index, _)| *index);
        outcomes.into_iter().map(|(_, outcome)| outcome).collect()
    }

    async fn attendee_outcome(
        &self,
        address: &CalendarAddress,
        requester: &PrincipalRef,
        range: &TimeRange,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> AttendeeOutcome {
        let pipeline = self.attendee_status(address, requester, range);

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => AttendeeStatus::OtherFailure("cancelled".to_string()),
            _ = tokio::time::sleep_until(deadline) => {
                tracing::warn!(attendee = %address, "Request deadline reached before attendee finished");
                AttendeeStatus::OtherFailure("timeout".to_string())
            }
            result = tokio::time::timeout(self.limits.attendee_timeout, pipeline) => match result {
                Ok(Ok(status)) => status,
                Ok(Err(e)) => {
                    tracing::warn!(attendee = %address, error = %e, "Free/busy lookup failed");
                    AttendeeStatus::OtherFailure(e.to_string())
                }
                Err(_) => {
                    tracing::warn!(
                        attendee = %address,
                        timeout = ?self.limits.attendee_timeout,
                        "Free/busy lookup timed out"
                    );
                    AttendeeStatus::OtherFailure("timeout".to_string())
                }
            },
        };

        tracing::debug!(attendee = %address, status = status.label(), "Attendee processed");

        AttendeeOutcome {
            address: address.clone(),
            status,
        }
    }

    /// Resolve, locate, compute.
    async fn attendee_status(
        &self,
        address: &CalendarAddress,
        requester: &PrincipalRef,
        range: &TimeRange,
    ) -> ScheduleResult<AttendeeStatus> {
        let Some(principal) = self.resolver.resolve(address).await? else {
            return Ok(AttendeeStatus::PrincipalNotFound);
        };

        let resources = match self.locator.locate(requester, &principal).await? {
            Located::Found(resources) => resources,
            Located::NoCalendarHome => return Ok(AttendeeStatus::NoCalendarHome),
            Located::NoInbox => return Ok(AttendeeStatus::NoInboxFound),
        };

        let windows = match &resources.availability {
            Some(document) => document.windows(range)?,
            None => Vec::new(),
        };

        let intervals = self
            .calculator
            .compute(&resources.calendar_home, range, &windows)
            .await?;

        Ok(AttendeeStatus::Success(FreeBusyData {
            range: *range,
            intervals,
        }))
    }
}
