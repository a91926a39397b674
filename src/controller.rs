//! Request coalescing
//!
//! At most one query runs at a time. While it runs, newer viewports overwrite
//! a single pending slot instead of queuing, so a burst of scroll events
//! costs one query for the last position rather than one per event.
//!
//! ```text
//!            submit (differs from served)
//!   Idle ─────────────────────────────────► Busy
//!    ▲                                        │ submit: overwrite latest_wanted
//!    │   complete: absorb, then dispatch      │
//!    └──────── latest_wanted if it differs ◄──┘
//! ```

use crate::commands::Cmd;
use crate::query::{Answer, QueryError, QueryOutcome, Request};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Busy,
}

/// Counters for tests and debug logging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerStats {
    pub dispatched: u64,
    pub served: u64,
    pub failed: u64,
    /// Requests dropped from the pending slot before running
    pub superseded: u64,
}

#[derive(Debug, Default)]
pub struct RequestController {
    in_flight: Option<Request>,
    latest_wanted: Option<Request>,
    last_request: Option<Request>,
    last_answer: Option<Answer>,
    /// Displaced answer whose buffers the next query reuses
    spare: Option<Answer>,
    last_error: Option<(Request, QueryError)>,
    /// The served answer must be recomputed even if the viewport is unchanged
    invalidated: bool,
    /// `invalidate` arrived while a query was running
    refresh_pending: bool,
    stats: ControllerStats,
}

impl RequestController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ControllerState {
        if self.in_flight.is_some() {
            ControllerState::Busy
        } else {
            ControllerState::Idle
        }
    }

    pub fn is_busy(&self) -> bool {
        self.state() == ControllerState::Busy
    }

    pub fn in_flight(&self) -> Option<&Request> {
        self.in_flight.as_ref()
    }

    pub fn latest_wanted(&self) -> Option<&Request> {
        self.latest_wanted.as_ref()
    }

    /// Request the current answer was computed for
    pub fn last_request(&self) -> Option<&Request> {
        self.last_request.as_ref()
    }

    /// Last good answer; survives failed queries
    pub fn answer(&self) -> Option<&Answer> {
        self.last_answer.as_ref()
    }

    pub fn last_error(&self) -> Option<&QueryError> {
        self.last_error.as_ref().map(|(_, e)| e)
    }

    pub fn stats(&self) -> ControllerStats {
        self.stats
    }

    fn differs_from_served(&self, request: &Request) -> bool {
        self.invalidated || self.last_request.as_ref() != Some(request)
    }

    fn dispatch(&mut self, request: Request) -> Cmd {
        self.in_flight = Some(request.clone());
        self.stats.dispatched += 1;
        tracing::debug!("Dispatching query {:?}+{}", request.anchor, request.offset);
        Cmd::RunQuery {
            request,
            scratch: self.spare.take().unwrap_or_default(),
        }
    }

    /// A new desired viewport
    pub fn submit(&mut self, request: Request) -> Option<Cmd> {
        if self.is_busy() {
            if self.in_flight.as_ref() == Some(&request) {
                // Back to what is already running
                if self.latest_wanted.take().is_some() {
                    self.stats.superseded += 1;
                }
                return None;
            }
            if let Some(previous) = self.latest_wanted.replace(request) {
                self.stats.superseded += 1;
                tracing::debug!("Superseded pending query {:?}", previous.anchor);
            }
            return None;
        }

        if !self.differs_from_served(&request) {
            return None;
        }
        Some(self.dispatch(request))
    }

    /// The in-flight query finished
    pub fn complete(&mut self, outcome: QueryOutcome) -> Option<Cmd> {
        if self.in_flight.take().is_none() {
            tracing::warn!("Query result arrived with nothing in flight");
            return None;
        }
        let QueryOutcome { request, result } = outcome;

        let next = match result {
            Ok(answer) => {
                self.stats.served += 1;
                self.last_error = None;
                if let Some(old) = self.last_answer.replace(answer) {
                    self.spare = Some(old);
                }
                self.last_request = Some(request);
                self.invalidated = std::mem::take(&mut self.refresh_pending);

                let wanted = self.latest_wanted.take().or_else(|| {
                    self.invalidated
                        .then(|| self.last_request.clone())
                        .flatten()
                });
                wanted.filter(|r| self.differs_from_served(r))
            }
            Err(error) => {
                self.stats.failed += 1;
                tracing::warn!("Query {:?} failed: {}", request.anchor, error);
                let refresh = std::mem::take(&mut self.refresh_pending);
                self.invalidated |= refresh;
                // A refresh that arrived meanwhile still applies to the
                // answer on screen
                let wanted = self
                    .latest_wanted
                    .take()
                    .filter(|r| *r != request && self.differs_from_served(r))
                    .or_else(|| refresh.then(|| self.last_request.clone()).flatten());
                self.last_error = Some((request, error));
                wanted
            }
        };

        match next {
            Some(request) => Some(Cmd::batch(vec![Cmd::Redraw, self.dispatch(request)])),
            None => Some(Cmd::Redraw),
        }
    }

    /// Recompute the current viewport even though it has not changed
    pub fn invalidate(&mut self) -> Option<Cmd> {
        if self.is_busy() {
            self.refresh_pending = true;
            return None;
        }
        self.invalidated = true;
        let request = self
            .latest_wanted
            .take()
            .or_else(|| self.last_request.clone())?;
        Some(self.dispatch(request))
    }
}
