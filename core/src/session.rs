//! Session state for one interactive operator.
//!
//! # Design
//! The session owns the configuration and a single result slot. Starting an
//! action throws away whatever was displayed before and hands out a ticket;
//! only a response carrying the current ticket may fill the slot, so a slow
//! answer to an abandoned action can never overwrite a newer one. The
//! underlying network call is not aborted, its result is simply dropped.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::client::{build_request, effective_timeout, ApiClient};
use crate::config::Configuration;
use crate::error::{ApiError, ConfigError};
use crate::http::{HttpRequest, HttpResponse};
use crate::interpret::interpret;
use crate::operation::{ExpectedKind, Operation};
use crate::transport::{Transport, UreqTransport};
use crate::types::{Artifact, OperationResult, Payload, UserRecord};

/// Identifies the action a session is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

/// What the UI should show right now.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionState<'a> {
    Idle,
    AwaitingResponse {
        ticket: Ticket,
        operation: &'static str,
    },
    Displaying(&'a OperationResult),
}

/// A dispatched action whose response has not arrived yet.
///
/// The host may execute `request` anywhere (another thread included) and
/// feed the outcome back through [`Session::resolve`].
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub ticket: Ticket,
    pub request: HttpRequest,
    pub expected: ExpectedKind,
    pub timeout: Duration,
}

#[derive(Debug)]
struct InFlight {
    ticket: Ticket,
    operation: &'static str,
    expected: ExpectedKind,
}

pub struct Session<T = UreqTransport> {
    config: Configuration,
    client: ApiClient<T>,
    in_flight: Option<InFlight>,
    slot: Option<OperationResult>,
    next_ticket: u64,
}

impl Session<UreqTransport> {
    pub fn new(config: Configuration) -> Self {
        Self::with_client(config, ApiClient::new())
    }
}

impl<T: Transport> Session<T> {
    pub fn with_client(config: Configuration, client: ApiClient<T>) -> Self {
        Self {
            config,
            client,
            in_flight: None,
            slot: None,
            next_ticket: 1,
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn client(&self) -> &ApiClient<T> {
        &self.client
    }

    pub fn set_base_url(&mut self, base_url: &str) -> Result<(), ConfigError> {
        self.config.set_base_url(base_url)
    }

    pub fn set_credential(&mut self, token: Option<&str>) {
        self.config.set_credential(token);
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.config.set_timeout(timeout);
    }

    pub fn state(&self) -> SessionState<'_> {
        match (&self.in_flight, &self.slot) {
            (Some(in_flight), _) => SessionState::AwaitingResponse {
                ticket: in_flight.ticket,
                operation: in_flight.operation,
            },
            (None, Some(result)) => SessionState::Displaying(result),
            (None, None) => SessionState::Idle,
        }
    }

    pub fn is_awaiting(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn current_result(&self) -> Option<&OperationResult> {
        match self.state() {
            SessionState::Displaying(result) => Some(result),
            _ => None,
        }
    }

    pub fn last_user(&self) -> Option<&UserRecord> {
        match self.current_result() {
            Some(Ok(Payload::User(user))) => Some(user),
            _ => None,
        }
    }

    pub fn last_artifact(&self) -> Option<&Artifact> {
        match self.current_result() {
            Some(Ok(Payload::Artifact(artifact))) => Some(artifact),
            _ => None,
        }
    }

    /// Starts `operation`, superseding any action still in flight.
    ///
    /// Returns `None` when the operation was rejected before dispatch; the
    /// rejection is then already on display.
    pub fn begin(&mut self, operation: &Operation) -> Option<PendingRequest> {
        match self.dispatch(operation) {
            Ok(pending) => Some(pending),
            Err(err) => {
                self.slot = Some(Err(err));
                None
            }
        }
    }

    fn dispatch(&mut self, operation: &Operation) -> Result<PendingRequest, ApiError> {
        if let Some(previous) = self.in_flight.take() {
            info!(
                ticket = ?previous.ticket,
                previous = previous.operation,
                next = operation.label(),
                "superseding in-flight action"
            );
        }
        self.slot = None;

        let (expected, request) = operation
            .checked_expected_kind()
            .and_then(|expected| Ok((expected, build_request(operation, &self.config)?)))
            .inspect_err(|err| {
                debug!(operation = operation.label(), error = %err, "rejected before dispatch");
            })?;

        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        self.in_flight = Some(InFlight {
            ticket,
            operation: operation.label(),
            expected: expected.clone(),
        });
        Ok(PendingRequest {
            ticket,
            request,
            expected,
            timeout: effective_timeout(operation, &self.config),
        })
    }

    /// Delivers the raw outcome for `ticket`.
    ///
    /// Returns `false` and leaves the state untouched when `ticket` has been
    /// superseded.
    pub fn resolve(&mut self, ticket: Ticket, raw: Result<HttpResponse, ApiError>) -> bool {
        let in_flight = match self.in_flight.take() {
            Some(in_flight) if in_flight.ticket == ticket => in_flight,
            other => {
                self.in_flight = other;
                warn!(?ticket, "discarding result of superseded action");
                return false;
            }
        };
        self.slot = Some(interpret(raw, &in_flight.expected));
        true
    }

    /// Displays `err` as the outcome of an action that was rejected before it
    /// could become an operation. Anything in flight is superseded.
    pub fn reject(&mut self, err: ApiError) -> &OperationResult {
        if let Some(previous) = self.in_flight.take() {
            info!(ticket = ?previous.ticket, previous = previous.operation, "superseding in-flight action");
        }
        debug!(error = %err, "rejected before dispatch");
        self.slot.insert(Err(err))
    }

    /// Runs `operation` to completion through the session's own client.
    pub fn run(&mut self, operation: &Operation) -> &OperationResult {
        let result = match self.dispatch(operation) {
            Ok(pending) => {
                let raw = self.client.send(pending.request, pending.timeout);
                self.in_flight = None;
                interpret(raw, &pending.expected)
            }
            Err(err) => Err(err),
        };
        self.slot.insert(result)
    }
}
