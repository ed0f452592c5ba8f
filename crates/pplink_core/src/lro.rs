//! Long-running operation poller.
//!
//! Control-plane mutations either complete synchronously or answer `202
//! Accepted` with a header pointing at a status endpoint. The poller submits
//! the request once, then polls that endpoint until it reports a terminal
//! state or the attempt budget runs out.
//!
//! ```text
//! SUBMITTED -> 200/201/204            -> DONE
//! SUBMITTED -> 202 + operation header -> IN_PROGRESS
//! SUBMITTED -> 404                    -> DONE (already absent)
//! SUBMITTED -> 409                    -> DONE (already in target state)
//! SUBMITTED -> other status           -> FAILED
//! IN_PROGRESS -> terminal success     -> DONE
//! IN_PROGRESS -> still running        -> IN_PROGRESS
//! IN_PROGRESS -> error / failure body -> FAILED
//! IN_PROGRESS -> budget exhausted     -> TIMED_OUT
//! ```
//!
//! Only credential failures are returned as `Err`. Everything the remote side
//! says is an `LroOutcome`, so callers decide per operation whether a failure
//! matters.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::client::ApiClient;
use crate::credential::Audience;
use crate::error::{CoreError, CoreResult};
use crate::http::{HttpRequest, HttpResponse, Method};

/// Headers that may carry the status endpoint, in order of preference.
pub const OPERATION_HEADERS: [&str; 3] = ["azure-asyncoperation", "operation-location", "location"];

/// How a poll response is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalCheck {
    /// 200/201/204 done, 202 running, anything else failed.
    #[default]
    StatusCode,
    /// Read the `status` field of an async-operation body
    /// (`InProgress`, `Succeeded`, `Failed`, `Canceled`).
    AsyncOperationBody,
}

/// Verdict on a single poll response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollVerdict {
    Succeeded,
    InProgress,
    Failed(String),
}

impl TerminalCheck {
    pub fn classify(&self, response: &HttpResponse) -> PollVerdict {
        if response.status == 202 {
            return PollVerdict::InProgress;
        }
        if !response.is_success() {
            return PollVerdict::Failed(format!("HTTP {}: {}", response.status, response.body));
        }

        match self {
            TerminalCheck::StatusCode => PollVerdict::Succeeded,
            TerminalCheck::AsyncOperationBody => {
                // Location-style endpoints finish with an empty 200/204.
                if response.body.trim().is_empty() {
                    return PollVerdict::Succeeded;
                }
                let body: serde_json::Value = match serde_json::from_str(&response.body) {
                    Ok(body) => body,
                    Err(e) => {
                        warn!("Unreadable operation status ({}), polling again", e);
                        return PollVerdict::InProgress;
                    }
                };
                match body.get("status").and_then(|s| s.as_str()) {
                    None => PollVerdict::Succeeded,
                    Some(status) if status.eq_ignore_ascii_case("succeeded") => PollVerdict::Succeeded,
                    Some(status)
                        if status.eq_ignore_ascii_case("failed")
                            || status.eq_ignore_ascii_case("canceled")
                            || status.eq_ignore_ascii_case("cancelled") =>
                    {
                        let detail = body
                            .pointer("/error/message")
                            .and_then(|m| m.as_str())
                            .unwrap_or("no error detail");
                        PollVerdict::Failed(format!("operation {}: {}", status, detail))
                    }
                    Some(_) => PollVerdict::InProgress,
                }
            }
        }
    }
}

/// Delay policy between polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Same interval before every poll.
    #[default]
    Fixed,
    /// Interval multiplied by `factor` after every poll, capped at `max`.
    Exponential { factor: u32, max: Duration },
}

/// Polling budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_attempts: 60,
            backoff: Backoff::Fixed,
        }
    }
}

impl PollSettings {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            backoff: Backoff::Fixed,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Delay before poll number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.interval,
            Backoff::Exponential { factor, max } => {
                let exponent = attempt.saturating_sub(1).min(16);
                let multiplier = factor.max(1).saturating_pow(exponent);
                self.interval.saturating_mul(multiplier).min(max)
            }
        }
    }
}

/// A mutating request to run to completion.
#[derive(Debug, Clone)]
pub struct LroRequest {
    /// Human-readable operation name for logs and reports.
    pub operation: String,
    pub method: Method,
    pub url: String,
    pub body: Option<serde_json::Value>,
    pub audience: Audience,
    pub terminal: TerminalCheck,
}

impl LroRequest {
    pub fn new(operation: impl Into<String>, method: Method, url: impl Into<String>, audience: Audience) -> Self {
        Self {
            operation: operation.into(),
            method,
            url: url.into(),
            body: None,
            audience,
            terminal: TerminalCheck::default(),
        }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_terminal_check(mut self, terminal: TerminalCheck) -> Self {
        self.terminal = terminal;
        self
    }

    fn to_http(&self) -> HttpRequest {
        let request = HttpRequest::new(self.method, &self.url);
        match &self.body {
            Some(body) => request.json(body.clone()),
            None => request,
        }
    }
}

/// How a `Done` outcome was reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The submission itself returned success.
    Synchronous { status: u16 },
    /// Finished after `polls` status checks.
    Polled { polls: u32 },
    /// Submission returned 404.
    AlreadyAbsent,
    /// Submission returned 409.
    AlreadyInTargetState,
    /// 202 without any status endpoint to follow.
    Accepted,
}

/// Where a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePhase {
    Submit,
    Poll,
}

/// Details of a failed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationFailure {
    pub phase: FailurePhase,
    pub status: Option<u16>,
    pub reason: String,
}

impl OperationFailure {
    /// Convert to the error taxonomy, using `target` to name the resource.
    pub fn to_error(&self, target: &str) -> CoreError {
        match self.status {
            Some(status) => CoreError::from_status(status, target, self.reason.clone()),
            None => CoreError::Transport(self.reason.clone()),
        }
    }
}

impl fmt::Display for OperationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self.phase {
            FailurePhase::Submit => "submit",
            FailurePhase::Poll => "poll",
        };
        match self.status {
            Some(status) => write!(f, "{} failed with HTTP {}: {}", phase, status, self.reason),
            None => write!(f, "{} failed: {}", phase, self.reason),
        }
    }
}

/// Result of `submit_and_wait`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LroOutcome {
    Done(Completion),
    Failed(OperationFailure),
    /// The budget ran out. The operation may still finish server-side.
    TimedOut {
        attempts: u32,
        elapsed: Duration,
        operation_url: String,
    },
}

impl LroOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, LroOutcome::Done(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, LroOutcome::Failed(_))
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, LroOutcome::TimedOut { .. })
    }

    /// Convert to a `Result`, mapping failures and timeouts to errors.
    pub fn into_result(self, operation: &str) -> CoreResult<Completion> {
        match self {
            LroOutcome::Done(completion) => Ok(completion),
            LroOutcome::Failed(failure) => Err(failure.to_error(operation)),
            LroOutcome::TimedOut { attempts, .. } => Err(CoreError::Timeout {
                operation: operation.to_string(),
                attempts,
            }),
        }
    }
}

/// The status endpoint announced by a 202 response.
pub fn operation_url(response: &HttpResponse) -> Option<&str> {
    OPERATION_HEADERS
        .iter()
        .find_map(|name| response.header(name))
        .filter(|url| !url.trim().is_empty())
}

/// Runs long-running operations.
#[derive(Debug, Clone)]
pub struct LroPoller {
    client: ApiClient,
}

impl LroPoller {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Submit `request` once and wait for it to reach a terminal state.
    pub async fn submit_and_wait(
        &self,
        request: &LroRequest,
        settings: &PollSettings,
    ) -> CoreResult<LroOutcome> {
        let started = Instant::now();
        info!("{}: {} {}", request.operation, request.method, request.url);

        let response = match self.client.send(request.audience, request.to_http()).await {
            Ok(response) => response,
            Err(e @ (CoreError::Auth(_) | CoreError::MissingPrerequisite(_))) => return Err(e),
            Err(e) => {
                error!("{}: submission failed: {}", request.operation, e);
                return Ok(LroOutcome::Failed(OperationFailure {
                    phase: FailurePhase::Submit,
                    status: None,
                    reason: e.to_string(),
                }));
            }
        };

        match response.status {
            404 => {
                info!("{}: target not found, nothing to do", request.operation);
                Ok(LroOutcome::Done(Completion::AlreadyAbsent))
            }
            409 => {
                info!("{}: conflict, treating as already in target state: {}", request.operation, response.body);
                Ok(LroOutcome::Done(Completion::AlreadyInTargetState))
            }
            202 => match operation_url(&response) {
                Some(url) => {
                    let url = url.to_string();
                    self.poll(request, &url, settings, started).await
                }
                None => {
                    warn!("{}: accepted without an operation header, not polling", request.operation);
                    Ok(LroOutcome::Done(Completion::Accepted))
                }
            },
            status if response.is_success() => {
                info!("{}: completed synchronously ({})", request.operation, status);
                Ok(LroOutcome::Done(Completion::Synchronous { status }))
            }
            status => {
                error!(
                    "{}: {} {} returned {}: {}",
                    request.operation, request.method, request.url, status, response.body
                );
                Ok(LroOutcome::Failed(OperationFailure {
                    phase: FailurePhase::Submit,
                    status: Some(status),
                    reason: response.body,
                }))
            }
        }
    }

    async fn poll(
        &self,
        request: &LroRequest,
        url: &str,
        settings: &PollSettings,
        started: Instant,
    ) -> CoreResult<LroOutcome> {
        debug!("{}: polling {}", request.operation, url);

        for attempt in 1..=settings.max_attempts {
            tokio::time::sleep(settings.delay_for(attempt)).await;

            // Fetched per poll so the provider can refresh an ageing token.
            let response = match self.client.send(request.audience, HttpRequest::get(url)).await {
                Ok(response) => response,
                Err(e @ (CoreError::Auth(_) | CoreError::MissingPrerequisite(_))) => return Err(e),
                Err(e) => {
                    error!("{}: poll {} failed: {}", request.operation, attempt, e);
                    return Ok(LroOutcome::Failed(OperationFailure {
                        phase: FailurePhase::Poll,
                        status: None,
                        reason: e.to_string(),
                    }));
                }
            };

            let elapsed = started.elapsed();
            info!(
                "{}: poll {}/{} after {}s -> {}",
                request.operation,
                attempt,
                settings.max_attempts,
                elapsed.as_secs(),
                response.status
            );

            match request.terminal.classify(&response) {
                PollVerdict::Succeeded => {
                    info!("{}: completed after {} polls", request.operation, attempt);
                    return Ok(LroOutcome::Done(Completion::Polled { polls: attempt }));
                }
                PollVerdict::InProgress => continue,
                PollVerdict::Failed(reason) => {
                    error!("{}: {}", request.operation, reason);
                    let status = (!response.is_success()).then_some(response.status);
                    return Ok(LroOutcome::Failed(OperationFailure {
                        phase: FailurePhase::Poll,
                        status,
                        reason,
                    }));
                }
            }
        }

        let elapsed = started.elapsed();
        warn!(
            "{}: still running after {} polls ({}s); it may complete later, check {}",
            request.operation,
            settings.max_attempts,
            elapsed.as_secs(),
            url
        );
        Ok(LroOutcome::TimedOut {
            attempts: settings.max_attempts,
            elapsed,
            operation_url: url.to_string(),
        })
    }
}
