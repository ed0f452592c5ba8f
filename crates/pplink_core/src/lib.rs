//! # pplink_core
//!
//! Control-plane plumbing for pplink.
//!
//! This crate knows nothing about Power Platform. It provides the pieces every
//! remote operation is built from:
//!
//! - **Credentials**: per-audience bearer tokens, cached and refreshed before expiry
//! - **Transport**: request/response values behind the `HttpTransport` seam
//! - **LRO poller**: submit once, then poll the operation endpoint to a terminal state
//! - **Gates**: operator confirmation for destructive steps
//! - **Teardown sequencer**: ordered steps with a per-step outcome ledger
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pplink_core::{
//!     ApiClient, Audience, AzCliTokenSource, CredentialProvider, LroPoller, LroRequest,
//!     Method, PollSettings, ReqwestTransport,
//! };
//!
//! let credentials = Arc::new(CredentialProvider::new(Arc::new(AzCliTokenSource::new())));
//! let client = ApiClient::new(Arc::new(ReqwestTransport::new()?), credentials);
//! let poller = LroPoller::new(client);
//!
//! let request = LroRequest::new("delete-resource-group", Method::Delete, url, Audience::ResourceManager);
//! let outcome = poller.submit_and_wait(&request, &PollSettings::default()).await?;
//! ```

pub mod client;
pub mod credential;
pub mod error;
pub mod gate;
pub mod http;
pub mod lro;
pub mod mock;
pub mod teardown;

pub use client::ApiClient;
pub use credential::{
    parse_az_token, AccessToken, Audience, AzCliTokenSource, CredentialProvider, StaticTokenSource,
    TokenSource,
};
pub use error::{CoreError, CoreResult};
pub use gate::{ConfirmationGate, ConfirmationRequest, ForceGate, PromptGate, ScriptedGate};
pub use http::{HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport};
pub use lro::{
    operation_url, Backoff, Completion, FailurePhase, LroOutcome, LroPoller, LroRequest,
    OperationFailure, PollSettings, PollVerdict, TerminalCheck,
};
pub use mock::{CapturedCall, MockTransport};
pub use teardown::{Report, StepOutcome, StepRecord, TeardownSequencer, TeardownStep};
