//! Request orchestration core for the astrology booklet portal.
//!
//! # Overview
//! Turns operator actions into authenticated backend requests, interprets
//! whatever comes back into one `OperationResult`, and keeps the
//! single-slot session state the UI renders.
//!
//! # Design
//! - `build_request` is pure: operation + configuration in, plain-data
//!   `HttpRequest` out. The network sits behind the `Transport` trait
//!   (`UreqTransport` by default), so hosts and tests can supply their own.
//! - `interpret` classifies by status first, content type second, and never
//!   lets a decode fault escape.
//! - `Session` owns the configuration and the displayed result; tickets make
//!   a newer action win over a slower older one.
//! - Document bytes are moved, never copied or re-encoded, from the wire to
//!   the `Artifact`.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod interpret;
pub mod operation;
pub mod session;
pub mod transport;
pub mod types;

pub use client::{build_request, ApiClient};
pub use config::{Configuration, Credential, DEFAULT_BASE_URL};
pub use error::{ApiError, ConfigError, TransportError, STATUS_UNREACHABLE};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use interpret::interpret;
pub use operation::{ExpectedKind, Operation};
pub use session::{PendingRequest, Session, SessionState, Ticket};
pub use transport::{Transport, UreqTransport};
pub use types::{
    Artifact, ArtifactKind, BigThree, OperationResult, Payload, Placement, PlacementSet, UserDraft,
    UserForm, UserId, UserRecord,
};
