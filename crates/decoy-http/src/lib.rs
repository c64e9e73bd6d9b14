//! Embeddable HTTP mock server for tests.
//!
//! Register stubs (a request specification plus a responder) on a
//! [`DecoyServer`], point the code under test at [`DecoyServer::base_url`],
//! and verify afterwards that every stub was used and no unexpected request
//! arrived.

pub mod config;
pub mod error;
pub mod format;
pub mod predicate;
pub mod request;
pub mod response;
pub mod server;
pub mod stub;

pub use config::{ServerConfig, ShutdownConfig, StubDefinition};
pub use error::{
    BodyError, BoxError, ConfigError, MatchError, ServerError, SseEventError, StubError,
    VerificationError,
};
pub use request::{
    BodyDecoder, CapturedRequest, JournalMode, RecordedRequest, RequestMatch, RequestSpecification,
};
pub use response::{ResponseDefinition, SseEvent, WithResponseHead};
pub use server::{DecoyServer, ShutdownTimeouts};
pub use stub::{respond_with, Responder, Stub, StubConfiguration};
