//! # Fieldmatch Remote
//!
//! Network-facing tiers of the matcher:
//!
//! - [`MatchOracleClient`]: semantic matching, one field or a batch in
//!   rate-limited groups. Answers are validated against the available keys.
//! - [`SharedCacheClient`]: the cross-user cache; `get` may be answered by a
//!   server-side oracle call, `store` is fire-and-forget.
//!
//! Both go through a [`JsonTransport`] (reqwest in production, scripted fakes
//! in tests) and a [`ServiceGuard`] that enforces a deadline and keeps a dead
//! service from being retried on every field.

mod config;
mod error;
mod guard;
mod oracle;
mod shared;
mod transport;
pub mod validate;

pub use config::{OracleConfig, SharedCacheConfig};
pub use error::{RemoteError, Result};
pub use guard::ServiceGuard;
pub use oracle::{BatchOutcome, MatchOracleClient};
pub use shared::{SharedCacheClient, SharedFieldContext, SharedMatch};
pub use transport::{Endpoint, JsonTransport, ReqwestTransport, TransportResponse};
