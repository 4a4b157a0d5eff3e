//! Transport envelope for TokenVault HTTP endpoints.
//!
//! Request and response bodies of envelope-capable clients travel as
//! AES-256-GCM ciphertext bound to the request method, path, correlation id
//! and session id. The filter sits in front of the handlers as axum
//! middleware and is a no-op for clients that do not opt in.

pub mod binding;
pub mod envelope;
pub mod filter;
pub mod middleware;

pub use binding::{
    RequestBinding, HEADER_ENCRYPTED, HEADER_ENCRYPTION_ENABLED, HEADER_REQUEST_ID,
    HEADER_SESSION_ID,
};
pub use envelope::Envelope;
pub use filter::{EnvelopeFilter, FilterMetrics};
pub use middleware::{envelope_middleware, DecryptedPayload};
