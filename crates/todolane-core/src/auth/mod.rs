//! Credential persistence and token decoding.
//!
//! This module provides:
//! - `TokenStore`: sole owner of the persisted access/refresh tokens
//! - `Session`: a snapshot of the stored tokens with the derived access expiry
//! - `codec`: reads the `exp` claim out of a bearer token without the server
//! - `KeyringBackend`, `FileBackend`, `MemoryBackend`: where tokens live

pub mod codec;
pub mod credentials;
pub mod session;
pub mod store;

pub use codec::{decode_claims, decode_expiry, DecodeError, TokenClaims};
pub use credentials::KeyringBackend;
pub use session::Session;
pub use store::{FileBackend, MemoryBackend, StoreError, StoreKey, TokenBackend, TokenStore};
