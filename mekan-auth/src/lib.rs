//! Mekan Authentication
//!
//! Bearer token handling for the restaurant directory:
//! - HS256 JWT validation (issuance lives with an external identity service;
//!   a local issuer is kept for development tokens)
//! - Request identity extraction from the `Authorization` header
//! - The editor access policy gating every mutating request

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod jwt;
pub mod middleware;
pub mod policy;

pub use jwt::JwtManager;
pub use middleware::{authenticate, AuthContext, Identity};
pub use policy::{permits, AccessPolicy, EditorPolicy, MethodKind, EDITOR_GROUP};
