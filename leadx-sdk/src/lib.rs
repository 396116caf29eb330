//! Shared types for the leadx lead auction engine.
//!
//! `objects` holds the JSON wire types exchanged with the server,
//! `signature` the HMAC body signing used by the service API, invitations
//! and outcome webhooks. Typed HTTP clients live behind the `client` feature.

#![forbid(unsafe_code)]

#[cfg(feature = "client")]
pub mod client;
pub mod objects;
pub mod signature;
