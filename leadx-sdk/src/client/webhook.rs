//! Verification helper for payloads pushed by the leadx server.
//!
//! The transport adapter receives [`AuctionInvitation`]s and the intake
//! collaborator receives [`AuctionOutcomePayload`]s; both are signed bodies.
//!
//! [`AuctionInvitation`]: crate::objects::AuctionInvitation
//! [`AuctionOutcomePayload`]: crate::objects::AuctionOutcomePayload

use crate::signature::{Signature, SignatureError, SignedObject};

/// Verify and deserialize a signed payload sent by the leadx server.
///
/// * `signature_header` – value of the `Leadx-Signature` request header.
/// * `body` – raw JSON request body string.
/// * `secret` – the HMAC secret shared with the server.
pub fn verify_signed_payload<T: Signature>(
    signature_header: &str,
    body: &str,
    secret: &[u8],
) -> Result<T, SignatureError> {
    SignedObject::<T>::from_header_and_body(signature_header, body.to_owned())?.verify(secret)
}
