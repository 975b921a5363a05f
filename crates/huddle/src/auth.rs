// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client token verification.
//!
//! Tokens are issued elsewhere; this process only checks them. The shipped
//! verifier accepts `"{user_id}.{sig}"` where `sig` is the base64url
//! HMAC-SHA256 of the decimal user id under a shared secret.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::hmac;

use crate::model::UserId;

/// Resolves a presented token to the user it was issued for.
pub trait TokenVerifier: Send + Sync {
    /// `None` for any token that does not verify, whatever the reason.
    fn verify(&self, token: &str) -> Option<UserId>;
}

/// Shared-secret HMAC token verifier.
pub struct HmacVerifier {
    key: hmac::Key,
}

impl HmacVerifier {
    pub fn new(secret: &str) -> Self {
        Self { key: hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes()) }
    }

    /// Mint a token for `user`. Used by tooling and tests; production tokens
    /// come from the identity service holding the same secret.
    pub fn sign(&self, user: UserId) -> String {
        let id = user.to_string();
        let tag = hmac::sign(&self.key, id.as_bytes());
        format!("{id}.{}", URL_SAFE_NO_PAD.encode(tag.as_ref()))
    }
}

impl TokenVerifier for HmacVerifier {
    fn verify(&self, token: &str) -> Option<UserId> {
        let (id, sig) = token.split_once('.')?;
        let user: UserId = id.parse().ok()?;
        let sig = URL_SAFE_NO_PAD.decode(sig).ok()?;
        hmac::verify(&self.key, id.as_bytes(), &sig).ok()?;
        Some(user)
    }
}

/// Shared token presented by collaborator services (the profile service
/// mirroring users into this store).
pub struct ServiceToken {
    key: hmac::Key,
}

const SERVICE_CONTEXT: &[u8] = b"huddle-service";

impl ServiceToken {
    pub fn new(token: &str) -> Self {
        Self { key: hmac::Key::new(hmac::HMAC_SHA256, token.as_bytes()) }
    }

    /// Compare tags rather than raw tokens so the check runs in constant time.
    pub fn matches(&self, presented: &str) -> bool {
        let candidate = hmac::Key::new(hmac::HMAC_SHA256, presented.as_bytes());
        let tag = hmac::sign(&candidate, SERVICE_CONTEXT);
        hmac::verify(&self.key, SERVICE_CONTEXT, tag.as_ref()).is_ok()
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
