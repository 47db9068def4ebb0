//! # vr-auth-simple
//!
//! HMAC-SHA256 implementation of `IdentityProvider`.
//! Tokens are `<uid>.<hex mac>` and are minted by the upstream auth service
//! with the same shared secret; Verity only checks them.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use tracing::debug;
use vr_core::error::{AppError, Result};
use vr_core::traits::IdentityProvider;

type HmacSha256 = Hmac<Sha256>;

/// Holds the keyed MAC state; each check clones it instead of re-keying.
#[derive(Clone)]
pub struct HmacIdentity {
    keyed: HmacSha256,
}

impl HmacIdentity {
    pub fn new(secret: &SecretString) -> Result<Self> {
        let keyed = <HmacSha256 as Mac>::new_from_slice(secret.expose_secret().as_bytes())
            .map_err(|e| AppError::Internal(format!("token secret rejected: {e}")))?;
        Ok(Self { keyed })
    }

    fn mac(&self, uid: &str) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(uid.as_bytes());
        mac
    }
}

impl IdentityProvider for HmacIdentity {
    fn verify(&self, token: &str) -> Result<String> {
        let invalid = || AppError::Unauthorized("invalid identity token".into());

        // uids may contain dots; the signature never does
        let (uid, signature) = token.rsplit_once('.').ok_or_else(invalid)?;
        if uid.is_empty() {
            return Err(invalid());
        }
        let signature = hex::decode(signature).map_err(|_| invalid())?;

        self.mac(uid).verify_slice(&signature).map_err(|_| {
            debug!("identity token signature mismatch");
            invalid()
        })?;
        Ok(uid.to_string())
    }

    fn issue(&self, uid: &str) -> String {
        let signature = self.mac(uid).finalize().into_bytes();
        format!("{uid}.{}", hex::encode(signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(secret: &str) -> HmacIdentity {
        HmacIdentity::new(&SecretString::from(secret.to_string())).unwrap()
    }

    #[test]
    fn issued_tokens_verify() {
        let auth = provider("a-long-shared-secret");
        let token = auth.issue("firebase|u.123");
        assert_eq!(auth.verify(&token).unwrap(), "firebase|u.123");
    }

    #[test]
    fn tampering_is_rejected() {
        let auth = provider("a-long-shared-secret");
        let token = auth.issue("alice");
        let forged = token.replacen("alice", "mallory", 1);
        assert!(matches!(auth.verify(&forged), Err(AppError::Unauthorized(_))));

        let other = provider("some-other-secret-value").issue("alice");
        assert!(auth.verify(&other).is_err());
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        let auth = provider("a-long-shared-secret");
        for token in ["", "alice", ".deadbeef", "alice.not-hex", "alice."] {
            assert!(auth.verify(token).is_err(), "accepted {token:?}");
        }
    }
}
