use axum::extract::FromRef;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Password-reset tokens, derived instead of stored.
///
/// A token is `"<unix_ts>.<base64url(hmac)>"` where the MAC covers the user
/// id, the timestamp, and the user's current password hash. Changing the
/// password changes the derivation, so every previously issued token stops
/// verifying without any revocation table.
#[derive(Clone)]
pub struct ResetTokens {
    secret: String,
    ttl_seconds: i64,
}

impl FromRef<AppState> for ResetTokens {
    fn from_ref(state: &AppState) -> Self {
        Self {
            secret: state.config.jwt.secret.clone(),
            ttl_seconds: state.config.jwt.reset_ttl_minutes * 60,
        }
    }
}

impl ResetTokens {
    pub fn new(secret: impl Into<String>, ttl_minutes: i64) -> Self {
        Self {
            secret: secret.into(),
            ttl_seconds: ttl_minutes * 60,
        }
    }

    fn signature(&self, user_id: Uuid, timestamp: i64, password_hash: &str) -> Vec<u8> {
        // HMAC-SHA256 accepts keys of any length.
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(user_id.as_bytes());
        mac.update(b":");
        mac.update(&timestamp.to_be_bytes());
        mac.update(b":");
        mac.update(password_hash.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    pub fn make(&self, user_id: Uuid, password_hash: &str) -> String {
        let timestamp = OffsetDateTime::now_utc().unix_timestamp();
        let sig = self.signature(user_id, timestamp, password_hash);
        format!("{timestamp}.{}", URL_SAFE_NO_PAD.encode(sig))
    }

    /// Boolean predicate rather than an error: the caller chooses the
    /// user-facing message, and the token may be checked against a uid taken
    /// from the request rather than from the token itself.
    pub fn check(&self, user_id: Uuid, password_hash: &str, token: &str) -> bool {
        let Some((ts_part, sig_part)) = token.split_once('.') else {
            return false;
        };
        let Ok(timestamp) = ts_part.parse::<i64>() else {
            return false;
        };
        let now = OffsetDateTime::now_utc().unix_timestamp();
        if timestamp > now || now - timestamp > self.ttl_seconds {
            return false;
        }
        let Ok(sig) = URL_SAFE_NO_PAD.decode(sig_part) else {
            return false;
        };
        let mut mac = match HmacSha256::new_from_slice(self.secret.as_bytes()) {
            Ok(m) => m,
            Err(_) => return false,
        };
        mac.update(user_id.as_bytes());
        mac.update(b":");
        mac.update(&timestamp.to_be_bytes());
        mac.update(b":");
        mac.update(password_hash.as_bytes());
        // Constant-time comparison.
        mac.verify_slice(&sig).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> ResetTokens {
        ResetTokens::new("test-secret", 60)
    }

    #[test]
    fn make_then_check_succeeds() {
        let t = tokens();
        let uid = Uuid::new_v4();
        let token = t.make(uid, "$argon2id$old-hash");
        assert!(t.check(uid, "$argon2id$old-hash", &token));
    }

    #[test]
    fn token_is_invalidated_by_password_change() {
        let t = tokens();
        let uid = Uuid::new_v4();
        let token = t.make(uid, "$argon2id$old-hash");
        assert!(!t.check(uid, "$argon2id$new-hash", &token));
    }

    #[test]
    fn token_is_bound_to_the_user() {
        let t = tokens();
        let token = t.make(Uuid::new_v4(), "hash");
        assert!(!t.check(Uuid::new_v4(), "hash", &token));
    }

    #[test]
    fn expired_token_is_rejected() {
        let t = ResetTokens::new("test-secret", 0);
        let uid = Uuid::new_v4();
        let timestamp = OffsetDateTime::now_utc().unix_timestamp() - 10;
        let sig = t.signature(uid, timestamp, "hash");
        let token = format!("{timestamp}.{}", URL_SAFE_NO_PAD.encode(sig));
        assert!(!t.check(uid, "hash", &token));
    }

    #[test]
    fn future_dated_token_is_rejected() {
        let t = tokens();
        let uid = Uuid::new_v4();
        let timestamp = OffsetDateTime::now_utc().unix_timestamp() + 300;
        let sig = t.signature(uid, timestamp, "hash");
        let token = format!("{timestamp}.{}", URL_SAFE_NO_PAD.encode(sig));
        assert!(!t.check(uid, "hash", &token));
    }

    #[test]
    fn malformed_tokens_return_false() {
        let t = tokens();
        let uid = Uuid::new_v4();
        for bad in ["", "no-dot", "abc.def", "123", "123.%%%", ".sig"] {
            assert!(!t.check(uid, "hash", bad), "accepted {bad:?}");
        }
    }

    #[test]
    fn different_secret_fails_verification() {
        let uid = Uuid::new_v4();
        let token = ResetTokens::new("secret-a", 60).make(uid, "hash");
        assert!(!ResetTokens::new("secret-b", 60).check(uid, "hash", &token));
    }
}
