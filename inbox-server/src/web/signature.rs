//! Mailgun webhook signature verification.
//!
//! Mailgun signs webhook requests using HMAC-SHA256.
//! Reference: https://documentation.mailgun.com/docs/mailgun/user-manual/events/webhooks/#securing-webhooks

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use crate::Config;

type HmacSha256 = Hmac<Sha256>;

/// Default tolerated distance between webhook timestamp and server time (15 minutes).
pub const DEFAULT_MAX_SKEW_SECONDS: u64 = 900;

/// Verifies the `(timestamp, token, signature)` triple Mailgun attaches to
/// every webhook.
///
/// Built once at startup and shared; holds no mutable state.
#[derive(Clone)]
pub struct WebhookAuthenticator {
    signing_key: String,
    max_skew_seconds: u64,
}

impl fmt::Debug for WebhookAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookAuthenticator")
            .field("configured", &self.is_configured())
            .field("max_skew_seconds", &self.max_skew_seconds)
            .finish()
    }
}

impl WebhookAuthenticator {
    /// Surrounding whitespace in the key is ignored.
    pub fn new(signing_key: impl Into<String>, max_skew_seconds: u64) -> Self {
        Self {
            signing_key: signing_key.into().trim().to_string(),
            max_skew_seconds,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.mailgun_signing_key.clone().unwrap_or_default(),
            config.mailgun_signature_max_skew,
        )
    }

    /// Whether a signing key is available at all.
    pub fn is_configured(&self) -> bool {
        !self.signing_key.is_empty()
    }

    /// Check the timestamp against `now` using the configured skew.
    pub fn is_timestamp_fresh(&self, timestamp: &str, now: u64) -> bool {
        is_timestamp_fresh(timestamp, now, self.max_skew_seconds)
    }

    /// Compare `signature` with HMAC-SHA256(signing_key, timestamp + token).
    pub fn verify(&self, timestamp: &str, token: &str, signature: &str) -> bool {
        let mut mac = match HmacSha256::new_from_slice(self.signing_key.as_bytes()) {
            Ok(m) => m,
            Err(_) => {
                warn!("mailgun_signature_invalid_key");
                return false;
            }
        };

        mac.update(timestamp.as_bytes());
        mac.update(token.as_bytes());

        let expected_signature = hex::encode(mac.finalize().into_bytes());

        let valid = constant_time_compare(&expected_signature, signature);

        if !valid {
            warn!(
                expected_length = expected_signature.len(),
                actual_length = signature.len(),
                "mailgun_signature_mismatch"
            );
        }

        valid
    }

    /// Full acceptance check: configured, all three fields present, fresh and
    /// correctly signed.
    pub fn authenticate(
        &self,
        timestamp: Option<&str>,
        token: Option<&str>,
        signature: Option<&str>,
        now: u64,
    ) -> bool {
        let timestamp = timestamp.unwrap_or_default();
        let token = token.unwrap_or_default();
        let signature = signature.unwrap_or_default();

        if !self.is_configured() || timestamp.is_empty() || token.is_empty() || signature.is_empty() {
            warn!(
                has_signing_key = self.is_configured(),
                has_timestamp = !timestamp.is_empty(),
                has_token = !token.is_empty(),
                has_signature = !signature.is_empty(),
                "mailgun_signature_missing_fields"
            );
            return false;
        }

        if !self.is_timestamp_fresh(timestamp, now) {
            warn!(
                timestamp = %timestamp,
                current_time = now,
                max_skew_seconds = self.max_skew_seconds,
                "mailgun_signature_stale"
            );
            return false;
        }

        self.verify(timestamp, token, signature)
    }
}

/// A timestamp is fresh when it is made only of ASCII digits and lies within
/// `max_skew_seconds` of `now`, in either direction.
pub fn is_timestamp_fresh(timestamp: &str, now: u64, max_skew_seconds: u64) -> bool {
    if timestamp.is_empty() || !timestamp.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    match timestamp.parse::<u64>() {
        Ok(webhook_time) => now.abs_diff(webhook_time) <= max_skew_seconds,
        Err(_) => false,
    }
}

/// Current Unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "test-signing-key";

    fn sign(key: &str, timestamp: &str, token: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(key.as_bytes()).unwrap();
        mac.update(format!("{}{}", timestamp, token).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Every single-bit flip of `value` that is still valid UTF-8.
    fn bit_flips(value: &str) -> Vec<String> {
        let mut out = Vec::new();
        for index in 0..value.len() {
            for bit in 0..8 {
                let mut bytes = value.as_bytes().to_vec();
                bytes[index] ^= 1 << bit;
                if let Ok(mutated) = String::from_utf8(bytes) {
                    out.push(mutated);
                }
            }
        }
        out
    }

    #[test]
    fn test_verify_accepts_valid_signature() {
        let auth = WebhookAuthenticator::new(KEY, 900);
        let signature = sign(KEY, "1700000000", "random-token");
        assert!(auth.verify("1700000000", "random-token", &signature));
    }

    #[test]
    fn test_verify_rejects_single_bit_mutations() {
        let auth = WebhookAuthenticator::new(KEY, 900);
        let timestamp = "1700000000";
        let token = "a1b2c3d4e5f6";
        let signature = sign(KEY, timestamp, token);

        for mutated in bit_flips(&signature) {
            assert!(!auth.verify(timestamp, token, &mutated), "signature {}", mutated);
        }
        for mutated in bit_flips(token) {
            assert!(!auth.verify(timestamp, &mutated, &signature), "token {}", mutated);
        }
        for mutated in bit_flips(timestamp) {
            assert!(!auth.verify(&mutated, token, &signature), "timestamp {}", mutated);
        }
    }

    #[test]
    fn test_verify_rejects_other_key() {
        let auth = WebhookAuthenticator::new("another-key", 900);
        let signature = sign(KEY, "1700000000", "token");
        assert!(!auth.verify("1700000000", "token", &signature));
    }

    #[test]
    fn test_timestamp_freshness_boundary() {
        let now = 1_700_000_900;
        assert!(is_timestamp_fresh("1700000000", now, 900));
        assert!(!is_timestamp_fresh("1699999999", now, 900));
        // Future timestamps are bounded the same way.
        assert!(is_timestamp_fresh("1700001800", now, 900));
        assert!(!is_timestamp_fresh("1700001801", now, 900));
    }

    #[test]
    fn test_timestamp_must_be_digits() {
        let now = 1_700_000_000;
        assert!(!is_timestamp_fresh("", now, 900));
        assert!(!is_timestamp_fresh("not-a-number", now, 900));
        assert!(!is_timestamp_fresh("-1700000000", now, 900));
        assert!(!is_timestamp_fresh("+1700000000", now, 900));
        assert!(!is_timestamp_fresh(" 1700000000", now, 900));
        assert!(!is_timestamp_fresh("99999999999999999999999", now, 900));
    }

    #[test]
    fn test_authenticate_missing_fields() {
        let auth = WebhookAuthenticator::new(KEY, 900);
        let now = unix_now();
        let ts = now.to_string();
        let sig = sign(KEY, &ts, "token");

        assert!(auth.authenticate(Some(&ts), Some("token"), Some(&sig), now));
        assert!(!auth.authenticate(None, Some("token"), Some(&sig), now));
        assert!(!auth.authenticate(Some(&ts), None, Some(&sig), now));
        assert!(!auth.authenticate(Some(&ts), Some("token"), None, now));
        assert!(!auth.authenticate(Some(""), Some("token"), Some(&sig), now));
    }

    #[test]
    fn test_authenticate_stale() {
        let auth = WebhookAuthenticator::new(KEY, 900);
        // Very old timestamp (year 2000)
        let sig = sign(KEY, "946684800", "token");
        assert!(!auth.authenticate(Some("946684800"), Some("token"), Some(&sig), unix_now()));
    }

    #[test]
    fn test_authenticate_requires_configuration() {
        let auth = WebhookAuthenticator::new("", 900);
        let now = unix_now();
        let ts = now.to_string();
        let sig = sign("", &ts, "token");
        assert!(!auth.authenticate(Some(&ts), Some("token"), Some(&sig), now));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
    }

    #[test]
    fn test_is_configured() {
        assert!(!WebhookAuthenticator::new("", 900).is_configured());
        assert!(!WebhookAuthenticator::new("   ", 900).is_configured());
        assert!(WebhookAuthenticator::new("key123", 900).is_configured());
    }

    #[test]
    fn test_key_whitespace_is_ignored() {
        let auth = WebhookAuthenticator::new(format!("{}\n", KEY), 900);
        let signature = sign(KEY, "1700000000", "random-token");
        assert!(auth.verify("1700000000", "random-token", &signature));
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let auth = WebhookAuthenticator::new("super-secret", 900);
        assert!(!format!("{:?}", auth).contains("super-secret"));
    }
}
