//! Time-based one-time password verification for the admin credential.
//!
//! HMAC-SHA1, 30-second steps, 6 digits, and a fixed drift window of two steps either side.
//! These values pair with standard authenticator apps and must not change without a
//! compatibility break.

use std::sync::Arc;

use data_encoding::BASE32_NOPAD;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;

type HmacSha1 = Hmac<Sha1>;

const TIME_STEP_SECS: u64 = 30;
const DRIFT_WINDOW_STEPS: i64 = 2;
const CODE_DIGITS: usize = 6;
const CODE_MODULUS: u32 = 1_000_000;

#[derive(Debug, Error)]
pub enum OtpError {
    #[error("otp secret is required")]
    MissingSecret,
    #[error("otp secret is not valid base32: {0}")]
    InvalidSecret(String),
}

/// Source of wall-clock time in whole Unix seconds.
pub trait Clock: Send + Sync {
    fn unix_seconds(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_seconds(&self) -> u64 {
        u64::try_from(OffsetDateTime::now_utc().unix_timestamp()).unwrap_or(0)
    }
}

/// A clock frozen at a given instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn unix_seconds(&self) -> u64 {
        self.0
    }
}

/// Verifies codes against the process-wide shared secret.
///
/// Construction fails on a blank or undecodable secret, so an authenticator that exists
/// always has a usable key.
#[derive(Clone)]
pub struct OtpAuthenticator {
    mac: HmacSha1,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for OtpAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtpAuthenticator").finish_non_exhaustive()
    }
}

impl OtpAuthenticator {
    pub fn new(secret: &str) -> Result<Self, OtpError> {
        Self::with_clock(secret, Arc::new(SystemClock))
    }

    pub fn with_clock(secret: &str, clock: Arc<dyn Clock>) -> Result<Self, OtpError> {
        let key = decode_secret(secret)?;
        let mac = HmacSha1::new_from_slice(&key)
            .map_err(|err| OtpError::InvalidSecret(err.to_string()))?;
        Ok(Self { mac, clock })
    }

    /// True when `candidate` matches the code of any step within the drift window.
    pub fn verify(&self, candidate: &str) -> bool {
        let candidate = candidate.as_bytes();
        if candidate.len() != CODE_DIGITS {
            return false;
        }

        let current = self.current_step();
        (-DRIFT_WINDOW_STEPS..=DRIFT_WINDOW_STEPS)
            .filter_map(|offset| current.checked_add_signed(offset))
            .any(|step| {
                let expected = self.code_for_step(step);
                bool::from(expected.as_bytes().ct_eq(candidate))
            })
    }

    /// Code for the step containing the clock's current time.
    pub fn current_code(&self) -> String {
        self.code_for_step(self.current_step())
    }

    /// Code for the step containing `unix_seconds`.
    pub fn code_at(&self, unix_seconds: u64) -> String {
        self.code_for_step(unix_seconds / TIME_STEP_SECS)
    }

    fn current_step(&self) -> u64 {
        self.clock.unix_seconds() / TIME_STEP_SECS
    }

    fn code_for_step(&self, step: u64) -> String {
        let mut mac = self.mac.clone();
        mac.update(&step.to_be_bytes());
        let digest = mac.finalize().into_bytes();

        let offset = usize::from(digest[digest.len() - 1] & 0x0f);
        let binary = u32::from_be_bytes([
            digest[offset] & 0x7f,
            digest[offset + 1],
            digest[offset + 2],
            digest[offset + 3],
        ]);

        format!("{:0width$}", binary % CODE_MODULUS, width = CODE_DIGITS)
    }
}

fn decode_secret(secret: &str) -> Result<Vec<u8>, OtpError> {
    let normalized: String = secret
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect::<String>()
        .trim_end_matches('=')
        .to_ascii_uppercase();

    if normalized.is_empty() {
        return Err(OtpError::MissingSecret);
    }

    let key = BASE32_NOPAD
        .decode(normalized.as_bytes())
        .map_err(|err| OtpError::InvalidSecret(err.to_string()))?;
    if key.is_empty() {
        return Err(OtpError::InvalidSecret("secret decodes to no bytes".into()));
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 6238 appendix B seed "12345678901234567890" in base32.
    const RFC_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";
    const DEMO_SECRET: &str = "JBSWY3DPEHPK3PXP";
    const T: u64 = 1_700_000_000;

    fn at(secret: &str, unix_seconds: u64) -> OtpAuthenticator {
        OtpAuthenticator::with_clock(secret, Arc::new(FixedClock(unix_seconds)))
            .expect("valid secret")
    }

    #[test]
    fn matches_rfc6238_sha1_vectors() {
        let auth = at(RFC_SECRET, 0);
        assert_eq!(auth.code_at(59), "287082");
        assert_eq!(auth.code_at(1_111_111_109), "081804");
        assert_eq!(auth.code_at(1_234_567_890), "005924");
        assert_eq!(auth.code_at(2_000_000_000), "279037");
    }

    #[test]
    fn accepts_codes_within_two_steps() {
        let expected = at(DEMO_SECRET, T).code_at(T);
        assert!(at(DEMO_SECRET, T).verify(&expected));
        assert!(at(DEMO_SECRET, T - 59).verify(&expected));
        assert!(at(DEMO_SECRET, T + 59).verify(&expected));
    }

    #[test]
    fn rejects_codes_outside_window() {
        let expected = at(DEMO_SECRET, T).code_at(T);
        assert!(!at(DEMO_SECRET, T - 121).verify(&expected));
        assert!(!at(DEMO_SECRET, T + 121).verify(&expected));
    }

    #[test]
    fn malformed_candidates_never_match() {
        let auth = at(DEMO_SECRET, T);
        assert!(!auth.verify(""));
        assert!(!auth.verify("12345"));
        assert!(!auth.verify("1234567"));
        assert!(!auth.verify("abcdef"));
    }

    #[test]
    fn current_code_is_zero_padded_six_digits() {
        let code = at(DEMO_SECRET, T).current_code();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn secret_formatting_is_tolerated() {
        let plain = at(DEMO_SECRET, T).current_code();
        let spaced = at("jbsw y3dp ehpk 3pxp", T).current_code();
        assert_eq!(plain, spaced);
    }

    #[test]
    fn blank_secret_fails_construction() {
        assert!(matches!(
            OtpAuthenticator::new("   "),
            Err(OtpError::MissingSecret)
        ));
        assert!(matches!(OtpAuthenticator::new(""), Err(OtpError::MissingSecret)));
    }

    #[test]
    fn keys_longer_than_the_hash_block_are_accepted() {
        let long_secret = BASE32_NOPAD.encode(&[0x5a; 100]);
        let auth = at(&long_secret, T);
        let code = auth.current_code();
        assert_eq!(code.len(), 6);
        assert!(auth.verify(&code));
    }

    #[test]
    fn invalid_secret_fails_construction() {
        assert!(matches!(
            OtpAuthenticator::new("NOT*BASE32"),
            Err(OtpError::InvalidSecret(_))
        ));
    }

    #[test]
    fn early_clock_does_not_underflow() {
        let auth = at(DEMO_SECRET, 10);
        let code = auth.code_at(10);
        assert!(auth.verify(&code));
    }
}
