use rand::{rngs::OsRng, Rng};
use time::{Duration, OffsetDateTime};

use crate::auth::{error::IdentityError, repo_types::Account};
use crate::config::ResetConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCode {
    pub code: String,
    pub expires_at: OffsetDateTime,
}

/// Produces fixed-length numeric reset codes with a fixed lifetime.
#[derive(Debug, Clone)]
pub struct ResetCodeGenerator {
    length: usize,
    ttl: Duration,
}

impl ResetCodeGenerator {
    pub fn new(length: usize, ttl: Duration) -> Self {
        Self {
            length: length.max(1),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, now: OffsetDateTime) -> IssuedCode {
        let mut rng = OsRng;
        let code = (0..self.length)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect();
        IssuedCode {
            code,
            expires_at: now + self.ttl,
        }
    }
}

impl From<&ResetConfig> for ResetCodeGenerator {
    fn from(cfg: &ResetConfig) -> Self {
        Self::new(cfg.code_length, Duration::minutes(cfg.code_ttl_minutes))
    }
}

/// Validates `input` against the account's in-flight code without consuming it.
pub fn check(account: &Account, input: &str, now: OffsetDateTime) -> Result<(), IdentityError> {
    let (Some(code), Some(expires_at)) = (&account.reset_code, account.reset_code_expires_at)
    else {
        return Err(IdentityError::NoCodeInFlight);
    };
    if code != input {
        return Err(IdentityError::CodeMismatch);
    }
    if now >= expires_at {
        return Err(IdentityError::CodeExpired);
    }
    Ok(())
}
