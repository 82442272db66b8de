//! Credential policy: composition, reuse and aging of passwords.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher as _, PasswordVerifier as _};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::Serialize;
use thiserror::Error;

use crate::account::PasswordRecord;
use crate::setting::PasswordPolicy;

// ─────────────────────────────────────────────────────────────────────────────
// Hashing
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashError {
    #[error("invalid hasher parameters: {0}")]
    Params(String),

    #[error("hashing failed: {0}")]
    Hash(String),
}

/// Password hashing seam. Implementations must be safe to share across threads.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, HashError>;

    /// `false` for a wrong password and for an unparsable stored hash alike.
    fn verify(&self, password: &str, hash: &str) -> bool;
}

/// Argon2id hasher producing PHC strings.
#[derive(Debug, Clone, Default)]
pub struct Argon2Hasher {
    params: argon2::Params,
}

impl Argon2Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Custom cost parameters (memory in KiB, iterations, parallelism).
    pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, HashError> {
        let params = argon2::Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| HashError::Params(e.to_string()))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(
            argon2::Algorithm::Argon2id,
            argon2::Version::V0x13,
            self.params.clone(),
        )
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, HashError> {
        let mut salt_bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| HashError::Hash(e.to_string()))?;

        Ok(self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| HashError::Hash(e.to_string()))?
            .to_string())
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        self.argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Composition & reuse
// ─────────────────────────────────────────────────────────────────────────────

/// The first rule a candidate password failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Violation {
    Length { min: u32 },
    Number,
    LowerLetter,
    UpperLetter,
    Symbol,
    Reused { depth: u32 },
}

impl Violation {
    pub fn code(&self) -> &'static str {
        match self {
            Violation::Length { .. } => "length",
            Violation::Number => "number",
            Violation::LowerLetter => "lower_letter",
            Violation::UpperLetter => "upper_letter",
            Violation::Symbol => "symbol",
            Violation::Reused { .. } => "reused",
        }
    }
}

impl core::fmt::Display for Violation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Violation::Length { min } => write!(f, "must be at least {min} characters long"),
            Violation::Number => f.write_str("must contain a number"),
            Violation::LowerLetter => f.write_str("must contain a lowercase letter"),
            Violation::UpperLetter => f.write_str("must contain an uppercase letter"),
            Violation::Symbol => f.write_str("must contain a symbol"),
            Violation::Reused { depth } => {
                write!(f, "must differ from the last {depth} passwords")
            }
        }
    }
}

fn is_symbol(c: char) -> bool {
    !c.is_alphanumeric() && !c.is_whitespace()
}

/// Test the enabled composition rules in order: length, number, lowercase,
/// uppercase, symbol. Returns the first failure.
pub fn check_composition(password: &str, policy: &PasswordPolicy) -> Option<Violation> {
    if password.chars().count() < policy.length as usize {
        return Some(Violation::Length { min: policy.length });
    }
    if policy.include_number && !password.chars().any(|c| c.is_ascii_digit()) {
        return Some(Violation::Number);
    }
    if policy.include_lower_letter && !password.chars().any(char::is_lowercase) {
        return Some(Violation::LowerLetter);
    }
    if policy.include_upper_letter && !password.chars().any(char::is_uppercase) {
        return Some(Violation::UpperLetter);
    }
    if policy.include_symbols && !password.chars().any(is_symbol) {
        return Some(Violation::Symbol);
    }
    None
}

/// Refuse a password matching one of the newest `depth` retained hashes.
pub fn check_reuse(
    password: &str,
    record: &PasswordRecord,
    depth: u32,
    hasher: &dyn PasswordHasher,
) -> Option<Violation> {
    record
        .retained()
        .take(depth as usize)
        .any(|hash| hasher.verify(password, hash))
        .then_some(Violation::Reused { depth })
}

/// Composition first, then reuse against the account's retained hashes.
pub fn validate_new_password(
    password: &str,
    policy: &PasswordPolicy,
    record: &PasswordRecord,
    hasher: &dyn PasswordHasher,
) -> Result<(), Violation> {
    if let Some(violation) = check_composition(password, policy) {
        return Err(violation);
    }
    if let Some(violation) = check_reuse(password, record, policy.repeat_limit, hasher) {
        return Err(violation);
    }
    Ok(())
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordChangeError {
    #[error("password {0}")]
    Policy(Violation),

    #[error(transparent)]
    Hash(#[from] HashError),
}

/// Validate `new_password` and produce the record the store should persist.
pub fn change_password(
    record: &PasswordRecord,
    new_password: &str,
    policy: &PasswordPolicy,
    hasher: &dyn PasswordHasher,
    now: DateTime<Utc>,
) -> Result<PasswordRecord, PasswordChangeError> {
    validate_new_password(new_password, policy, record, hasher).map_err(PasswordChangeError::Policy)?;
    let hash = hasher.hash(new_password)?;
    Ok(record.rotate(hash, now, policy.repeat_limit))
}

// ─────────────────────────────────────────────────────────────────────────────
// Aging
// ─────────────────────────────────────────────────────────────────────────────

/// Aging state of a password at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Aging {
    Ok,
    /// Still valid, but inside the reminder window.
    NeedsReset { remaining_days: u32 },
    Expired,
}

/// Aging of `record` under `policy`. `expired_days == 0` disables aging.
pub fn evaluate_aging(record: &PasswordRecord, policy: &PasswordPolicy, now: DateTime<Utc>) -> Aging {
    if policy.expired_days == 0 {
        return Aging::Ok;
    }

    // A timestamp in the future counts as changed today.
    let elapsed_days = (now - record.updated_at).num_days().max(0);
    let delta = elapsed_days - i64::from(policy.expired_days);

    if delta > 0 {
        return Aging::Expired;
    }

    let remaining = -delta;
    if remaining < i64::from(policy.remind_days) {
        Aging::NeedsReset {
            remaining_days: u32::try_from(remaining).unwrap_or(u32::MAX),
        }
    } else {
        Aging::Ok
    }
}
