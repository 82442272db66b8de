//! Domain-scoped security settings.
//!
//! A [`SecuritySetting`] aggregates the password policy and the login policy
//! of one domain. Partial updates use JSON merge-patch semantics: fields present
//! in the patch overwrite, absent fields keep their value, nested objects merge
//! recursively and `null` resets a field to its default.

use std::net::IpAddr;
use std::str::FromStr;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SecuritySetting {
    pub password_security: PasswordPolicy,
    pub login_security: LoginPolicy,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettingError {
    #[error("patch must be a JSON object")]
    PatchNotObject,

    #[error("invalid patch: {0}")]
    InvalidPatch(String),

    #[error("invalid setting: {0}")]
    Invalid(String),
}

impl SecuritySetting {
    /// Check the cross-field constraints the type system cannot express.
    pub fn validate(&self) -> Result<(), SettingError> {
        let login = &self.login_security;

        if login.retry_lock {
            if login.retry_lock_config.retry_limit == 0 {
                return Err(SettingError::Invalid(
                    "retry_limit must be at least 1 when retry_lock is enabled".to_string(),
                ));
            }
            if login.retry_lock_config.locked_minutes == 0 {
                return Err(SettingError::Invalid(
                    "locked_minutes must be at least 1 when retry_lock is enabled".to_string(),
                ));
            }
        }

        for entry in &login.ip_limit_config.ip {
            IpNetwork::from_str(entry.trim())
                .map_err(|e| SettingError::Invalid(format!("ip entry '{entry}': {e}")))?;
        }

        Ok(())
    }

    /// Apply a merge-patch document and return the validated result.
    ///
    /// `self` is left untouched; the caller persists the returned value.
    pub fn apply_patch(&self, patch: &Value) -> Result<Self, SettingError> {
        if !patch.is_object() {
            return Err(SettingError::PatchNotObject);
        }

        let mut doc =
            serde_json::to_value(self).map_err(|e| SettingError::InvalidPatch(e.to_string()))?;
        merge_patch(&mut doc, patch);

        let patched: SecuritySetting =
            serde_json::from_value(doc).map_err(|e| SettingError::InvalidPatch(e.to_string()))?;
        patched.validate()?;
        Ok(patched)
    }
}

/// RFC 7386 merge of `patch` into `target`.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(fields) = patch else {
        *target = patch.clone();
        return;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(map) = target {
        for (key, value) in fields {
            if value.is_null() {
                map.remove(key);
            } else {
                merge_patch(map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Password policy
// ─────────────────────────────────────────────────────────────────────────────

/// Password composition, reuse and aging rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PasswordPolicy {
    /// Minimum length in characters.
    pub length: u32,
    pub include_number: bool,
    pub include_lower_letter: bool,
    pub include_upper_letter: bool,
    pub include_symbols: bool,
    /// How many retained password hashes a new password is checked against.
    pub repeat_limit: u32,
    /// Days after the last change before the password expires (0 = never).
    pub expired_days: u32,
    /// Days before expiry during which a reset hint is raised.
    pub remind_days: u32,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            length: 8,
            include_number: true,
            include_lower_letter: true,
            include_upper_letter: false,
            include_symbols: false,
            repeat_limit: 1,
            expired_days: 0,
            remind_days: 0,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Login policy
// ─────────────────────────────────────────────────────────────────────────────

/// Abuse-prevention rules evaluated on every password login.
///
/// Each rule has a toggle; a disabled rule is never evaluated regardless of
/// what its config block contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoginPolicy {
    pub retry_lock: bool,
    pub retry_lock_config: RetryLockConfig,
    pub exception_lock: bool,
    pub exception_lock_config: ExceptionLockConfig,
    pub ip_limit: bool,
    pub ip_limit_config: IpLimitConfig,
}

impl Default for LoginPolicy {
    fn default() -> Self {
        Self {
            retry_lock: true,
            retry_lock_config: RetryLockConfig::default(),
            exception_lock: true,
            exception_lock_config: ExceptionLockConfig::default(),
            ip_limit: false,
            ip_limit_config: IpLimitConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryLockConfig {
    /// Consecutive failures that trigger a lock.
    pub retry_limit: u32,
    /// Lock duration.
    pub locked_minutes: u32,
}

impl Default for RetryLockConfig {
    fn default() -> Self {
        Self {
            retry_limit: 5,
            locked_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExceptionLockConfig {
    /// Escalate when the caller reports a login from a new location.
    pub other_place_login: bool,
    /// Escalate when the account has been idle longer than this many days.
    pub not_login_days: u32,
}

impl Default for ExceptionLockConfig {
    fn default() -> Self {
        Self {
            other_place_login: true,
            not_login_days: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpLimitMode {
    /// Only listed addresses may log in.
    #[default]
    Allow,
    /// Listed addresses may not log in.
    Deny,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IpLimitConfig {
    pub mode: IpLimitMode,
    /// Single addresses (`10.0.0.1`) or networks (`10.0.0.0/24`).
    pub ip: Vec<String>,
}

impl IpLimitConfig {
    /// Whether `addr` matches any entry of the list.
    ///
    /// Unparsable entries never match; [`SecuritySetting::validate`] keeps them
    /// out of stored settings.
    pub fn contains(&self, addr: IpAddr) -> bool {
        self.ip.iter().any(|entry| match IpNetwork::from_str(entry.trim()) {
            Ok(network) => network.contains(addr),
            Err(_) => {
                tracing::warn!(entry = %entry, "ignoring unparsable ip limit entry");
                false
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_match_documented_values() {
        let setting = SecuritySetting::default();
        assert_eq!(setting.password_security.length, 8);
        assert!(setting.password_security.include_number);
        assert!(!setting.password_security.include_symbols);
        assert!(setting.login_security.retry_lock);
        assert_eq!(setting.login_security.retry_lock_config.retry_limit, 5);
        assert_eq!(setting.login_security.retry_lock_config.locked_minutes, 30);
        assert_eq!(setting.login_security.exception_lock_config.not_login_days, 30);
        assert!(!setting.login_security.ip_limit);
        assert!(setting.validate().is_ok());
    }

    #[test]
    fn patch_updates_only_supplied_field() {
        let original = SecuritySetting::default();
        let patched = original
            .apply_patch(&json!({ "password_security": { "length": 10 } }))
            .unwrap();

        assert_eq!(patched.password_security.length, 10);
        assert_eq!(patched.login_security, original.login_security);

        let mut expected = original.password_security.clone();
        expected.length = 10;
        assert_eq!(patched.password_security, expected);
    }

    #[test]
    fn patch_merges_nested_objects_recursively() {
        let original = SecuritySetting::default();
        let patched = original
            .apply_patch(&json!({
                "login_security": { "retry_lock_config": { "retry_limit": 3 } }
            }))
            .unwrap();

        assert_eq!(patched.login_security.retry_lock_config.retry_limit, 3);
        assert_eq!(patched.login_security.retry_lock_config.locked_minutes, 30);
        assert_eq!(patched.password_security, original.password_security);
    }

    #[test]
    fn null_resets_field_to_default() {
        let mut original = SecuritySetting::default();
        original.password_security.length = 16;

        let patched = original
            .apply_patch(&json!({ "password_security": { "length": null } }))
            .unwrap();
        assert_eq!(patched.password_security.length, 8);
    }

    #[test]
    fn arrays_are_replaced_not_merged() {
        let mut original = SecuritySetting::default();
        original.login_security.ip_limit_config.ip = vec!["10.0.0.1".to_string()];

        let patched = original
            .apply_patch(&json!({ "login_security": { "ip_limit_config": { "ip": ["10.0.0.2"] } } }))
            .unwrap();
        assert_eq!(patched.login_security.ip_limit_config.ip, vec!["10.0.0.2".to_string()]);
    }

    #[test]
    fn negative_threshold_is_rejected() {
        let err = SecuritySetting::default()
            .apply_patch(&json!({ "password_security": { "length": -1 } }))
            .unwrap_err();
        assert!(matches!(err, SettingError::InvalidPatch(_)));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = SecuritySetting::default()
            .apply_patch(&json!({ "password_security": { "lenght": 10 } }))
            .unwrap_err();
        assert!(matches!(err, SettingError::InvalidPatch(_)));
    }

    #[test]
    fn non_object_patch_is_rejected() {
        let err = SecuritySetting::default().apply_patch(&json!([1, 2])).unwrap_err();
        assert_eq!(err, SettingError::PatchNotObject);
    }

    #[test]
    fn zero_retry_limit_is_invalid_only_when_enabled() {
        let base = SecuritySetting::default();
        let err = base
            .apply_patch(&json!({ "login_security": { "retry_lock_config": { "retry_limit": 0 } } }))
            .unwrap_err();
        assert!(matches!(err, SettingError::Invalid(_)));

        let ok = base.apply_patch(&json!({
            "login_security": { "retry_lock": false, "retry_lock_config": { "retry_limit": 0 } }
        }));
        assert!(ok.is_ok());
    }

    #[test]
    fn bad_ip_entry_is_invalid() {
        let err = SecuritySetting::default()
            .apply_patch(&json!({ "login_security": { "ip_limit_config": { "ip": ["nope"] } } }))
            .unwrap_err();
        assert!(matches!(err, SettingError::Invalid(_)));
    }

    #[test]
    fn ip_list_matches_addresses_and_networks() {
        let config = IpLimitConfig {
            mode: IpLimitMode::Allow,
            ip: vec!["10.0.0.1".to_string(), "192.168.1.0/24".to_string()],
        };
        assert!(config.contains("10.0.0.1".parse().unwrap()));
        assert!(!config.contains("10.0.0.2".parse().unwrap()));
        assert!(config.contains("192.168.1.77".parse().unwrap()));
        assert!(!config.contains("192.168.2.1".parse().unwrap()));
    }

    #[test]
    fn merge_patch_follows_rfc_example() {
        let mut target = json!({ "a": "b", "c": { "d": "e", "f": "g" } });
        merge_patch(&mut target, &json!({ "a": "z", "c": { "f": null } }));
        assert_eq!(target, json!({ "a": "z", "c": { "d": "e" } }));
    }
}
