//! Engine configuration.
//!
//! The crypto configuration is environment-sourced and read exactly once,
//! at manager construction. There is no file-based configuration layer;
//! operators supply the master key out of band.

use tracing::warn;

use crate::encryption::MasterKey;

/// Environment variable holding the 64-hex-char master encryption key.
pub const ENCRYPTION_KEY_ENV: &str = "AEGIS_BACKUP_ENCRYPTION_KEY";

/// Environment variable that forces fail-closed encryption
/// (`true` / `1`).
pub const ENCRYPTION_REQUIRED_ENV: &str = "AEGIS_ENCRYPTION_REQUIRED";

/// Retention applied to jobs that do not specify their own.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Storage location applied to jobs that do not specify their own.
pub const DEFAULT_STORAGE_LOCATION: &str = "default";

/// At-rest encryption settings for the backup manager.
///
/// `required = true` is the fail-closed mode: without a valid key, every
/// backup execution fails rather than storing plaintext. The default mode
/// is fail-open; an invalid key is logged at startup and encryption is
/// simply disabled.
#[derive(Debug)]
pub struct EncryptionSettings {
    pub key: Option<MasterKey>,
    pub required: bool,
}

impl EncryptionSettings {
    /// No encryption, fail-open.
    pub fn disabled() -> Self {
        Self {
            key: None,
            required: false,
        }
    }

    /// Encrypt with the given key.
    pub fn with_key(key: MasterKey, required: bool) -> Self {
        Self {
            key: Some(key),
            required,
        }
    }

    /// Fail-closed without a key; every execution will refuse to store
    /// plaintext. Useful for tests and for deployments that inject keys
    /// late.
    pub fn required_without_key() -> Self {
        Self {
            key: None,
            required: true,
        }
    }

    /// Read settings from the process environment.
    ///
    /// Called once at manager construction. An unset key disables
    /// encryption; a malformed key is logged and treated as unset, which
    /// in fail-closed mode means every execution fails.
    pub fn from_env() -> Self {
        let required = std::env::var(ENCRYPTION_REQUIRED_ENV)
            .map(|v| {
                let v = v.trim().to_ascii_lowercase();
                v == "true" || v == "1"
            })
            .unwrap_or(false);

        let key = match std::env::var(ENCRYPTION_KEY_ENV) {
            Ok(raw) if !raw.trim().is_empty() => match MasterKey::from_hex(&raw) {
                Ok(key) => Some(key),
                Err(error) => {
                    warn!(%error, "invalid {ENCRYPTION_KEY_ENV}, at-rest encryption disabled");
                    None
                }
            },
            _ => None,
        };

        Self { key, required }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_settings_have_no_key() {
        let settings = EncryptionSettings::disabled();
        assert!(settings.key.is_none());
        assert!(!settings.required);
    }

    #[test]
    fn required_without_key_is_fail_closed() {
        let settings = EncryptionSettings::required_without_key();
        assert!(settings.key.is_none());
        assert!(settings.required);
    }
}
