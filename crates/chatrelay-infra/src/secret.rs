//! Environment variable API key lookup.
//!
//! The provider key is read once at startup from the variable named by
//! `provider.api_key_env` and kept inside a [`SecretString`] from then on.

use secrecy::SecretString;

use chatrelay_types::error::ConfigError;

/// Read an API key from the named environment variable.
///
/// An unset, empty, or non-Unicode variable counts as missing.
pub fn api_key_from_env(var: &str) -> Result<SecretString, ConfigError> {
    match std::env::var(var) {
        Ok(val) if !val.trim().is_empty() => Ok(SecretString::from(val)),
        Ok(_) | Err(std::env::VarError::NotPresent) | Err(std::env::VarError::NotUnicode(_)) => {
            Err(ConfigError::MissingApiKey(var.to_string()))
        }
    }
}
