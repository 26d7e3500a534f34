//! GitHub token storage using the OS keychain.
//!
//! Tokens live in the system's native credential storage (Keychain on macOS,
//! Credential Manager on Windows, Secret Service on Linux). A non-empty
//! `GITHUB_TOKEN` environment variable takes precedence over the keychain.

use crate::error::AppError;
use keyring::Entry;

/// Service name used in the keychain.
const SERVICE_NAME: &str = "pr-review-light";

/// Account name used in the keychain.
const ACCOUNT_NAME: &str = "github_token";

/// Environment variable that overrides the stored token.
pub const TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";

/// Where a resolved token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenOrigin {
    Environment,
    Keychain,
}

/// Credential storage operations.
pub struct CredentialService;

impl CredentialService {
    /// Store the GitHub token, replacing any existing one.
    pub fn store_token(token: &str) -> Result<(), AppError> {
        let token = normalize_token(token)
            .ok_or_else(|| AppError::credential_storage("Refusing to store an empty token"))?;

        Self::entry()?
            .set_password(token)
            .map_err(|e| AppError::credential_storage(format!("Failed to store token: {}", e)))?;

        log::info!("[credentials] GitHub token saved to keychain");
        Ok(())
    }

    /// Retrieve the stored token.
    pub fn get_token() -> Result<String, AppError> {
        Self::entry()?.get_password().map_err(|e| match e {
            keyring::Error::NoEntry => AppError::not_found_with_id("credential", ACCOUNT_NAME),
            _ => AppError::credential_storage(format!("Failed to retrieve token: {}", e)),
        })
    }

    /// Delete the stored token.
    ///
    /// This operation is idempotent - deleting a non-existent token is not an error.
    pub fn delete_token() -> Result<(), AppError> {
        match Self::entry()?.delete_credential() {
            Ok(()) => {
                log::info!("[credentials] GitHub token cleared");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(AppError::credential_storage(format!(
                "Failed to delete token: {}",
                e
            ))),
        }
    }

    /// Resolve the token to use: environment first, then keychain.
    ///
    /// Returns `Ok(None)` when neither has one.
    pub fn resolve_token() -> Result<Option<(String, TokenOrigin)>, AppError> {
        let env_token = std::env::var(TOKEN_ENV_VAR).ok();
        if let Some(token) = env_token.as_deref().and_then(normalize_token) {
            return Ok(Some((token.to_string(), TokenOrigin::Environment)));
        }

        match Self::get_token() {
            Ok(token) => Ok(normalize_token(&token)
                .map(|t| (t.to_string(), TokenOrigin::Keychain))),
            Err(AppError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn entry() -> Result<Entry, AppError> {
        Entry::new(SERVICE_NAME, ACCOUNT_NAME).map_err(|e| {
            AppError::credential_storage(format!("Failed to create keyring entry: {}", e))
        })
    }
}

/// Trim whitespace; an empty token is no token.
fn normalize_token(token: &str) -> Option<&str> {
    let trimmed = token.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_token() {
        assert_eq!(normalize_token("  ghp_abc \n"), Some("ghp_abc"));
        assert_eq!(normalize_token("   "), None);
        assert_eq!(normalize_token(""), None);
    }

    // Note: keychain round trips need a real credential store and are
    // exercised manually with `pr-review-light token set/status/clear`.
}
