use keyring::Entry;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Mutex;

const KEYRING_SERVICE: &str = "rapport";

/// Environment variable that overrides any stored bearer token.
pub const TOKEN_ENV_VAR: &str = "RAPPORT_TOKEN";

/// Describes failures when attempting to access the system keyring.
///
/// Recoverable errors mean the credential backend was temporarily
/// unavailable (a locked keychain, a missing secret-service daemon).
/// Permanent errors surface the underlying cause directly.
#[derive(Debug)]
pub enum TokenStoreError {
    Recoverable(keyring::Error),
    Permanent(keyring::Error),
}

impl TokenStoreError {
    fn inner(&self) -> &keyring::Error {
        match self {
            TokenStoreError::Recoverable(err) | TokenStoreError::Permanent(err) => err,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, TokenStoreError::Recoverable(_))
    }
}

impl From<keyring::Error> for TokenStoreError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::PlatformFailure(_) | keyring::Error::NoStorageAccess(_) => {
                TokenStoreError::Recoverable(err)
            }
            other => TokenStoreError::Permanent(other),
        }
    }
}

impl fmt::Display for TokenStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_recoverable() {
            write!(f, "system keyring unavailable: {}", self.inner())
        } else {
            write!(f, "system keyring error: {}", self.inner())
        }
    }
}

impl Error for TokenStoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.inner())
    }
}

/// Where bearer tokens live between runs. Tokens are keyed by backend
/// origin so several backends can be used side by side.
pub trait TokenStore: Send + Sync {
    fn get(&self, account: &str) -> Result<Option<String>, TokenStoreError>;
    fn set(&self, account: &str, token: &str) -> Result<(), TokenStoreError>;
    /// Returns whether a token was present.
    fn clear(&self, account: &str) -> Result<bool, TokenStoreError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct KeyringTokenStore;

impl KeyringTokenStore {
    pub fn new() -> Self {
        Self
    }
}

impl TokenStore for KeyringTokenStore {
    fn get(&self, account: &str) -> Result<Option<String>, TokenStoreError> {
        let entry = Entry::new(KEYRING_SERVICE, account)?;
        match entry.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, account: &str, token: &str) -> Result<(), TokenStoreError> {
        let entry = Entry::new(KEYRING_SERVICE, account)?;
        entry.set_password(token)?;
        Ok(())
    }

    fn clear(&self, account: &str) -> Result<bool, TokenStoreError> {
        let entry = Entry::new(KEYRING_SERVICE, account)?;
        match entry.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

/// Process-local store used by `--no-keyring` runs and tests.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tokens(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.tokens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, account: &str) -> Result<Option<String>, TokenStoreError> {
        Ok(self.tokens().get(account).cloned())
    }

    fn set(&self, account: &str, token: &str) -> Result<(), TokenStoreError> {
        self.tokens().insert(account.to_string(), token.to_string());
        Ok(())
    }

    fn clear(&self, account: &str) -> Result<bool, TokenStoreError> {
        Ok(self.tokens().remove(account).is_some())
    }
}

/// Reads the override token, ignoring blank values.
pub fn token_from_env() -> Option<String> {
    std::env::var(TOKEN_ENV_VAR)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
