/// Session token persistence
///
/// The production store is the OS credential store:
/// - macOS/iOS: Keychain
/// - Linux: Secret Service API (gnome-keyring, KWallet, etc.)
/// - Windows: Credential Manager
use keyring::Entry;
use url::Url;

const SERVICE_NAME: &str = "fr.assubot.client";

#[derive(Debug, thiserror::Error)]
pub enum TokenStoreError {
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Where the session token is persisted between runs.
///
/// The keyring is the production store; tests and headless hosts plug in
/// [`MemoryTokenStore`].
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Option<String>;
    fn save(&self, token: &str);
    fn clear(&self);
}

/// Keyring-backed token store with one entry per backend origin, so sessions
/// against different deployments live side by side.
///
/// Failures are logged, never fatal: a missing keyring only means the user
/// logs in again next run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyringTokenStore {
    account: String,
}

impl KeyringTokenStore {
    pub fn for_api(api_base_url: &str) -> Self {
        let origin = Url::parse(api_base_url)
            .ok()
            .and_then(|url| {
                let host = url.host_str()?.to_string();
                Some(match url.port_or_known_default() {
                    Some(port) => format!("{}:{}", host, port),
                    None => host,
                })
            })
            .unwrap_or_else(|| "default".to_string());
        Self {
            account: format!("session_token@{}", origin),
        }
    }

    /// Keyring account name of this store's entry
    pub fn account(&self) -> &str {
        &self.account
    }

    fn entry(&self) -> Result<Entry, TokenStoreError> {
        Ok(Entry::new(SERVICE_NAME, &self.account)?)
    }

    pub fn try_load(&self) -> Result<Option<String>, TokenStoreError> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn try_save(&self, token: &str) -> Result<(), TokenStoreError> {
        self.entry()?.set_password(token)?;
        Ok(())
    }

    pub fn try_clear(&self) -> Result<(), TokenStoreError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl TokenStore for KeyringTokenStore {
    fn load(&self) -> Option<String> {
        self.try_load().unwrap_or_else(|e| {
            tracing::warn!(account = %self.account, "Failed to read session token: {}", e);
            None
        })
    }

    fn save(&self, token: &str) {
        if let Err(e) = self.try_save(token) {
            tracing::warn!(account = %self.account, "Failed to persist session token: {}", e);
        }
    }

    fn clear(&self) {
        if let Err(e) = self.try_clear() {
            tracing::warn!(account = %self.account, "Failed to delete session token: {}", e);
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: parking_lot::Mutex<Option<String>>,
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<String> {
        self.token.lock().clone()
    }

    fn save(&self, token: &str) {
        *self.token.lock() = Some(token.to_string());
    }

    fn clear(&self) {
        *self.token.lock() = None;
    }
}
