use anyhow::{Context, Result};
use keyring::Entry;
use tracing::debug;

use crate::config::{APP_NAME, ENV_SYNC_KEY};

pub struct CredentialStore;

impl CredentialStore {
    /// Store the sync API key in the OS keychain
    pub fn store(account: &str, api_key: &str) -> Result<()> {
        let entry = Entry::new(APP_NAME, account).context("Failed to create keyring entry")?;
        entry
            .set_password(api_key)
            .context("Failed to store API key in keychain")?;
        Ok(())
    }

    /// Retrieve the sync API key from the OS keychain
    pub fn get(account: &str) -> Result<String> {
        let entry = Entry::new(APP_NAME, account).context("Failed to create keyring entry")?;
        entry
            .get_password()
            .context("Failed to retrieve API key from keychain")
    }

    pub fn delete(account: &str) -> Result<()> {
        let entry = Entry::new(APP_NAME, account).context("Failed to create keyring entry")?;
        entry
            .delete_credential()
            .context("Failed to delete API key from keychain")?;
        Ok(())
    }

    /// Environment variable first, then the keychain. `None` if neither has a key.
    pub fn resolve(account: &str) -> Option<String> {
        if let Some(key) = std::env::var(ENV_SYNC_KEY).ok().filter(|k| !k.is_empty()) {
            return Some(key);
        }
        match Self::get(account) {
            Ok(key) => Some(key),
            Err(e) => {
                debug!(error = %e, "No sync API key in keychain");
                None
            }
        }
    }
}
