use tracing::warn;

const SERVICE_NAME: &str = "com.proofread.app";
const API_KEY_ACCOUNT: &str = "corrector_api_key";

/// Where the corrector API key lives when it is not in `config.json`.
pub(crate) trait SecretStore {
    fn read_api_key(&self) -> Result<Option<String>, String>;

    /// Stores `api_key`, or removes the stored key when it is blank.
    fn write_api_key(&self, api_key: &str) -> Result<(), String>;
}

/// The platform credential store.
pub(crate) struct SystemKeyring;

impl SecretStore for SystemKeyring {
    fn read_api_key(&self) -> Result<Option<String>, String> {
        let entry =
            keyring::Entry::new(SERVICE_NAME, API_KEY_ACCOUNT).map_err(|err| err.to_string())?;

        match entry.get_password() {
            Ok(value) if value.trim().is_empty() => Ok(None),
            Ok(value) => Ok(Some(value.trim().to_string())),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(format!("failed to read API key from the keyring: {err}")),
        }
    }

    fn write_api_key(&self, api_key: &str) -> Result<(), String> {
        let entry =
            keyring::Entry::new(SERVICE_NAME, API_KEY_ACCOUNT).map_err(|err| err.to_string())?;
        let trimmed = api_key.trim();

        if trimmed.is_empty() {
            return match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(err) => Err(format!("failed to clear API key in the keyring: {err}")),
            };
        }

        entry
            .set_password(trimmed)
            .map_err(|err| format!("failed to save API key in the keyring: {err}"))
    }
}

/// Writes `api_key` and reads it back. `true` only when the store now holds
/// exactly that key, so a plaintext copy elsewhere may be dropped.
pub(crate) fn store_verified(secrets: &dyn SecretStore, api_key: &str) -> bool {
    if let Err(err) = secrets.write_api_key(api_key) {
        warn!("{err}; keeping API key in config");
        return false;
    }
    if api_key.trim().is_empty() {
        return true;
    }

    match secrets.read_api_key() {
        Ok(Some(saved)) if saved == api_key.trim() => true,
        Ok(_) => {
            warn!("keyring write could not be verified, keeping API key in config");
            false
        }
        Err(err) => {
            warn!("failed to verify API key in the keyring, keeping it in config: {err}");
            false
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{ForgetfulSecrets, MemorySecrets};
    use super::*;

    #[test]
    fn verified_store_requires_a_matching_read_back() {
        assert!(!store_verified(&ForgetfulSecrets, "my-key"));
        assert!(store_verified(&ForgetfulSecrets, "  "));

        let secrets = MemorySecrets::default();
        assert!(store_verified(&secrets, " my-key "));
        assert_eq!(secrets.read_api_key().expect("read"), Some("my-key".to_string()));
    }
}
