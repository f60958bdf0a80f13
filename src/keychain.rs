use tracing::debug;

use crate::types::user::Role;

const SERVICE: &str = "dev.incidentwatch";

fn keychain_key(role: Role) -> String {
    format!("session_{}", role)
}

fn entry(role: Role) -> Result<keyring::Entry, String> {
    keyring::Entry::new(SERVICE, &keychain_key(role))
        .map_err(|e| format!("Failed to create keychain entry: {}", e))
}

/// Store a session token in the OS keychain.
pub fn keychain_set(role: Role, token: &str) -> Result<(), String> {
    entry(role)?
        .set_password(token)
        .map_err(|e| format!("Failed to store in keychain: {}", e))?;
    debug!(%role, "Session token stored in keychain");
    Ok(())
}

/// Retrieve a session token from the OS keychain. Returns None if not set.
pub fn keychain_get(role: Role) -> Result<Option<String>, String> {
    match entry(role)?.get_password() {
        Ok(token) => Ok(Some(token)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(format!("Failed to read from keychain: {}", e)),
    }
}

/// Delete a session token from the OS keychain.
pub fn keychain_delete(role: Role) -> Result<(), String> {
    match entry(role)?.delete_credential() {
        Ok(()) => {
            debug!(%role, "Session token deleted from keychain");
            Ok(())
        }
        Err(keyring::Error::NoEntry) => Ok(()), // Already gone
        Err(e) => Err(format!("Failed to delete from keychain: {}", e)),
    }
}
