//! Role-scoped sessions.
//!
//! One [`Session`] per role, plus a single active pointer. Tokens go to the
//! OS keychain with a SQLite fallback; the cached profile lives in SQLite.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::Backend;
use crate::db::DbPool;
use crate::error::{Error, Result};
use crate::keychain;
use crate::types::user::{Actor, Credentials, ProfileUpdate, Role, User};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub role: Role,
    #[serde(skip_serializing)]
    pub token: String,
    pub user: User,
}

impl Session {
    pub fn actor(&self) -> Actor {
        self.user.actor()
    }
}

// --- persistence helpers ---

pub fn token_set_db(pool: &DbPool, role: Role, token: &str) -> Result<(), String> {
    let conn = pool.get().map_err(|e| e.to_string())?;
    conn.execute(
        "INSERT INTO session_tokens (role, token) VALUES (?1, ?2)
         ON CONFLICT(role) DO UPDATE SET token = ?2, updated_at = datetime('now')",
        [role.as_str(), token],
    )
    .map_err(|e| e.to_string())?;
    Ok(())
}

pub fn token_get_db(pool: &DbPool, role: Role) -> Result<Option<String>, String> {
    let conn = pool.get().map_err(|e| e.to_string())?;
    match conn.query_row(
        "SELECT token FROM session_tokens WHERE role = ?1",
        [role.as_str()],
        |row| row.get(0),
    ) {
        Ok(token) => Ok(Some(token)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.to_string()),
    }
}

pub fn profile_set_db(pool: &DbPool, role: Role, user: &User) -> Result<(), String> {
    let json = serde_json::to_string(user).map_err(|e| e.to_string())?;
    let conn = pool.get().map_err(|e| e.to_string())?;
    conn.execute(
        "INSERT INTO session_profiles (role, profile) VALUES (?1, ?2)
         ON CONFLICT(role) DO UPDATE SET profile = ?2, updated_at = datetime('now')",
        [role.as_str(), &json],
    )
    .map_err(|e| e.to_string())?;
    Ok(())
}

pub fn profile_get_db(pool: &DbPool, role: Role) -> Result<Option<User>, String> {
    let conn = pool.get().map_err(|e| e.to_string())?;
    let json: Option<String> = match conn.query_row(
        "SELECT profile FROM session_profiles WHERE role = ?1",
        [role.as_str()],
        |row| row.get(0),
    ) {
        Ok(json) => Some(json),
        Err(rusqlite::Error::QueryReturnedNoRows) => None,
        Err(e) => return Err(e.to_string()),
    };
    match json {
        Some(json) => serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| e.to_string()),
        None => Ok(None),
    }
}

/// Remove everything persisted for a role.
pub fn session_delete_db(pool: &DbPool, role: Role) -> Result<(), String> {
    let conn = pool.get().map_err(|e| e.to_string())?;
    conn.execute("DELETE FROM session_tokens WHERE role = ?1", [role.as_str()])
        .map_err(|e| e.to_string())?;
    conn.execute("DELETE FROM session_profiles WHERE role = ?1", [role.as_str()])
        .map_err(|e| e.to_string())?;
    Ok(())
}

/// Where tokens are kept between launches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStorage {
    /// OS keychain, falling back to SQLite when the keychain is unavailable.
    Keychain,
    /// SQLite only.
    Database,
}

pub struct SessionVault {
    pool: DbPool,
    storage: TokenStorage,
}

impl SessionVault {
    pub fn new(pool: DbPool, storage: TokenStorage) -> Self {
        Self { pool, storage }
    }

    pub fn save(&self, session: &Session) -> Result<(), String> {
        let role = session.role;
        let stored_in_keychain = match self.storage {
            TokenStorage::Keychain => match keychain::keychain_set(role, &session.token) {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, %role, "Keychain write failed, falling back to DB");
                    false
                }
            },
            TokenStorage::Database => false,
        };
        if !stored_in_keychain {
            token_set_db(&self.pool, role, &session.token)?;
        }
        profile_set_db(&self.pool, role, &session.user)
    }

    /// Token first from the keychain, then from the DB fallback.
    pub fn load_token(&self, role: Role) -> Result<Option<String>, String> {
        if self.storage == TokenStorage::Keychain {
            match keychain::keychain_get(role) {
                Ok(Some(token)) => return Ok(Some(token)),
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, %role, "Keychain read failed, falling back to DB");
                }
            }
        }
        token_get_db(&self.pool, role)
    }

    pub fn load_profile(&self, role: Role) -> Result<Option<User>, String> {
        profile_get_db(&self.pool, role)
    }

    pub fn save_profile(&self, role: Role, user: &User) -> Result<(), String> {
        profile_set_db(&self.pool, role, user)
    }

    pub fn clear(&self, role: Role) -> Result<(), String> {
        if self.storage == TokenStorage::Keychain {
            if let Err(e) = keychain::keychain_delete(role) {
                warn!(error = %e, %role, "Keychain delete failed");
            }
        }
        session_delete_db(&self.pool, role)
    }
}

#[derive(Default)]
struct SessionState {
    sessions: HashMap<Role, Session>,
    active: Option<Role>,
}

/// Process-wide session state. Only login, logout, expiry and profile
/// refresh write to it.
pub struct SessionStore {
    state: Mutex<SessionState>,
    vault: SessionVault,
}

impl SessionStore {
    pub fn new(vault: SessionVault) -> Self {
        Self {
            state: Mutex::new(SessionState::default()),
            vault,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub async fn login<B: Backend + ?Sized>(
        &self,
        backend: &B,
        credentials: &Credentials,
        role: Role,
    ) -> Result<Session> {
        if credentials.username.trim().is_empty() || credentials.password.is_empty() {
            return Err(Error::Validation("username and password are required".to_string()));
        }
        let grant = backend.authenticate(credentials, role).await?;
        let session = Session {
            role,
            token: grant.token,
            user: grant.user,
        };
        self.install(session.clone());
        if let Err(e) = self.vault.save(&session) {
            warn!(error = %e, %role, "Failed to persist session");
        }
        info!(%role, user_id = session.user.id, "Logged in");
        Ok(session)
    }

    fn install(&self, session: Session) {
        let mut state = self.lock();
        let role = session.role;
        state.sessions.insert(role, session);
        state.active = Some(role);
    }

    /// Re-open a persisted session for `role`, re-resolving the profile.
    pub async fn restore<B: Backend + ?Sized>(
        &self,
        backend: &B,
        role: Role,
    ) -> Result<Option<Session>> {
        let Some(token) = self.vault.load_token(role).map_err(Error::storage)? else {
            debug!(%role, "No persisted session");
            return Ok(None);
        };

        let user = match backend.fetch_current_user(&token).await {
            Ok(user) => user,
            Err(Error::Unauthorized) => {
                info!(%role, "Persisted session rejected, clearing");
                self.vault.clear(role).map_err(Error::storage)?;
                return Ok(None);
            }
            Err(Error::Network(msg)) => {
                // Offline start: fall back to the cached profile if there is one
                match self.vault.load_profile(role).map_err(Error::storage)? {
                    Some(cached) => {
                        warn!(%role, error = %msg, "Using cached profile, backend unreachable");
                        cached
                    }
                    None => return Err(Error::Network(msg)),
                }
            }
            Err(e) => return Err(e),
        };

        if user.role != role {
            self.vault.clear(role).map_err(Error::storage)?;
            return Err(Error::Forbidden(format!(
                "stored {} session belongs to a {} account",
                role, user.role
            )));
        }

        let session = Session { role, token, user };
        if let Err(e) = self.vault.save_profile(role, &session.user) {
            warn!(error = %e, %role, "Failed to cache profile");
        }
        self.install(session.clone());
        Ok(Some(session))
    }

    pub fn active(&self) -> Result<Session> {
        let state = self.lock();
        state
            .active
            .and_then(|role| state.sessions.get(&role))
            .cloned()
            .ok_or(Error::NoActiveSession)
    }

    /// Clear the active session. Returns the role that was logged out.
    pub fn logout(&self) -> Option<Role> {
        let role = {
            let mut state = self.lock();
            let role = state.active.take()?;
            state.sessions.remove(&role);
            role
        };
        if let Err(e) = self.vault.clear(role) {
            warn!(error = %e, %role, "Failed to clear persisted session");
        }
        info!(%role, "Logged out");
        Some(role)
    }

    /// Forced logout after a request sent with `token` failed auth. Only
    /// the first caller gets the role back, and a session that has since
    /// replaced the one holding `token` is left alone.
    pub fn expire(&self, token: &str) -> Option<Role> {
        let role = {
            let mut state = self.lock();
            let role = state.active?;
            if state.sessions.get(&role).map(|s| s.token.as_str()) != Some(token) {
                debug!(%role, "Auth failure from an earlier session, ignoring");
                return None;
            }
            state.active = None;
            state.sessions.remove(&role);
            role
        };
        if let Err(e) = self.vault.clear(role) {
            warn!(error = %e, %role, "Failed to clear persisted session");
        }
        warn!(%role, "Session expired");
        Some(role)
    }

    /// Replace the active user after a profile update.
    pub fn refresh_profile(&self, user: User) -> Result<Session> {
        let session = {
            let mut state = self.lock();
            let role = state.active.ok_or(Error::NoActiveSession)?;
            let session = state
                .sessions
                .get_mut(&role)
                .ok_or(Error::NoActiveSession)?;
            if session.user.id != user.id {
                return Err(Error::Forbidden("profile belongs to another user".to_string()));
            }
            if session.user.email != user.email {
                warn!(user_id = user.id, "Backend changed immutable email, keeping original");
            }
            let email = session.user.email.clone();
            session.user = User { email, ..user };
            session.clone()
        };
        if let Err(e) = self.vault.save_profile(session.role, &session.user) {
            warn!(error = %e, "Failed to cache profile");
        }
        Ok(session)
    }

    /// Send a profile edit for the active user and keep the returned profile.
    pub async fn update_profile<B: Backend + ?Sized>(
        &self,
        backend: &B,
        update: &ProfileUpdate,
    ) -> Result<Session> {
        if update.is_empty() {
            return Err(Error::Validation("nothing to update".to_string()));
        }
        if update.username.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(Error::Validation("username must not be empty".to_string()));
        }
        let session = self.active()?;
        let user = backend
            .update_user_profile(&session.token, session.user.id, update)
            .await?;
        info!(user_id = user.id, "Profile updated");
        self.refresh_profile(user)
    }
}
