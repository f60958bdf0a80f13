use tauri::State;

use crate::commands::finish;
use crate::error::ActionOutcome;
use crate::session::Session;
use crate::state::AppState;
use crate::types::user::{Credentials, Role, User};

#[tauri::command]
pub async fn auth_login(
    app: tauri::AppHandle,
    state: State<'_, AppState>,
    username: String,
    password: String,
    role: Role,
) -> Result<ActionOutcome<Session>, String> {
    let credentials = Credentials { username, password };
    let result = state.login(&credentials, role).await;
    finish(&app, &state, None, result)
}

#[tauri::command]
pub fn auth_logout(state: State<'_, AppState>) -> ActionOutcome<Option<Role>> {
    ActionOutcome::ok(state.logout())
}

/// Reopen a persisted session. Without `role`, the first role that has one wins.
#[tauri::command]
pub async fn auth_restore(
    app: tauri::AppHandle,
    state: State<'_, AppState>,
    role: Option<Role>,
) -> Result<ActionOutcome<Option<Session>>, String> {
    let result = state.restore(role).await;
    finish(&app, &state, None, result)
}

#[tauri::command]
pub fn auth_current_user(state: State<'_, AppState>) -> ActionOutcome<User> {
    state.current_user().into()
}
