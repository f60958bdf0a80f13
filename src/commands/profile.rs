use tauri::State;

use crate::commands::finish;
use crate::error::ActionOutcome;
use crate::state::AppState;
use crate::types::user::{ProfileUpdate, User};

#[tauri::command]
pub async fn profile_update(
    app: tauri::AppHandle,
    state: State<'_, AppState>,
    update: ProfileUpdate,
) -> Result<ActionOutcome<User>, String> {
    let started = state.session_token();
    let result = state.update_profile(&update).await;
    finish(&app, &state, started, result)
}
