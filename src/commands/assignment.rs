use std::collections::BTreeSet;

use tauri::State;

use crate::commands::{announce, finish};
use crate::dispatch::AssignmentReport;
use crate::error::ActionOutcome;
use crate::events::event_names;
use crate::state::AppState;
use crate::types::user::User;

#[tauri::command]
pub async fn assignment_security_users(
    app: tauri::AppHandle,
    state: State<'_, AppState>,
) -> Result<ActionOutcome<Vec<User>>, String> {
    let started = state.session_token();
    let result = state.security_users().await;
    finish(&app, &state, started, result)
}

#[tauri::command]
pub async fn assignment_assign(
    app: tauri::AppHandle,
    state: State<'_, AppState>,
    incident_ids: Vec<i64>,
    security_user_ids: Vec<i64>,
) -> Result<ActionOutcome<AssignmentReport>, String> {
    let started = state.session_token();
    let selection: BTreeSet<i64> = incident_ids.into_iter().collect();
    let result = state.assign(&selection, &security_user_ids).await;
    if result.as_ref().is_ok_and(AssignmentReport::is_success) {
        announce(&app, event_names::INCIDENTS_UPDATED, state.visible());
    }
    finish(&app, &state, started, result)
}
