use tauri::State;

use crate::commands::{announce, finish};
use crate::error::ActionOutcome;
use crate::events::event_names;
use crate::lifecycle::ReportDraft;
use crate::state::AppState;
use crate::types::incident::Incident;
use crate::visibility::IncidentView;

#[tauri::command]
pub async fn incidents_refresh(
    app: tauri::AppHandle,
    state: State<'_, AppState>,
) -> Result<ActionOutcome<IncidentView>, String> {
    let started = state.session_token();
    let result = state.refresh_incidents(None).await.map(|applied| {
        let view = state.visible();
        if applied {
            announce(&app, event_names::INCIDENTS_UPDATED, view.clone());
        }
        view
    });
    finish(&app, &state, started, result)
}

#[tauri::command]
pub fn incidents_visible(state: State<'_, AppState>) -> ActionOutcome<IncidentView> {
    ActionOutcome::ok(state.visible())
}

#[tauri::command]
pub async fn incidents_acknowledge(
    app: tauri::AppHandle,
    state: State<'_, AppState>,
    incident_id: i64,
) -> Result<ActionOutcome<Incident>, String> {
    let started = state.session_token();
    let result = state.acknowledge(incident_id).await;
    if result.is_ok() {
        announce(&app, event_names::INCIDENTS_UPDATED, state.visible());
    }
    finish(&app, &state, started, result)
}

#[tauri::command]
pub async fn incidents_report(
    app: tauri::AppHandle,
    state: State<'_, AppState>,
    draft: ReportDraft,
) -> Result<ActionOutcome<Incident>, String> {
    let started = state.session_token();
    let result = state.report(draft).await;
    finish(&app, &state, started, result)
}
