use tauri::State;

use crate::commands::{announce, finish};
use crate::error::ActionOutcome;
use crate::events::event_names;
use crate::evidence::{EvidenceView, VerifyOutcome};
use crate::state::AppState;

#[tauri::command]
pub async fn evidence_refresh(
    app: tauri::AppHandle,
    state: State<'_, AppState>,
) -> Result<ActionOutcome<Vec<EvidenceView>>, String> {
    let started = state.session_token();
    let result = state.refresh_evidence(None).await.map(|applied| {
        let views = state.evidence_views();
        if applied {
            announce(&app, event_names::EVIDENCE_UPDATED, views.clone());
        }
        views
    });
    finish(&app, &state, started, result)
}

#[tauri::command]
pub fn evidence_list(state: State<'_, AppState>) -> ActionOutcome<Vec<EvidenceView>> {
    ActionOutcome::ok(state.evidence_views())
}

#[tauri::command]
pub async fn evidence_verify(
    app: tauri::AppHandle,
    state: State<'_, AppState>,
    evidence_id: i64,
) -> Result<ActionOutcome<VerifyOutcome>, String> {
    let started = state.session_token();
    let result = state.verify_evidence(evidence_id).await;
    if result.is_ok() {
        announce(&app, event_names::EVIDENCE_UPDATED, state.evidence_views());
    }
    finish(&app, &state, started, result)
}
