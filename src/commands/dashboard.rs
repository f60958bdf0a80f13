use tauri::{AppHandle, Manager, State};

use crate::commands::{announce, finish, notify_expired};
use crate::error::ActionOutcome;
use crate::events::event_names;
use crate::poller::{ContextGuard, Subscription};
use crate::state::{log_poll_error, AppState};

async fn poll_tick(app: AppHandle, guard: ContextGuard) {
    let state = app.state::<AppState>();
    let started = state.session_token();
    match state.poll_once(&guard).await {
        Ok(result) => {
            if result.incidents {
                announce(&app, event_names::INCIDENTS_UPDATED, state.visible());
            }
            if result.evidence {
                announce(&app, event_names::EVIDENCE_UPDATED, state.evidence_views());
            }
        }
        Err(e) => {
            log_poll_error(&e);
            if let Some(role) = state.settle::<()>(started.as_deref(), Err(e)).expired {
                notify_expired(&app, role);
            }
        }
    }
}

/// Start polling for the signed-in user. Also re-arms the SOS button.
#[tauri::command]
pub async fn dashboard_open(
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<ActionOutcome<()>, String> {
    if let Err(e) = state.current_user() {
        return finish(&app, &state, None, Err(e));
    }
    let handle = app.clone();
    let subscription = Subscription::spawn(state.poll_interval(), move |guard| {
        poll_tick(handle.clone(), guard)
    });
    state.open_dashboard(subscription);
    Ok(ActionOutcome::ok(()))
}

#[tauri::command]
pub fn dashboard_close(state: State<'_, AppState>) -> ActionOutcome<bool> {
    ActionOutcome::ok(state.close_dashboard())
}
