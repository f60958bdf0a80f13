pub mod assignment;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod evidence;
pub mod incidents;
pub mod profile;
pub mod sos;

use tauri::AppHandle;
use tracing::warn;

use crate::error::{ActionOutcome, Result};
use crate::events::{emit_event, event_names, SessionExpired};
use crate::state::AppState;

/// Every command funnels its result through here so an expired session is
/// announced exactly once. `started` is the session token the command ran
/// under, from `AppState::session_token`.
pub(crate) fn finish<T>(
    app: &AppHandle,
    state: &AppState,
    started: Option<String>,
    result: Result<T>,
) -> Result<ActionOutcome<T>, String> {
    let settled = state.settle(started.as_deref(), result);
    if let Some(role) = settled.expired {
        notify_expired(app, role);
    }
    Ok(settled.outcome)
}

pub(crate) fn notify_expired(app: &AppHandle, role: crate::types::user::Role) {
    if let Err(e) = emit_event(app, event_names::SESSION_EXPIRED, SessionExpired { role }) {
        warn!(error = %e, "Failed to emit session expiry");
    }
}

/// Emit without failing the command that triggered it.
pub(crate) fn announce<T: serde::Serialize + Clone>(app: &AppHandle, event: &str, payload: T) {
    if let Err(e) = emit_event(app, event, payload) {
        warn!(event, error = %e, "Failed to emit event");
    }
}
