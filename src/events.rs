use serde::Serialize;

use crate::types::user::Role;

/// Event names shared with the frontend.
pub mod event_names {
    pub const INCIDENTS_UPDATED: &str = "incidents:updated";
    pub const EVIDENCE_UPDATED: &str = "evidence:updated";
    pub const SESSION_EXPIRED: &str = "session:expired";
    pub const SOS_SENT: &str = "sos:sent";
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionExpired {
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SosSent {
    /// Absent when the alert could not be attached to a camera.
    pub incident_id: Option<i64>,
}

#[cfg(feature = "app")]
pub fn emit_event<R: tauri::Runtime, T: Serialize + Clone>(
    app: &tauri::AppHandle<R>,
    event: &str,
    payload: T,
) -> Result<(), String> {
    use tauri::Emitter;
    app.emit(event, payload).map_err(|e| e.to_string())
}
