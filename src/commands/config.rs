use tauri::State;
use tracing::info;

use crate::error::ActionOutcome;
use crate::settings;
use crate::state::AppState;
use crate::types::config::AppConfig;

#[tauri::command]
pub fn config_get(state: State<'_, AppState>) -> ActionOutcome<AppConfig> {
    ActionOutcome::ok(state.config())
}

/// Deep-merge a partial config. Poll interval changes apply the next time a
/// dashboard opens; a new API base applies on restart.
#[tauri::command]
pub fn config_update(
    state: State<'_, AppState>,
    patch: serde_json::Value,
) -> ActionOutcome<AppConfig> {
    match settings::config_update_db(&state.pool, &patch.to_string()) {
        Ok(config) => {
            info!("Config updated");
            state.set_config(config.clone());
            ActionOutcome::ok(config)
        }
        Err(e) => ActionOutcome::failed(e),
    }
}
