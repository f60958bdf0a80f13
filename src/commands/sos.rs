use tauri::{AppHandle, State};
use tauri_plugin_notification::NotificationExt;
use tauri_plugin_opener::OpenerExt;
use tracing::warn;

use crate::commands::{announce, finish};
use crate::error::ActionOutcome;
use crate::events::{event_names, SosSent};
use crate::sos::{tel_uri, Dialer, NotSeenOutcome, SosContext, SosOutcome};
use crate::state::AppState;

/// Hands the number to the platform dialer.
pub struct OpenerDialer {
    app: AppHandle,
}

impl Dialer for OpenerDialer {
    fn dial(&self, number: &str) -> Result<(), String> {
        let uri = tel_uri(number)?;
        self.app
            .opener()
            .open_url(uri, None::<&str>)
            .map_err(|e| e.to_string())
    }
}

fn announce_sent(app: &AppHandle, outcome: &SosOutcome) {
    let incident_id = match outcome {
        SosOutcome::Sent { incident } => Some(incident.id),
        SosOutcome::RecordedLocally => None,
    };
    announce(app, event_names::SOS_SENT, SosSent { incident_id });
    if let Err(e) = app
        .notification()
        .builder()
        .title("SOS sent")
        .body("Security has been alerted.")
        .show()
    {
        warn!(error = %e, "Failed to show SOS notification");
    }
}

#[tauri::command]
pub async fn sos_trigger(
    app: AppHandle,
    state: State<'_, AppState>,
    context: SosContext,
) -> Result<ActionOutcome<SosOutcome>, String> {
    let started = state.session_token();
    let result = state.trigger_sos(&context).await;
    if let Ok(outcome) = &result {
        announce_sent(&app, outcome);
    }
    finish(&app, &state, started, result)
}

#[tauri::command]
pub async fn sos_not_seen(
    app: AppHandle,
    state: State<'_, AppState>,
    context: SosContext,
) -> Result<ActionOutcome<NotSeenOutcome>, String> {
    let started = state.session_token();
    let dialer = OpenerDialer { app: app.clone() };
    let result = state.report_not_seen(&context, &dialer).await;
    if let Ok(NotSeenOutcome { sos: Some(sos), .. }) = &result {
        announce_sent(&app, sos);
    }
    finish(&app, &state, started, result)
}
