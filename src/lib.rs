pub mod api;
pub mod board;
#[cfg(feature = "app")]
pub mod commands;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod evidence;
pub mod keychain;
pub mod lifecycle;
pub mod migrations;
pub mod optimistic;
pub mod poller;
pub mod session;
pub mod settings;
pub mod sos;
pub mod state;
pub mod types;
pub mod visibility;

use tracing_subscriber::EnvFilter;

/// Initialize structured logging with tracing.
/// Respects RUST_LOG env var; defaults to `info` level for this crate.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("incidentwatch=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

#[cfg(feature = "app")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use std::sync::Arc;

    use crate::api::http::HttpBackend;
    use crate::session::TokenStorage;
    use crate::state::AppState;
    use crate::types::config::API_URL_ENV;

    init_tracing();

    // Load .env from the crate root
    let manifest_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
    dotenvy::from_path(manifest_dir.join(".env")).ok();

    let data_dir = db::incidentwatch_data_dir();
    let db_path = data_dir.join("state").join("incidentwatch.sqlite");
    let pool = db::create_pool(&db_path).expect("Failed to create database pool");
    db::init_db(&pool).expect("Failed to initialize database");
    let applied = migrations::run_pending(&pool).expect("Failed to run migrations");
    if !applied.is_empty() {
        tracing::info!(migrations = ?applied, "Applied database migrations");
    }

    let config = settings::load_config(&pool).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Falling back to default config");
        Default::default()
    });
    let api_base = config.resolve_base_url(std::env::var(API_URL_ENV).ok());
    tracing::info!(api_base = %api_base, "Backend configured");
    let backend = Arc::new(HttpBackend::new(api_base.clone()));
    let state = AppState::new(pool, backend, api_base, config, TokenStorage::Keychain);

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_notification::init())
        .manage(state)
        .invoke_handler(tauri::generate_handler![
            commands::auth::auth_login,
            commands::auth::auth_logout,
            commands::auth::auth_restore,
            commands::auth::auth_current_user,
            commands::incidents::incidents_refresh,
            commands::incidents::incidents_visible,
            commands::incidents::incidents_acknowledge,
            commands::incidents::incidents_report,
            commands::sos::sos_trigger,
            commands::sos::sos_not_seen,
            commands::evidence::evidence_refresh,
            commands::evidence::evidence_list,
            commands::evidence::evidence_verify,
            commands::assignment::assignment_security_users,
            commands::assignment::assignment_assign,
            commands::profile::profile_update,
            commands::config::config_get,
            commands::config::config_update,
            commands::dashboard::dashboard_open,
            commands::dashboard::dashboard_close,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
