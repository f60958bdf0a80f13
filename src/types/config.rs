use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const API_URL_ENV: &str = "INCIDENTWATCH_API_URL";

/// Settings persisted under the `main` config key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Developer override pointing the client at another backend host.
    pub api_base_url: Option<String>,
    /// Cameras with an id at or above this are shared AI worker cameras.
    pub ai_worker_camera_threshold: i64,
    pub poll_interval_secs: u64,
    /// Number dialled after an "I have not seen this" report.
    pub emergency_contact: Option<String>,
    pub assign_dismiss_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            ai_worker_camera_threshold: 1000,
            poll_interval_secs: 15,
            emergency_contact: None,
            assign_dismiss_ms: 1500,
        }
    }
}

impl AppConfig {
    /// Override first, then the environment, then the built-in default.
    pub fn resolve_base_url(&self, env_value: Option<String>) -> String {
        self.api_base_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .or_else(|| env_value.filter(|u| !u.trim().is_empty()))
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string()
    }
}
