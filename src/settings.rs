use serde_json::Value;

use crate::db::DbPool;
use crate::types::config::AppConfig;

/// Raw JSON stored under the `main` key, `{}` when nothing is saved yet.
pub fn config_get_db(pool: &DbPool) -> Result<String, String> {
    let conn = pool.get().map_err(|e| e.to_string())?;
    let result: Option<String> = match conn.query_row(
        "SELECT value FROM config WHERE key = 'main'",
        [],
        |row| row.get(0),
    ) {
        Ok(json) => Some(json),
        Err(rusqlite::Error::QueryReturnedNoRows) => None,
        Err(e) => return Err(e.to_string()),
    };
    Ok(result.unwrap_or_else(|| "{}".to_string()))
}

pub fn config_set_db(pool: &DbPool, json: &str) -> Result<(), String> {
    let conn = pool.get().map_err(|e| e.to_string())?;
    conn.execute(
        "INSERT INTO config (key, value) VALUES ('main', ?1)
         ON CONFLICT(key) DO UPDATE SET value = ?1, updated_at = datetime('now')",
        [json],
    )
    .map_err(|e| e.to_string())?;
    Ok(())
}

/// Deep-merge `patch_json` into the stored config.
///
/// The merged document must still describe a valid [`AppConfig`], otherwise
/// nothing is written.
pub fn config_update_db(pool: &DbPool, patch_json: &str) -> Result<AppConfig, String> {
    let current = config_get_db(pool)?;
    let mut current_val: Value = serde_json::from_str(&current).map_err(|e| e.to_string())?;
    let patch_val: Value = serde_json::from_str(patch_json).map_err(|e| e.to_string())?;
    if !patch_val.is_object() {
        return Err("config patch must be a JSON object".to_string());
    }

    merge_json(&mut current_val, &patch_val);
    let config: AppConfig =
        serde_json::from_value(current_val).map_err(|e| format!("Invalid config: {}", e))?;
    validate(&config)?;

    let normalized = serde_json::to_string(&config).map_err(|e| e.to_string())?;
    config_set_db(pool, &normalized)?;
    Ok(config)
}

pub fn load_config(pool: &DbPool) -> Result<AppConfig, String> {
    let json = config_get_db(pool)?;
    serde_json::from_str(&json).map_err(|e| format!("Stored config is unreadable: {}", e))
}

fn validate(config: &AppConfig) -> Result<(), String> {
    if config.poll_interval_secs == 0 {
        return Err("pollIntervalSecs must be at least 1".to_string());
    }
    if let Some(url) = config.api_base_url.as_deref().filter(|u| !u.trim().is_empty()) {
        reqwest::Url::parse(url).map_err(|e| format!("Invalid apiBaseUrl '{}': {}", url, e))?;
    }
    Ok(())
}

fn merge_json(base: &mut Value, patch: &Value) {
    if let (Value::Object(base_map), Value::Object(patch_map)) = (base, patch) {
        for (key, value) in patch_map {
            match base_map.get_mut(key) {
                Some(existing) if existing.is_object() && value.is_object() => {
                    merge_json(existing, value)
                }
                _ => {
                    base_map.insert(key.clone(), value.clone());
                }
            }
        }
    }
}
