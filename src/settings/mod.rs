//! Process-wide key/value settings. The one the rest of the system cares
//! about is `emailNotifications`, read before every notification dispatch.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use diesel::prelude::*;
use diesel::PgConnection;
use serde::Deserialize;

use crate::shared::error::ApiError;
use crate::shared::schema::system_settings;
use crate::shared::state::AppState;
use crate::shared::utils::with_conn;

pub const EMAIL_NOTIFICATIONS_KEY: &str = "emailNotifications";

/// Settings store truthiness: "1" and "true" enable; a missing setting
/// defaults to enabled.
pub fn is_enabled(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => v == "1" || v == "true",
    }
}

pub fn get_setting(conn: &mut PgConnection, key: &str) -> QueryResult<Option<String>> {
    system_settings::table
        .find(key)
        .select(system_settings::value)
        .first(conn)
        .optional()
}

pub fn email_notifications_enabled(conn: &mut PgConnection) -> bool {
    match get_setting(conn, EMAIL_NOTIFICATIONS_KEY) {
        Ok(value) => is_enabled(value.as_deref()),
        Err(e) => {
            log::warn!("failed to read {EMAIL_NOTIFICATIONS_KEY}: {e}");
            true
        }
    }
}

pub async fn list_settings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BTreeMap<String, String>>, ApiError> {
    let settings = with_conn(&state.conn, |conn| {
        let rows: Vec<(String, String)> = system_settings::table
            .select((system_settings::key, system_settings::value))
            .load(conn)?;
        Ok(rows.into_iter().collect())
    })
    .await?;
    Ok(Json(settings))
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub settings: Option<BTreeMap<String, serde_json::Value>>,
}

pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateSettingsRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Some(settings) = req.settings else {
        return Err(ApiError::missing_fields(&["settings"]));
    };

    with_conn(&state.conn, move |conn| {
        for (key, value) in settings {
            let value = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            diesel::insert_into(system_settings::table)
                .values((
                    system_settings::key.eq(&key),
                    system_settings::value.eq(&value),
                    system_settings::updated_at.eq(Utc::now()),
                ))
                .on_conflict(system_settings::key)
                .do_update()
                .set((
                    system_settings::value.eq(&value),
                    system_settings::updated_at.eq(Utc::now()),
                ))
                .execute(conn)?;
        }
        Ok(())
    })
    .await?;

    Ok(Json(serde_json::json!({
        "message": "Settings updated successfully"
    })))
}

pub fn configure_routes() -> Router<Arc<AppState>> {
    Router::new().route("/system-settings", get(list_settings).post(update_settings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_setting_defaults_to_enabled() {
        assert!(is_enabled(None));
    }

    #[test]
    fn string_truthiness() {
        assert!(is_enabled(Some("1")));
        assert!(is_enabled(Some("true")));
        assert!(!is_enabled(Some("0")));
        assert!(!is_enabled(Some("false")));
        assert!(!is_enabled(Some("TRUE")));
        assert!(!is_enabled(Some("")));
    }
}
