//! System activity log: who did what, recorded at login and other
//! security-relevant actions, readable by super admins only.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Extension, Json, Router,
};
use chrono::Utc;
use diesel::prelude::*;
use diesel::PgConnection;
use serde::Deserialize;

use crate::auth::middleware::AuthUser;
use crate::auth::scope::roles;
use crate::shared::error::ApiError;
use crate::shared::models::{NewSystemLog, SystemLog, User};
use crate::shared::schema::system_logs;
use crate::shared::state::AppState;
use crate::shared::utils::with_conn;

#[allow(clippy::too_many_arguments)]
pub fn record(
    conn: &mut PgConnection,
    user: &User,
    company_name: &str,
    action: &str,
    module: &str,
    description: &str,
    ip_address: Option<String>,
    user_agent: Option<String>,
) -> Result<(), ApiError> {
    let entry = NewSystemLog {
        user_id: user.id,
        user_name: user.name.clone(),
        company_id: user.company_id.clone(),
        company_name: company_name.to_string(),
        action: action.to_string(),
        module: module.to_string(),
        description: description.to_string(),
        ip_address,
        user_agent,
        created_at: Utc::now(),
    };
    diesel::insert_into(system_logs::table)
        .values(&entry)
        .execute(conn)?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct SystemLogQuery {
    pub module: Option<String>,
    pub action: Option<String>,
    pub company_id: Option<String>,
}

pub async fn list_system_logs(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<SystemLogQuery>,
) -> Result<Json<Vec<SystemLog>>, ApiError> {
    if auth.role != roles::SUPER_ADMIN {
        return Err(ApiError::Forbidden("Access denied".to_string()));
    }

    let logs = with_conn(&state.conn, move |conn| {
        let mut q = system_logs::table.into_boxed();
        if let Some(module) = query.module {
            q = q.filter(system_logs::module.eq(module));
        }
        if let Some(action) = query.action {
            q = q.filter(system_logs::action.eq(action));
        }
        if let Some(company_id) = query.company_id {
            q = q.filter(system_logs::company_id.eq(company_id));
        }
        Ok(q.order(system_logs::created_at.desc()).load(conn)?)
    })
    .await?;

    Ok(Json(logs))
}

pub fn configure_routes() -> Router<Arc<AppState>> {
    Router::new().route("/system-logs", get(list_system_logs))
}
