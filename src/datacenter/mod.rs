use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::PgConnection;
use serde::{Deserialize, Serialize};

use crate::auth::middleware::AuthUser;
use crate::auth::scope::AccessScope;
use crate::idgen::{self, Namespace};
use crate::shared::error::{is_unique_violation, ApiError};
use crate::shared::models::{DataCenterLog, User, UserSummary};
use crate::shared::schema::{data_center_logs, users};
use crate::shared::state::AppState;
use crate::shared::utils::with_conn;

#[derive(Debug, Serialize)]
pub struct DataCenterLogView {
    #[serde(flatten)]
    pub log: DataCenterLog,
    pub creator: Option<UserSummary>,
}

fn to_view(conn: &mut PgConnection, log: DataCenterLog) -> QueryResult<DataCenterLogView> {
    let creator: Option<User> = users::table.find(log.created_by).first(conn).optional()?;
    Ok(DataCenterLogView {
        log,
        creator: creator.as_ref().map(UserSummary::from),
    })
}

#[derive(Debug, Deserialize)]
pub struct CreateLogRequest {
    pub id: Option<String>,
    pub visitor_name: Option<String>,
    pub visitor_company: Option<String>,
    pub contact_number: Option<String>,
    pub entry_time: Option<DateTime<Utc>>,
    pub purpose: Option<String>,
    pub equipment_brought: Option<String>,
    pub authorized_by: Option<String>,
    pub company_id: Option<String>,
    pub branch_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLogRequest {
    pub visitor_name: Option<String>,
    pub visitor_company: Option<String>,
    pub contact_number: Option<String>,
    pub entry_time: Option<DateTime<Utc>>,
    pub exit_time: Option<DateTime<Utc>>,
    pub purpose: Option<String>,
    pub equipment_brought: Option<String>,
    pub authorized_by: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecordExitRequest {
    pub exit_time: Option<DateTime<Utc>>,
}

pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<DataCenterLogView>>, ApiError> {
    let scope = AccessScope::from(&auth);
    let views = with_conn(&state.conn, move |conn| {
        let mut q = data_center_logs::table.into_boxed();
        if let Some(company) = scope.company_filter() {
            q = q.filter(data_center_logs::company_id.eq(company.to_string()));
        }
        let rows: Vec<DataCenterLog> = q.order(data_center_logs::entry_time.desc()).load(conn)?;
        rows.into_iter()
            .map(|log| Ok(to_view(conn, log)?))
            .collect::<Result<Vec<_>, ApiError>>()
    })
    .await?;
    Ok(Json(views))
}

pub async fn create_log(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateLogRequest>,
) -> Result<(StatusCode, Json<DataCenterLogView>), ApiError> {
    let mut missing = Vec::new();
    for (value, field) in [
        (&req.visitor_name, "visitor_name"),
        (&req.contact_number, "contact_number"),
        (&req.purpose, "purpose"),
        (&req.authorized_by, "authorized_by"),
    ] {
        if value.as_deref().unwrap_or("").is_empty() {
            missing.push(field);
        }
    }
    if req.entry_time.is_none() {
        missing.push("entry_time");
    }
    if !missing.is_empty() {
        return Err(ApiError::missing_fields(&missing));
    }

    let actor_id = auth.id;
    let company_id = req.company_id.clone().unwrap_or(auth.company_id.clone());
    let branch_id = req.branch_id.clone().unwrap_or(auth.branch_id.clone());

    let view = with_conn(&state.conn, move |conn| {
        let ns = Namespace::plain("DC");
        let explicit_id = req.id.clone().filter(|id| !id.is_empty());
        let mut attempt = 0;
        let log = loop {
            let id = match &explicit_id {
                Some(id) => id.clone(),
                None => idgen::next_id(conn, &ns, |conn| {
                    let ids: Vec<String> = data_center_logs::table
                        .select(data_center_logs::id)
                        .filter(data_center_logs::id.like(ns.like_pattern()))
                        .load(conn)?;
                    Ok(ns.seed_from(ids.iter().map(String::as_str)))
                })?,
            };
            let now = Utc::now();
            let log = DataCenterLog {
                id,
                visitor_name: req.visitor_name.clone().unwrap_or_default(),
                visitor_company: req.visitor_company.clone(),
                contact_number: req.contact_number.clone().unwrap_or_default(),
                entry_time: req.entry_time.unwrap_or(now),
                exit_time: None,
                purpose: req.purpose.clone().unwrap_or_default(),
                equipment_brought: req.equipment_brought.clone(),
                authorized_by: req.authorized_by.clone().unwrap_or_default(),
                company_id: company_id.clone(),
                branch_id: branch_id.clone(),
                created_by: actor_id,
                notes: req.notes.clone(),
                created_at: now,
                updated_at: now,
            };
            match diesel::insert_into(data_center_logs::table)
                .values(&log)
                .execute(conn)
            {
                Ok(_) => break log,
                Err(e) if is_unique_violation(&e) && explicit_id.is_none() => {
                    attempt += 1;
                    if attempt >= idgen::INSERT_ATTEMPTS {
                        return Err(ApiError::Database(format!(
                            "could not allocate a log id after {} attempts",
                            idgen::INSERT_ATTEMPTS
                        )));
                    }
                }
                Err(e) if is_unique_violation(&e) => {
                    return Err(ApiError::invalid("id", "This log id already exists"));
                }
                Err(e) => return Err(e.into()),
            }
        };
        Ok(to_view(conn, log)?)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_log(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DataCenterLogView>, ApiError> {
    let view = with_conn(&state.conn, move |conn| {
        let log: DataCenterLog = data_center_logs::table
            .find(&id)
            .first(conn)
            .optional()?
            .ok_or_else(|| ApiError::not_found("Data center log"))?;
        Ok(to_view(conn, log)?)
    })
    .await?;
    Ok(Json(view))
}

pub async fn update_log(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateLogRequest>,
) -> Result<Json<DataCenterLogView>, ApiError> {
    let view = with_conn(&state.conn, move |conn| {
        data_center_logs::table
            .find(&id)
            .select(data_center_logs::id)
            .first::<String>(conn)
            .optional()?
            .ok_or_else(|| ApiError::not_found("Data center log"))?;

        conn.transaction(|conn| {
            if let Some(visitor_name) = &req.visitor_name {
                diesel::update(data_center_logs::table.find(&id))
                    .set(data_center_logs::visitor_name.eq(visitor_name))
                    .execute(conn)?;
            }
            if let Some(visitor_company) = &req.visitor_company {
                diesel::update(data_center_logs::table.find(&id))
                    .set(data_center_logs::visitor_company.eq(visitor_company))
                    .execute(conn)?;
            }
            if let Some(contact_number) = &req.contact_number {
                diesel::update(data_center_logs::table.find(&id))
                    .set(data_center_logs::contact_number.eq(contact_number))
                    .execute(conn)?;
            }
            if let Some(entry_time) = req.entry_time {
                diesel::update(data_center_logs::table.find(&id))
                    .set(data_center_logs::entry_time.eq(entry_time))
                    .execute(conn)?;
            }
            if let Some(exit_time) = req.exit_time {
                diesel::update(data_center_logs::table.find(&id))
                    .set(data_center_logs::exit_time.eq(Some(exit_time)))
                    .execute(conn)?;
            }
            if let Some(purpose) = &req.purpose {
                diesel::update(data_center_logs::table.find(&id))
                    .set(data_center_logs::purpose.eq(purpose))
                    .execute(conn)?;
            }
            if let Some(equipment_brought) = &req.equipment_brought {
                diesel::update(data_center_logs::table.find(&id))
                    .set(data_center_logs::equipment_brought.eq(equipment_brought))
                    .execute(conn)?;
            }
            if let Some(authorized_by) = &req.authorized_by {
                diesel::update(data_center_logs::table.find(&id))
                    .set(data_center_logs::authorized_by.eq(authorized_by))
                    .execute(conn)?;
            }
            if let Some(notes) = &req.notes {
                diesel::update(data_center_logs::table.find(&id))
                    .set(data_center_logs::notes.eq(notes))
                    .execute(conn)?;
            }
            diesel::update(data_center_logs::table.find(&id))
                .set(data_center_logs::updated_at.eq(Utc::now()))
                .execute(conn)?;
            Ok::<_, diesel::result::Error>(())
        })?;

        let log: DataCenterLog = data_center_logs::table.find(&id).first(conn)?;
        Ok(to_view(conn, log)?)
    })
    .await?;
    Ok(Json(view))
}

/// Check a visitor out. Unlike ticket closure, a client-supplied exit time
/// is honored here; the server clock is only the default.
pub async fn record_exit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<RecordExitRequest>,
) -> Result<Json<DataCenterLogView>, ApiError> {
    let view = with_conn(&state.conn, move |conn| {
        data_center_logs::table
            .find(&id)
            .select(data_center_logs::id)
            .first::<String>(conn)
            .optional()?
            .ok_or_else(|| ApiError::not_found("Data center log"))?;

        let exit_time = req.exit_time.unwrap_or_else(Utc::now);
        diesel::update(data_center_logs::table.find(&id))
            .set((
                data_center_logs::exit_time.eq(Some(exit_time)),
                data_center_logs::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?;
        let log: DataCenterLog = data_center_logs::table.find(&id).first(conn)?;
        Ok(to_view(conn, log)?)
    })
    .await?;
    Ok(Json(view))
}

pub async fn delete_log(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_conn(&state.conn, move |conn| {
        let deleted = diesel::delete(data_center_logs::table.find(&id)).execute(conn)?;
        if deleted == 0 {
            return Err(ApiError::not_found("Data center log"));
        }
        Ok(())
    })
    .await?;
    Ok(Json(serde_json::json!({ "message": "Log deleted" })))
}

pub fn configure_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/datacenter/logs", get(list_logs).post(create_log))
        .route("/datacenter/logs/:id/exit", put(record_exit))
        .route(
            "/datacenter/logs/:id",
            get(get_log).put(update_log).delete(delete_log),
        )
}
