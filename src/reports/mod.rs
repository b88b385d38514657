use std::sync::Arc;

use axum::{extract::State, routing::get, Extension, Json, Router};
use diesel::dsl::count_star;
use diesel::prelude::*;
use serde::Serialize;

use crate::auth::middleware::AuthUser;
use crate::auth::scope::AccessScope;
use crate::shared::error::ApiError;
use crate::shared::schema::{assets, tickets};
use crate::shared::state::AppState;
use crate::shared::utils::with_conn;
use crate::tickets::workflow::{
    STATUS_CLOSED, STATUS_IN_PROGRESS, STATUS_OPEN, STATUS_WAITING_PARTS,
};

#[derive(Debug, Serialize)]
pub struct DashboardReport {
    #[serde(rename = "totalTickets")]
    pub total_tickets: i64,
    #[serde(rename = "openTickets")]
    pub open_tickets: i64,
    #[serde(rename = "inProgressTickets")]
    pub in_progress_tickets: i64,
    #[serde(rename = "waitingPartsTickets")]
    pub waiting_parts_tickets: i64,
    #[serde(rename = "closedTickets")]
    pub closed_tickets: i64,
    #[serde(rename = "totalAssets")]
    pub total_assets: i64,
}

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<DashboardReport>, ApiError> {
    let scope = AccessScope::from(&auth);
    let report = with_conn(&state.conn, move |conn| {
        let company = scope.company_filter().map(str::to_string);

        let count_status = |conn: &mut diesel::PgConnection,
                            status: Option<&str>|
         -> QueryResult<i64> {
            match (&company, status) {
                (Some(company), Some(status)) => tickets::table
                    .filter(tickets::company_id.eq(company.clone()))
                    .filter(tickets::status.eq(status.to_string()))
                    .count()
                    .get_result(conn),
                (Some(company), None) => tickets::table
                    .filter(tickets::company_id.eq(company.clone()))
                    .count()
                    .get_result(conn),
                (None, Some(status)) => tickets::table
                    .filter(tickets::status.eq(status.to_string()))
                    .count()
                    .get_result(conn),
                (None, None) => tickets::table.count().get_result(conn),
            }
        };

        let total_tickets = count_status(conn, None)?;
        let open_tickets = count_status(conn, Some(STATUS_OPEN))?;
        let in_progress_tickets = count_status(conn, Some(STATUS_IN_PROGRESS))?;
        let waiting_parts_tickets = count_status(conn, Some(STATUS_WAITING_PARTS))?;
        let closed_tickets = count_status(conn, Some(STATUS_CLOSED))?;

        let total_assets: i64 = match &company {
            Some(company) => assets::table
                .filter(assets::company_id.eq(company.clone()))
                .count()
                .get_result(conn)?,
            None => assets::table.count().get_result(conn)?,
        };

        Ok(DashboardReport {
            total_tickets,
            open_tickets,
            in_progress_tickets,
            waiting_parts_tickets,
            closed_tickets,
            total_assets,
        })
    })
    .await?;
    Ok(Json(report))
}

pub async fn tickets_by_status(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    let scope = AccessScope::from(&auth);
    let rows = with_conn(&state.conn, move |conn| {
        let rows: Vec<(String, i64)> = match scope.company_filter() {
            Some(company) => tickets::table
                .filter(tickets::company_id.eq(company.to_string()))
                .group_by(tickets::status)
                .select((tickets::status, count_star()))
                .load(conn)?,
            None => tickets::table
                .group_by(tickets::status)
                .select((tickets::status, count_star()))
                .load(conn)?,
        };
        Ok(rows)
    })
    .await?;
    Ok(Json(
        rows.into_iter()
            .map(|(status, count)| serde_json::json!({ "status": status, "count": count }))
            .collect(),
    ))
}

pub async fn tickets_by_priority(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    let scope = AccessScope::from(&auth);
    let rows = with_conn(&state.conn, move |conn| {
        let rows: Vec<(String, i64)> = match scope.company_filter() {
            Some(company) => tickets::table
                .filter(tickets::company_id.eq(company.to_string()))
                .group_by(tickets::priority)
                .select((tickets::priority, count_star()))
                .load(conn)?,
            None => tickets::table
                .group_by(tickets::priority)
                .select((tickets::priority, count_star()))
                .load(conn)?,
        };
        Ok(rows)
    })
    .await?;
    Ok(Json(
        rows.into_iter()
            .map(|(priority, count)| serde_json::json!({ "priority": priority, "count": count }))
            .collect(),
    ))
}

pub async fn assets_by_type(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    let scope = AccessScope::from(&auth);
    let rows = with_conn(&state.conn, move |conn| {
        let rows: Vec<(String, i64)> = match scope.company_filter() {
            Some(company) => assets::table
                .filter(assets::company_id.eq(company.to_string()))
                .group_by(assets::type_)
                .select((assets::type_, count_star()))
                .load(conn)?,
            None => assets::table
                .group_by(assets::type_)
                .select((assets::type_, count_star()))
                .load(conn)?,
        };
        Ok(rows)
    })
    .await?;
    Ok(Json(
        rows.into_iter()
            .map(|(type_, count)| serde_json::json!({ "type": type_, "count": count }))
            .collect(),
    ))
}

pub fn configure_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reports/dashboard", get(dashboard))
        .route("/reports/tickets-by-status", get(tickets_by_status))
        .route("/reports/tickets-by-priority", get(tickets_by_priority))
        .route("/reports/assets-by-type", get(assets_by_type))
}
