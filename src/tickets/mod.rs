pub mod history;
pub mod workflow;

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use chrono::Utc;
use diesel::prelude::*;
use diesel::PgConnection;
use log::info;
use serde::{Deserialize, Serialize};

use crate::auth::middleware::AuthUser;
use crate::auth::scope::AccessScope;
use crate::idgen::{self, Namespace};
use crate::notify::TicketEvent;
use crate::shared::error::{is_unique_violation, ApiError};
use crate::shared::models::{Asset, Branch, Company, Ticket, TicketHistory, User, UserSummary};
use crate::shared::schema::{assets, branches, companies, ticket_histories, tickets, users};
use crate::shared::state::AppState;
use crate::shared::utils::with_conn;
use workflow::UpdateTicketRequest;

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub asset_id: Option<String>,
    pub company_id: Option<String>,
    pub branch_id: Option<String>,
    pub assigned_to: Option<i64>,
    pub attachments: Option<serde_json::Value>,
    pub phone_number: Option<String>,
    pub device_location: Option<String>,
    pub ip_address: Option<String>,
    pub images: Option<serde_json::Value>,
    pub custom_device_type: Option<String>,
    pub custom_device_serial_number: Option<String>,
    pub custom_device_asset_code: Option<String>,
    pub custom_device_brand: Option<String>,
    pub custom_device_model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub entry: TicketHistory,
    pub user: Option<UserSummary>,
}

#[derive(Debug, Serialize)]
pub struct TicketDetail {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub asset: Option<Asset>,
    pub creator: Option<UserSummary>,
    pub assignee: Option<UserSummary>,
    pub approver: Option<UserSummary>,
    pub closer: Option<UserSummary>,
    pub company: Option<Company>,
    pub branch: Option<Branch>,
    pub histories: Vec<HistoryEntry>,
}

/// Strip dashes so "T-028" can fall back to "T028".
pub fn normalize_ticket_id(id: &str) -> String {
    id.replace('-', "")
}

fn load_user(conn: &mut PgConnection, id: Option<i64>) -> QueryResult<Option<UserSummary>> {
    let Some(id) = id else { return Ok(None) };
    let user: Option<User> = users::table.find(id).first(conn).optional()?;
    Ok(user.as_ref().map(UserSummary::from))
}

fn load_histories(conn: &mut PgConnection, ticket_id: &str) -> QueryResult<Vec<HistoryEntry>> {
    let rows: Vec<(TicketHistory, Option<User>)> = ticket_histories::table
        .left_join(users::table)
        .filter(ticket_histories::ticket_id.eq(ticket_id))
        .order(ticket_histories::created_at.asc())
        .load(conn)?;
    Ok(rows
        .into_iter()
        .map(|(entry, user)| HistoryEntry {
            entry,
            user: user.as_ref().map(UserSummary::from),
        })
        .collect())
}

fn load_detail(conn: &mut PgConnection, ticket: Ticket) -> Result<TicketDetail, ApiError> {
    let asset = match &ticket.asset_id {
        Some(id) => assets::table.find(id).first(conn).optional()?,
        None => None,
    };
    let creator = load_user(conn, Some(ticket.created_by))?;
    let assignee = load_user(conn, ticket.assigned_to)?;
    let approver = load_user(conn, ticket.approved_by)?;
    let closer = load_user(conn, ticket.closed_by)?;
    let company = companies::table
        .find(&ticket.company_id)
        .first(conn)
        .optional()?;
    let branch = branches::table
        .find(&ticket.branch_id)
        .first(conn)
        .optional()?;
    let histories = load_histories(conn, &ticket.id)?;
    Ok(TicketDetail {
        ticket,
        asset,
        creator,
        assignee,
        approver,
        closer,
        company,
        branch,
        histories,
    })
}

pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Ticket>>, ApiError> {
    let scope = AccessScope::from(&auth);
    let tickets = with_conn(&state.conn, move |conn| {
        let mut q = tickets::table.into_boxed();
        if let Some(company) = scope.company_filter() {
            q = q.filter(tickets::company_id.eq(company.to_string()));
        }
        if let Some(branch) = scope.branch_filter() {
            q = q.filter(tickets::branch_id.eq(branch.to_string()));
        }
        if let Some(creator) = scope.creator_filter() {
            q = q.filter(tickets::created_by.eq(creator));
        }
        if let Some(status) = query.status {
            q = q.filter(tickets::status.eq(status));
        }
        if let Some(priority) = query.priority {
            q = q.filter(tickets::priority.eq(priority));
        }
        Ok(q.order(tickets::created_at.desc()).load(conn)?)
    })
    .await?;
    Ok(Json(tickets))
}

fn seed_ticket_namespace(conn: &mut PgConnection, ns: &Namespace) -> QueryResult<i64> {
    let ids: Vec<String> = tickets::table
        .select(tickets::id)
        .filter(tickets::id.like(ns.like_pattern()))
        .load(conn)?;
    Ok(ns.seed_from(ids.iter().map(String::as_str)))
}

pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateTicketRequest>,
) -> Result<(StatusCode, Json<TicketDetail>), ApiError> {
    let mut missing = Vec::new();
    if req.title.as_deref().unwrap_or("").is_empty() {
        missing.push("title");
    }
    if req.description.as_deref().unwrap_or("").is_empty() {
        missing.push("description");
    }
    if req.priority.as_deref().unwrap_or("").is_empty() {
        missing.push("priority");
    }
    if !missing.is_empty() {
        return Err(ApiError::missing_fields(&missing));
    }

    let actor_id = auth.id;
    let company_id = req.company_id.clone().unwrap_or(auth.company_id.clone());
    let branch_id = req.branch_id.clone().unwrap_or(auth.branch_id.clone());

    let (detail, event) = with_conn(&state.conn, move |conn| {
        let branch: Option<Branch> = branches::table.find(&branch_id).first(conn).optional()?;
        let ns = Namespace::ticket(branch.as_ref().and_then(|b| b.ticket_prefix.as_deref()));

        let explicit_id = req.id.clone().filter(|id| !id.is_empty());
        let mut attempt = 0;
        let ticket = loop {
            // Drawing the number and inserting the row are separate steps;
            // the id column's unique constraint arbitrates races.
            let id = match &explicit_id {
                Some(id) => id.clone(),
                None => idgen::next_id(conn, &ns, |conn| seed_ticket_namespace(conn, &ns))?,
            };
            let now = Utc::now();
            let ticket = Ticket {
                id,
                title: req.title.clone().unwrap_or_default(),
                description: req.description.clone().unwrap_or_default(),
                asset_id: req.asset_id.clone(),
                priority: req.priority.clone().unwrap_or_default(),
                status: workflow::STATUS_OPEN.to_string(),
                created_by: actor_id,
                assigned_to: req.assigned_to,
                approved_by: None,
                closed_by: None,
                company_id: company_id.clone(),
                branch_id: branch_id.clone(),
                attachments: req.attachments.clone(),
                resolution: None,
                phone_number: req.phone_number.clone(),
                device_location: req.device_location.clone(),
                ip_address: req.ip_address.clone(),
                repair_cost: None,
                replaced_part_name: None,
                replaced_part_serial_number: None,
                replaced_part_brand: None,
                replaced_part_model: None,
                images: req.images.clone(),
                custom_device_type: req.custom_device_type.clone(),
                custom_device_serial_number: req.custom_device_serial_number.clone(),
                custom_device_asset_code: req.custom_device_asset_code.clone(),
                custom_device_brand: req.custom_device_brand.clone(),
                custom_device_model: req.custom_device_model.clone(),
                closed_at: None,
                created_at: now,
                updated_at: now,
            };

            let inserted = conn.transaction(|conn| {
                diesel::insert_into(tickets::table)
                    .values(&ticket)
                    .execute(conn)?;
                history::record(
                    conn,
                    &ticket.id,
                    history::ACTION_CREATED,
                    &format!("Ticket created: {}", ticket.title),
                    actor_id,
                )
            });

            match inserted {
                Ok(()) => break ticket,
                Err(e) if is_unique_violation(&e) && explicit_id.is_none() => {
                    attempt += 1;
                    if attempt >= idgen::INSERT_ATTEMPTS {
                        return Err(ApiError::Database(format!(
                            "could not allocate a ticket id after {} attempts",
                            idgen::INSERT_ATTEMPTS
                        )));
                    }
                }
                Err(e) if is_unique_violation(&e) => {
                    return Err(ApiError::invalid("id", "This ticket id already exists"));
                }
                Err(e) => return Err(e.into()),
            }
        };

        let event = TicketEvent::Created {
            ticket: ticket.clone(),
        };
        let detail = load_detail(conn, ticket)?;
        Ok((detail, event))
    })
    .await?;

    info!("ticket {} created", detail.ticket.id);
    state.notifier.emit(event);
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TicketDetail>, ApiError> {
    let detail = with_conn(&state.conn, move |conn| {
        let ticket: Ticket = tickets::table
            .find(&id)
            .first(conn)
            .optional()?
            .ok_or_else(|| ApiError::not_found("Ticket"))?;
        load_detail(conn, ticket)
    })
    .await?;
    Ok(Json(detail))
}

pub async fn update_ticket(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(req): Json<UpdateTicketRequest>,
) -> Result<Json<TicketDetail>, ApiError> {
    let actor_id = auth.id;
    let (detail, events) = with_conn(&state.conn, move |conn| {
        let (ticket, events) = workflow::apply_update(conn, &id, actor_id, req)?;
        let detail = load_detail(conn, ticket)?;
        Ok((detail, events))
    })
    .await?;

    for event in events {
        state.notifier.emit(event);
    }
    Ok(Json(detail))
}

pub async fn delete_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_conn(&state.conn, move |conn| {
        let deleted = diesel::delete(tickets::table.find(&id)).execute(conn)?;
        if deleted == 0 {
            return Err(ApiError::not_found("Ticket"));
        }
        Ok(())
    })
    .await?;
    Ok(Json(serde_json::json!({ "message": "Ticket deleted" })))
}

#[derive(Debug, Serialize)]
pub struct TrackedTicket {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub asset: Option<Asset>,
    pub histories: Vec<HistoryEntry>,
}

fn load_tracked(conn: &mut PgConnection, rows: Vec<Ticket>) -> Result<Vec<TrackedTicket>, ApiError> {
    rows.into_iter()
        .map(|ticket| {
            let asset = match &ticket.asset_id {
                Some(id) => assets::table.find(id).first(conn).optional()?,
                None => None,
            };
            let histories = load_histories(conn, &ticket.id)?;
            Ok(TrackedTicket {
                ticket,
                asset,
                histories,
            })
        })
        .collect()
}

/// Public tracking by device serial: matches the linked asset's serial
/// number or the free-form custom device serial.
pub async fn tracking(
    State(state): State<Arc<AppState>>,
    Path(serial_number): Path<String>,
) -> Result<Json<Vec<TrackedTicket>>, ApiError> {
    let tracked = with_conn(&state.conn, move |conn| {
        let rows: Vec<Ticket> = tickets::table
            .left_join(assets::table)
            .filter(
                assets::serial_number
                    .eq(&serial_number)
                    .or(tickets::custom_device_serial_number.eq(&serial_number)),
            )
            .order(tickets::created_at.desc())
            .select(tickets::all_columns)
            .load(conn)?;
        load_tracked(conn, rows)
    })
    .await?;
    Ok(Json(tracked))
}

/// Public tracking by ticket id: exact match, then dash-stripped, then
/// substring. Always returns an array; no match is an empty one, not a 404.
pub async fn track_by_id(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<String>,
) -> Result<Json<Vec<TrackedTicket>>, ApiError> {
    let tracked = with_conn(&state.conn, move |conn| {
        let mut ticket: Option<Ticket> =
            tickets::table.find(&ticket_id).first(conn).optional()?;

        if ticket.is_none() {
            let normalized = normalize_ticket_id(&ticket_id);
            ticket = tickets::table.find(&normalized).first(conn).optional()?;
        }

        if ticket.is_none() {
            ticket = tickets::table
                .filter(tickets::id.like(format!("%{ticket_id}%")))
                .first(conn)
                .optional()?;
        }

        match ticket {
            Some(ticket) => load_tracked(conn, vec![ticket]),
            None => Ok(Vec::new()),
        }
    })
    .await?;
    Ok(Json(tracked))
}

pub fn configure_public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tickets/tracking/:serial_number", get(tracking))
        .route("/tickets/track/:ticket_id", get(track_by_id))
}

pub fn configure_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tickets", get(list_tickets).post(create_ticket))
        .route(
            "/tickets/:id",
            get(get_ticket).put(update_ticket).delete(delete_ticket),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_id_normalization_strips_dashes() {
        assert_eq!(normalize_ticket_id("T-028"), "T028");
        assert_eq!(normalize_ticket_id("HQ-001"), "HQ001");
        assert_eq!(normalize_ticket_id("T028"), "T028");
    }
}
