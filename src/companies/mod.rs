use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use diesel::PgConnection;
use log::info;
use serde::{Deserialize, Serialize};

use crate::auth::middleware::AuthUser;
use crate::auth::scope::AccessScope;
use crate::idgen::{self, Namespace};
use crate::shared::error::{is_unique_violation, unique_violation_to_validation, ApiError};
use crate::shared::models::{Branch, Company};
use crate::shared::schema::{branches, companies};
use crate::shared::state::AppState;
use crate::shared::utils::with_conn;

#[derive(Debug, Serialize)]
pub struct CompanyWithBranches {
    #[serde(flatten)]
    pub company: Company,
    pub branches: Vec<Branch>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCompanyRequest {
    pub id: Option<String>,
    pub name: Option<String>,
    pub logo: Option<String>,
    pub line_token: Option<String>,
    pub telegram_token: Option<String>,
    pub notification_email: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCompanyRequest {
    pub name: Option<String>,
    pub logo: Option<String>,
    pub line_token: Option<String>,
    pub telegram_token: Option<String>,
    pub notification_email: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBranchRequest {
    pub name: Option<String>,
    pub ticket_prefix: Option<String>,
    pub technician_email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBranchRequest {
    pub name: Option<String>,
    pub ticket_prefix: Option<String>,
    pub technician_email: Option<String>,
}

fn with_branches(
    conn: &mut PgConnection,
    rows: Vec<Company>,
) -> QueryResult<Vec<CompanyWithBranches>> {
    rows.into_iter()
        .map(|company| {
            let branch_rows: Vec<Branch> = branches::table
                .filter(branches::company_id.eq(&company.id))
                .order(branches::id.asc())
                .load(conn)?;
            Ok(CompanyWithBranches {
                company,
                branches: branch_rows,
            })
        })
        .collect()
}

pub async fn list_companies(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<CompanyWithBranches>>, ApiError> {
    let scope = AccessScope::from(&auth);
    let companies_out = with_conn(&state.conn, move |conn| {
        let mut q = companies::table.into_boxed();
        if let Some(company) = scope.company_filter() {
            q = q.filter(companies::id.eq(company.to_string()));
        }
        let rows: Vec<Company> = q.order(companies::id.asc()).load(conn)?;
        Ok(with_branches(conn, rows)?)
    })
    .await?;
    Ok(Json(companies_out))
}

pub async fn get_company(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CompanyWithBranches>, ApiError> {
    let company = with_conn(&state.conn, move |conn| {
        let row: Company = companies::table
            .find(&id)
            .first(conn)
            .optional()?
            .ok_or_else(|| ApiError::not_found("Company"))?;
        Ok(with_branches(conn, vec![row])?.remove(0))
    })
    .await?;
    Ok(Json(company))
}

fn seed_namespace<F>(ids: F, ns: &Namespace) -> i64
where
    F: IntoIterator<Item = String>,
{
    let ids: Vec<String> = ids.into_iter().collect();
    ns.seed_from(ids.iter().map(String::as_str))
}

pub async fn create_company(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCompanyRequest>,
) -> Result<(StatusCode, Json<Company>), ApiError> {
    let Some(name) = req.name.clone().filter(|n| !n.is_empty()) else {
        return Err(ApiError::missing_fields(&["name"]));
    };

    let company = with_conn(&state.conn, move |conn| {
        let ns = Namespace::plain("C");
        let explicit_id = req.id.clone().filter(|id| !id.is_empty());
        let mut attempt = 0;
        loop {
            let id = match &explicit_id {
                Some(id) => id.clone(),
                None => idgen::next_id(conn, &ns, |conn| {
                    let ids: Vec<String> = companies::table
                        .select(companies::id)
                        .filter(companies::id.like(ns.like_pattern()))
                        .load(conn)?;
                    Ok(seed_namespace(ids, &ns))
                })?,
            };
            let now = Utc::now();
            let company = Company {
                id,
                name: name.clone(),
                logo: req.logo.clone(),
                line_token: req.line_token.clone(),
                telegram_token: req.telegram_token.clone(),
                notification_email: req.notification_email.clone(),
                expiry_date: req.expiry_date,
                created_at: now,
                updated_at: now,
            };
            match diesel::insert_into(companies::table)
                .values(&company)
                .execute(conn)
            {
                Ok(_) => return Ok(company),
                Err(e) if is_unique_violation(&e) && explicit_id.is_none() => {
                    attempt += 1;
                    if attempt >= idgen::INSERT_ATTEMPTS {
                        return Err(ApiError::Database(format!(
                            "could not allocate a company id after {} attempts",
                            idgen::INSERT_ATTEMPTS
                        )));
                    }
                }
                Err(e) => {
                    return Err(unique_violation_to_validation(
                        e,
                        "id",
                        "This company id already exists",
                    ))
                }
            }
        }
    })
    .await?;

    info!("company {} created", company.id);
    Ok((StatusCode::CREATED, Json(company)))
}

pub async fn update_company(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateCompanyRequest>,
) -> Result<Json<Company>, ApiError> {
    let company = with_conn(&state.conn, move |conn| {
        let existing: Company = companies::table
            .find(&id)
            .first(conn)
            .optional()?
            .ok_or_else(|| ApiError::not_found("Company"))?;

        let updated = Company {
            id: existing.id,
            name: req.name.unwrap_or(existing.name),
            logo: req.logo.or(existing.logo),
            line_token: req.line_token.or(existing.line_token),
            telegram_token: req.telegram_token.or(existing.telegram_token),
            notification_email: req.notification_email.or(existing.notification_email),
            expiry_date: req.expiry_date.or(existing.expiry_date),
            created_at: existing.created_at,
            updated_at: Utc::now(),
        };
        diesel::update(companies::table.find(&updated.id))
            .set(&updated)
            .execute(conn)?;
        Ok(updated)
    })
    .await?;
    Ok(Json(company))
}

pub async fn delete_company(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_conn(&state.conn, move |conn| {
        let deleted = diesel::delete(companies::table.find(&id)).execute(conn)?;
        if deleted == 0 {
            return Err(ApiError::not_found("Company"));
        }
        Ok(())
    })
    .await?;
    Ok(Json(serde_json::json!({ "message": "Company deleted" })))
}

pub async fn create_branch(
    State(state): State<Arc<AppState>>,
    Path(company_id): Path<String>,
    Json(req): Json<CreateBranchRequest>,
) -> Result<(StatusCode, Json<Branch>), ApiError> {
    let Some(name) = req.name.clone().filter(|n| !n.is_empty()) else {
        return Err(ApiError::missing_fields(&["name"]));
    };

    let branch = with_conn(&state.conn, move |conn| {
        companies::table
            .find(&company_id)
            .select(companies::id)
            .first::<String>(conn)
            .optional()?
            .ok_or_else(|| ApiError::not_found("Company"))?;

        let ns = Namespace::plain("B");
        let mut attempt = 0;
        loop {
            let id = idgen::next_id(conn, &ns, |conn| {
                let ids: Vec<String> = branches::table
                    .select(branches::id)
                    .filter(branches::id.like(ns.like_pattern()))
                    .load(conn)?;
                Ok(seed_namespace(ids, &ns))
            })?;
            let now = Utc::now();
            let branch = Branch {
                id,
                name: name.clone(),
                company_id: company_id.clone(),
                ticket_prefix: req.ticket_prefix.clone(),
                technician_email: req.technician_email.clone(),
                created_at: now,
                updated_at: now,
            };
            match diesel::insert_into(branches::table)
                .values(&branch)
                .execute(conn)
            {
                Ok(_) => return Ok(branch),
                Err(e) if is_unique_violation(&e) => {
                    attempt += 1;
                    if attempt >= idgen::INSERT_ATTEMPTS {
                        return Err(ApiError::Database(format!(
                            "could not allocate a branch id after {} attempts",
                            idgen::INSERT_ATTEMPTS
                        )));
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    })
    .await?;

    Ok((StatusCode::CREATED, Json(branch)))
}

pub async fn update_branch(
    State(state): State<Arc<AppState>>,
    Path((company_id, branch_id)): Path<(String, String)>,
    Json(req): Json<UpdateBranchRequest>,
) -> Result<Json<Branch>, ApiError> {
    let branch = with_conn(&state.conn, move |conn| {
        let existing: Branch = branches::table
            .find(&branch_id)
            .filter(branches::company_id.eq(&company_id))
            .first(conn)
            .optional()?
            .ok_or_else(|| ApiError::not_found("Branch"))?;

        let updated = Branch {
            id: existing.id,
            name: req.name.unwrap_or(existing.name),
            company_id: existing.company_id,
            ticket_prefix: req.ticket_prefix.or(existing.ticket_prefix),
            technician_email: req.technician_email.or(existing.technician_email),
            created_at: existing.created_at,
            updated_at: Utc::now(),
        };
        diesel::update(branches::table.find(&updated.id))
            .set(&updated)
            .execute(conn)?;
        Ok(updated)
    })
    .await?;
    Ok(Json(branch))
}

pub async fn delete_branch(
    State(state): State<Arc<AppState>>,
    Path((company_id, branch_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_conn(&state.conn, move |conn| {
        let deleted = diesel::delete(
            branches::table
                .find(&branch_id)
                .filter(branches::company_id.eq(&company_id)),
        )
        .execute(conn)?;
        if deleted == 0 {
            return Err(ApiError::not_found("Branch"));
        }
        Ok(())
    })
    .await?;
    Ok(Json(serde_json::json!({ "message": "Branch deleted" })))
}

pub fn configure_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/companies", get(list_companies).post(create_company))
        .route(
            "/companies/:id",
            get(get_company).put(update_company).delete(delete_company),
        )
        .route("/companies/:company_id/branches", post(create_branch))
        .route(
            "/companies/:company_id/branches/:branch_id",
            put(update_branch).delete(delete_branch),
        )
}
