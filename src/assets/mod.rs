use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use diesel::result::DatabaseErrorInformation;
use diesel::PgConnection;
use serde::{Deserialize, Serialize};

use crate::auth::middleware::AuthUser;
use crate::auth::scope::AccessScope;
use crate::idgen::{self, Namespace};
use crate::shared::error::{is_unique_violation, unique_violation_to_validation, ApiError};
use crate::shared::models::{Asset, Branch, Company, Ticket, User, UserSummary};
use crate::shared::schema::{assets, branches, companies, tickets, users};
use crate::shared::state::AppState;
use crate::shared::utils::with_conn;

#[derive(Debug, Serialize)]
pub struct AssetView {
    #[serde(flatten)]
    pub asset: Asset,
    pub company: Option<Company>,
    pub branch: Option<Branch>,
    #[serde(rename = "responsibleUser")]
    pub responsible_user: Option<UserSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tickets: Option<Vec<Ticket>>,
}

fn to_view(conn: &mut PgConnection, asset: Asset, with_tickets: bool) -> QueryResult<AssetView> {
    let company = companies::table
        .find(&asset.company_id)
        .first(conn)
        .optional()?;
    let branch = branches::table
        .find(&asset.branch_id)
        .first(conn)
        .optional()?;
    let responsible: Option<User> = users::table
        .find(asset.responsible)
        .first(conn)
        .optional()?;
    let ticket_rows = if with_tickets {
        Some(
            tickets::table
                .filter(tickets::asset_id.eq(&asset.id))
                .order(tickets::created_at.desc())
                .load(conn)?,
        )
    } else {
        None
    };
    Ok(AssetView {
        asset,
        company,
        branch,
        responsible_user: responsible.as_ref().map(UserSummary::from),
        tickets: ticket_rows,
    })
}

#[derive(Debug, Deserialize)]
pub struct AssetListQuery {
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub branch_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAssetRequest {
    pub id: Option<String>,
    pub asset_code: Option<String>,
    pub serial_number: Option<String>,
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub location: Option<String>,
    pub company_id: Option<String>,
    pub branch_id: Option<String>,
    pub responsible: Option<i64>,
    pub department: Option<String>,
    pub ip_address: Option<String>,
    pub diagram_file: Option<String>,
    pub images: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAssetRequest {
    pub asset_code: Option<String>,
    pub serial_number: Option<String>,
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub location: Option<String>,
    pub company_id: Option<String>,
    pub branch_id: Option<String>,
    pub responsible: Option<i64>,
    pub department: Option<String>,
    pub ip_address: Option<String>,
    pub diagram_file: Option<String>,
}

pub async fn list_assets(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<AssetListQuery>,
) -> Result<Json<Vec<AssetView>>, ApiError> {
    let scope = AccessScope::from(&auth);
    let views = with_conn(&state.conn, move |conn| {
        let mut q = assets::table.into_boxed();
        if let Some(company) = scope.company_filter() {
            q = q.filter(assets::company_id.eq(company.to_string()));
        }
        if let Some(type_) = query.type_ {
            q = q.filter(assets::type_.eq(type_));
        }
        if let Some(branch_id) = query.branch_id {
            q = q.filter(assets::branch_id.eq(branch_id));
        }
        let rows: Vec<Asset> = q.order(assets::created_at.desc()).load(conn)?;
        rows.into_iter()
            .map(|a| Ok(to_view(conn, a, false)?))
            .collect::<Result<Vec<_>, ApiError>>()
    })
    .await?;
    Ok(Json(views))
}

/// Public lookup by serial number or asset code.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Path(serial_number): Path<String>,
) -> Result<Json<AssetView>, ApiError> {
    let view = with_conn(&state.conn, move |conn| {
        let asset: Asset = assets::table
            .filter(
                assets::serial_number
                    .eq(&serial_number)
                    .or(assets::asset_code.eq(&serial_number)),
            )
            .first(conn)
            .optional()?
            .ok_or_else(|| ApiError::not_found("Asset"))?;
        Ok(to_view(conn, asset, false)?)
    })
    .await?;
    Ok(Json(view))
}

pub async fn create_asset(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateAssetRequest>,
) -> Result<(StatusCode, Json<AssetView>), ApiError> {
    let mut missing = Vec::new();
    for (value, field) in [
        (&req.asset_code, "asset_code"),
        (&req.serial_number, "serial_number"),
        (&req.type_, "type"),
        (&req.brand, "brand"),
        (&req.model, "model"),
        (&req.location, "location"),
        (&req.company_id, "company_id"),
        (&req.branch_id, "branch_id"),
    ] {
        if value.as_deref().unwrap_or("").is_empty() {
            missing.push(field);
        }
    }
    if req.start_date.is_none() {
        missing.push("start_date");
    }
    if req.responsible.is_none() {
        missing.push("responsible");
    }
    if !missing.is_empty() {
        return Err(ApiError::missing_fields(&missing));
    }

    let view = with_conn(&state.conn, move |conn| {
        let ns = Namespace::plain("A");
        let explicit_id = req.id.clone().filter(|id| !id.is_empty());
        let mut attempt = 0;
        let asset = loop {
            let id = match &explicit_id {
                Some(id) => id.clone(),
                None => idgen::next_id(conn, &ns, |conn| {
                    let ids: Vec<String> = assets::table
                        .select(assets::id)
                        .filter(assets::id.like(ns.like_pattern()))
                        .load(conn)?;
                    Ok(ns.seed_from(ids.iter().map(String::as_str)))
                })?,
            };
            let now = Utc::now();
            let asset = Asset {
                id,
                asset_code: req.asset_code.clone().unwrap_or_default(),
                serial_number: req.serial_number.clone().unwrap_or_default(),
                type_: req.type_.clone().unwrap_or_default(),
                brand: req.brand.clone().unwrap_or_default(),
                model: req.model.clone().unwrap_or_default(),
                start_date: req.start_date.unwrap_or_else(|| now.date_naive()),
                location: req.location.clone().unwrap_or_default(),
                company_id: req.company_id.clone().unwrap_or_default(),
                branch_id: req.branch_id.clone().unwrap_or_default(),
                responsible: req.responsible.unwrap_or_default(),
                department: req.department.clone(),
                ip_address: req.ip_address.clone(),
                diagram_file: req.diagram_file.clone(),
                images: req.images.clone(),
                created_at: now,
                updated_at: now,
            };
            match diesel::insert_into(assets::table)
                .values(&asset)
                .execute(conn)
            {
                Ok(_) => break asset,
                Err(e) if is_unique_violation(&e) => {
                    // The asset_code unique constraint also lands here; a
                    // duplicate code must not be retried away.
                    if let diesel::result::Error::DatabaseError(_, info) = &e {
                        if info.constraint_name() == Some("assets_asset_code_key") {
                            return Err(ApiError::invalid(
                                "asset_code",
                                "This asset code already exists",
                            ));
                        }
                    }
                    if explicit_id.is_some() {
                        return Err(ApiError::invalid("id", "This asset id already exists"));
                    }
                    attempt += 1;
                    if attempt >= idgen::INSERT_ATTEMPTS {
                        return Err(ApiError::Database(format!(
                            "could not allocate an asset id after {} attempts",
                            idgen::INSERT_ATTEMPTS
                        )));
                    }
                }
                Err(e) => return Err(e.into()),
            }
        };
        Ok(to_view(conn, asset, false)?)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_asset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AssetView>, ApiError> {
    let view = with_conn(&state.conn, move |conn| {
        let asset: Asset = assets::table
            .find(&id)
            .first(conn)
            .optional()?
            .ok_or_else(|| ApiError::not_found("Asset"))?;
        Ok(to_view(conn, asset, true)?)
    })
    .await?;
    Ok(Json(view))
}

pub async fn update_asset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateAssetRequest>,
) -> Result<Json<AssetView>, ApiError> {
    let view = with_conn(&state.conn, move |conn| {
        assets::table
            .find(&id)
            .select(assets::id)
            .first::<String>(conn)
            .optional()?
            .ok_or_else(|| ApiError::not_found("Asset"))?;

        let result = conn.transaction(|conn| {
            if let Some(asset_code) = &req.asset_code {
                diesel::update(assets::table.find(&id))
                    .set(assets::asset_code.eq(asset_code))
                    .execute(conn)?;
            }
            if let Some(serial_number) = &req.serial_number {
                diesel::update(assets::table.find(&id))
                    .set(assets::serial_number.eq(serial_number))
                    .execute(conn)?;
            }
            if let Some(type_) = &req.type_ {
                diesel::update(assets::table.find(&id))
                    .set(assets::type_.eq(type_))
                    .execute(conn)?;
            }
            if let Some(brand) = &req.brand {
                diesel::update(assets::table.find(&id))
                    .set(assets::brand.eq(brand))
                    .execute(conn)?;
            }
            if let Some(model) = &req.model {
                diesel::update(assets::table.find(&id))
                    .set(assets::model.eq(model))
                    .execute(conn)?;
            }
            if let Some(start_date) = req.start_date {
                diesel::update(assets::table.find(&id))
                    .set(assets::start_date.eq(start_date))
                    .execute(conn)?;
            }
            if let Some(location) = &req.location {
                diesel::update(assets::table.find(&id))
                    .set(assets::location.eq(location))
                    .execute(conn)?;
            }
            if let Some(company_id) = &req.company_id {
                diesel::update(assets::table.find(&id))
                    .set(assets::company_id.eq(company_id))
                    .execute(conn)?;
            }
            if let Some(branch_id) = &req.branch_id {
                diesel::update(assets::table.find(&id))
                    .set(assets::branch_id.eq(branch_id))
                    .execute(conn)?;
            }
            if let Some(responsible) = req.responsible {
                diesel::update(assets::table.find(&id))
                    .set(assets::responsible.eq(responsible))
                    .execute(conn)?;
            }
            if let Some(department) = &req.department {
                diesel::update(assets::table.find(&id))
                    .set(assets::department.eq(department))
                    .execute(conn)?;
            }
            if let Some(ip_address) = &req.ip_address {
                diesel::update(assets::table.find(&id))
                    .set(assets::ip_address.eq(ip_address))
                    .execute(conn)?;
            }
            if let Some(diagram_file) = &req.diagram_file {
                diesel::update(assets::table.find(&id))
                    .set(assets::diagram_file.eq(diagram_file))
                    .execute(conn)?;
            }
            diesel::update(assets::table.find(&id))
                .set(assets::updated_at.eq(Utc::now()))
                .execute(conn)?;
            assets::table.find(&id).first::<Asset>(conn)
        });

        let asset = result.map_err(|e| {
            unique_violation_to_validation(e, "asset_code", "This asset code already exists")
        })?;
        Ok(to_view(conn, asset, false)?)
    })
    .await?;
    Ok(Json(view))
}

pub async fn delete_asset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_conn(&state.conn, move |conn| {
        let deleted = diesel::delete(assets::table.find(&id)).execute(conn)?;
        if deleted == 0 {
            return Err(ApiError::not_found("Asset"));
        }
        Ok(())
    })
    .await?;
    Ok(Json(serde_json::json!({ "message": "Asset deleted" })))
}

#[derive(Debug, Deserialize)]
pub struct UploadImagesRequest {
    pub images: Option<Vec<String>>,
}

/// Append base64-encoded images to the asset's image list.
pub async fn upload_images(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UploadImagesRequest>,
) -> Result<Json<AssetView>, ApiError> {
    let Some(new_images) = req.images.filter(|imgs| !imgs.is_empty()) else {
        return Err(ApiError::missing_fields(&["images"]));
    };

    let view = with_conn(&state.conn, move |conn| {
        let asset: Asset = assets::table
            .find(&id)
            .first(conn)
            .optional()?
            .ok_or_else(|| ApiError::not_found("Asset"))?;

        let mut images = match asset.images {
            Some(serde_json::Value::Array(items)) => items,
            _ => Vec::new(),
        };
        images.extend(new_images.into_iter().map(serde_json::Value::String));

        diesel::update(assets::table.find(&id))
            .set((
                assets::images.eq(serde_json::Value::Array(images)),
                assets::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?;
        let asset: Asset = assets::table.find(&id).first(conn)?;
        Ok(to_view(conn, asset, false)?)
    })
    .await?;
    Ok(Json(view))
}

/// Remove one image by position. An out-of-range index leaves the list
/// unchanged rather than failing.
pub async fn delete_image(
    State(state): State<Arc<AppState>>,
    Path((id, image_index)): Path<(String, usize)>,
) -> Result<Json<AssetView>, ApiError> {
    let view = with_conn(&state.conn, move |conn| {
        let asset: Asset = assets::table
            .find(&id)
            .first(conn)
            .optional()?
            .ok_or_else(|| ApiError::not_found("Asset"))?;

        if let Some(serde_json::Value::Array(mut images)) = asset.images.clone() {
            if image_index < images.len() {
                images.remove(image_index);
                diesel::update(assets::table.find(&id))
                    .set((
                        assets::images.eq(serde_json::Value::Array(images)),
                        assets::updated_at.eq(Utc::now()),
                    ))
                    .execute(conn)?;
            }
        }
        let asset: Asset = assets::table.find(&id).first(conn)?;
        Ok(to_view(conn, asset, false)?)
    })
    .await?;
    Ok(Json(view))
}

pub fn configure_public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/assets/search/:serial_number", get(search))
}

pub fn configure_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/assets", get(list_assets).post(create_asset))
        .route(
            "/assets/:id",
            get(get_asset).put(update_asset).delete(delete_asset),
        )
        .route("/assets/:id/images", post(upload_images))
        .route(
            "/assets/:id/images/:image_index",
            axum::routing::delete(delete_image),
        )
}
