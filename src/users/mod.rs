use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::DatabaseErrorInformation;
use diesel::PgConnection;
use serde::{Deserialize, Serialize};

use crate::auth::middleware::AuthUser;
use crate::auth::password::hash_password;
use crate::auth::scope::AccessScope;
use crate::shared::error::{is_unique_violation, ApiError};
use crate::shared::models::{Branch, Company, NewUser, User};
use crate::shared::schema::{branches, companies, users};
use crate::shared::state::AppState;
use crate::shared::utils::with_conn;

#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub email: String,
    pub role: String,
    #[serde(rename = "companyId")]
    pub company_id: String,
    #[serde(rename = "branchId")]
    pub branch_id: String,
    pub company: Option<Company>,
    pub branch: Option<Branch>,
}

fn to_view(conn: &mut PgConnection, user: User) -> QueryResult<UserView> {
    let company = companies::table
        .find(&user.company_id)
        .first(conn)
        .optional()?;
    let branch = branches::table
        .find(&user.branch_id)
        .first(conn)
        .optional()?;
    Ok(UserView {
        id: user.id,
        username: user.username,
        name: user.name,
        email: user.email,
        role: user.role,
        company_id: user.company_id,
        branch_id: user.branch_id,
        company,
        branch,
    })
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub company_id: Option<String>,
    pub branch_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub company_id: Option<String>,
    pub branch_id: Option<String>,
}

/// Map a duplicate-key failure to the offending column.
fn duplicate_user_error(err: diesel::result::Error) -> ApiError {
    if let diesel::result::Error::DatabaseError(
        diesel::result::DatabaseErrorKind::UniqueViolation,
        info,
    ) = &err
    {
        if info.constraint_name() == Some("users_email_key") {
            return ApiError::invalid("email", "This email is already in use");
        }
        return ApiError::invalid("username", "This username is already taken");
    }
    err.into()
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<UserView>>, ApiError> {
    let scope = AccessScope::from(&auth);
    let views = with_conn(&state.conn, move |conn| {
        let mut q = users::table.into_boxed();
        if let Some(company) = scope.company_filter() {
            q = q.filter(users::company_id.eq(company.to_string()));
        }
        if let Some(branch) = scope.branch_filter() {
            q = q.filter(users::branch_id.eq(branch.to_string()));
        }
        let rows: Vec<User> = q.order(users::id.asc()).load(conn)?;
        rows.into_iter()
            .map(|u| Ok(to_view(conn, u)?))
            .collect::<Result<Vec<_>, ApiError>>()
    })
    .await?;
    Ok(Json(views))
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserView>), ApiError> {
    let mut missing = Vec::new();
    for (value, field) in [
        (&req.username, "username"),
        (&req.name, "name"),
        (&req.email, "email"),
        (&req.password, "password"),
        (&req.role, "role"),
        (&req.company_id, "company_id"),
        (&req.branch_id, "branch_id"),
    ] {
        if value.as_deref().unwrap_or("").is_empty() {
            missing.push(field);
        }
    }
    if !missing.is_empty() {
        return Err(ApiError::missing_fields(&missing));
    }
    let password = req.password.clone().unwrap_or_default();
    if password.len() < 4 {
        return Err(ApiError::invalid(
            "password",
            "The password must be at least 4 characters",
        ));
    }

    let hashed = hash_password(&password)?;
    let view = with_conn(&state.conn, move |conn| {
        let now = Utc::now();
        let new_user = NewUser {
            name: req.name.clone().unwrap_or_default(),
            username: req.username.clone().unwrap_or_default(),
            email: req.email.clone().unwrap_or_default(),
            password: hashed,
            role: req.role.clone().unwrap_or_default(),
            company_id: req.company_id.clone().unwrap_or_default(),
            branch_id: req.branch_id.clone().unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        let user: User = diesel::insert_into(users::table)
            .values(&new_user)
            .get_result(conn)
            .map_err(duplicate_user_error)?;
        Ok(to_view(conn, user)?)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<UserView>, ApiError> {
    let view = with_conn(&state.conn, move |conn| {
        let user: User = users::table
            .find(id)
            .first(conn)
            .optional()?
            .ok_or_else(|| ApiError::not_found("User"))?;
        Ok(to_view(conn, user)?)
    })
    .await?;
    Ok(Json(view))
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UserView>, ApiError> {
    let hashed = match req.password.as_deref() {
        Some(p) if !p.is_empty() => Some(hash_password(p)?),
        _ => None,
    };

    let view = with_conn(&state.conn, move |conn| {
        users::table
            .find(id)
            .select(users::id)
            .first::<i64>(conn)
            .optional()?
            .ok_or_else(|| ApiError::not_found("User"))?;

        let updated = conn.transaction(|conn| {
            if let Some(username) = &req.username {
                diesel::update(users::table.find(id))
                    .set(users::username.eq(username))
                    .execute(conn)?;
            }
            if let Some(name) = &req.name {
                diesel::update(users::table.find(id))
                    .set(users::name.eq(name))
                    .execute(conn)?;
            }
            if let Some(email) = &req.email {
                diesel::update(users::table.find(id))
                    .set(users::email.eq(email))
                    .execute(conn)?;
            }
            if let Some(role) = &req.role {
                diesel::update(users::table.find(id))
                    .set(users::role.eq(role))
                    .execute(conn)?;
            }
            if let Some(company_id) = &req.company_id {
                diesel::update(users::table.find(id))
                    .set(users::company_id.eq(company_id))
                    .execute(conn)?;
            }
            if let Some(branch_id) = &req.branch_id {
                diesel::update(users::table.find(id))
                    .set(users::branch_id.eq(branch_id))
                    .execute(conn)?;
            }
            if let Some(hashed) = &hashed {
                diesel::update(users::table.find(id))
                    .set(users::password.eq(hashed))
                    .execute(conn)?;
            }
            diesel::update(users::table.find(id))
                .set(users::updated_at.eq(Utc::now()))
                .execute(conn)?;
            users::table.find(id).first::<User>(conn)
        });

        let updated = match updated {
            Ok(user) => user,
            Err(e) if is_unique_violation(&e) => return Err(duplicate_user_error(e)),
            Err(e) => return Err(e.into()),
        };
        Ok(to_view(conn, updated)?)
    })
    .await?;
    Ok(Json(view))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_conn(&state.conn, move |conn| {
        let deleted = diesel::delete(users::table.find(id)).execute(conn)?;
        if deleted == 0 {
            return Err(ApiError::not_found("User"));
        }
        Ok(())
    })
    .await?;
    Ok(Json(serde_json::json!({ "message": "User deleted" })))
}

pub fn configure_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}
