pub mod jwt;
pub mod middleware;
pub mod password;
pub mod scope;

use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};

use crate::audit;
use crate::auth::middleware::AuthUser;
use crate::shared::error::ApiError;
use crate::shared::models::{Company, User};
use crate::shared::schema::{companies, users};
use crate::shared::state::AppState;
use crate::shared::utils::with_conn;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserPayload {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub email: String,
    pub role: String,
    #[serde(rename = "companyId")]
    pub company_id: String,
    #[serde(rename = "branchId")]
    pub branch_id: String,
}

impl UserPayload {
    fn from_user(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
            company_id: user.company_id.clone(),
            branch_id: user.branch_id.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: UserPayload,
    pub token: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let (Some(username), Some(password)) = (req.username, req.password) else {
        return Err(ApiError::missing_fields(&["username", "password"]));
    };

    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').next().unwrap_or(v).trim().to_string());
    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let user = with_conn(&state.conn, move |conn| {
        let user: Option<User> = users::table
            .filter(users::username.eq(&username))
            .first(conn)
            .optional()?;

        let user = match user {
            Some(u) if password::verify_password(&password, &u.password) => u,
            _ => {
                return Err(ApiError::Unauthorized(
                    "Invalid username or password".to_string(),
                ))
            }
        };

        let company: Option<Company> = companies::table
            .find(&user.company_id)
            .first(conn)
            .optional()?;

        if let Some(company) = &company {
            if let Some(expiry) = company.expiry_date {
                if expiry < Utc::now().date_naive() {
                    return Err(ApiError::Forbidden(format!(
                        "The license for {} has expired. Contact your administrator to renew it.",
                        company.name
                    )));
                }
            }
        }

        let company_name = company.map(|c| c.name).unwrap_or_default();
        audit::record(
            conn,
            &user,
            &company_name,
            "LOGIN",
            "auth",
            "Logged in",
            ip_address,
            user_agent,
        )?;

        Ok(user)
    })
    .await?;

    info!("user {} logged in", user.username);
    let token = jwt::issue(
        &user,
        &state.config.auth.jwt_secret,
        state.config.auth.token_expiry_hours,
    )?;

    Ok(Json(LoginResponse {
        success: true,
        user: UserPayload::from_user(&user),
        token,
    }))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Json<serde_json::Value> {
    state.revoked_tokens.write().await.insert(auth.token);
    Json(serde_json::json!({ "success": true, "message": "Logged out" }))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let company_id = auth.company_id.clone();
    let company: Option<Company> = with_conn(&state.conn, move |conn| {
        Ok(companies::table.find(&company_id).first(conn).optional()?)
    })
    .await?;

    Ok(Json(serde_json::json!({
        "id": auth.id,
        "username": auth.username,
        "name": auth.name,
        "email": auth.email,
        "role": auth.role,
        "companyId": auth.company_id,
        "branchId": auth.branch_id,
        "company": company,
    })))
}

pub fn configure_public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth/login", post(login))
}

pub fn configure_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}
