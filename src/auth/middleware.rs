use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::Response,
};
use diesel::prelude::*;

use crate::auth::jwt;
use crate::shared::error::ApiError;
use crate::shared::models::User;
use crate::shared::schema::users;
use crate::shared::state::AppState;
use crate::shared::utils::with_conn;

/// Authenticated caller, attached as a request extension by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub company_id: String,
    pub branch_id: String,
    /// The raw bearer token, kept so logout can revoke it.
    pub token: String,
}

impl AuthUser {
    fn from_user(user: User, token: String) -> Self {
        Self {
            id: user.id,
            name: user.name,
            username: user.username,
            email: user.email,
            role: user.role,
            company_id: user.company_id,
            branch_id: user.branch_id,
            token,
        }
    }
}

/// Bearer-token gate for all non-public routes. Decodes the token, rejects
/// revoked ones, and reloads the user so role/company changes take effect
/// immediately rather than at token expiry.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?
        .to_string();

    if state.revoked_tokens.read().await.contains(&token) {
        return Err(ApiError::Unauthorized("Token has been revoked".to_string()));
    }

    let claims = jwt::verify(&token, &state.config.auth.jwt_secret)?;
    let user_id: i64 = claims
        .sub
        .parse()
        .map_err(|_| ApiError::Unauthorized("Malformed token subject".to_string()))?;

    let user: User = with_conn(&state.conn, move |conn| {
        users::table
            .find(user_id)
            .first(conn)
            .optional()?
            .ok_or_else(|| ApiError::Unauthorized("Unknown user".to_string()))
    })
    .await?;

    req.extensions_mut()
        .insert(AuthUser::from_user(user, token));
    Ok(next.run(req).await)
}
