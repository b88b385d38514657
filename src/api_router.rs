//! Route assembly. Public routes (login, tracking, asset search) bypass the
//! bearer middleware; everything else sits behind it.

use std::sync::Arc;

use axum::{middleware, Router};

use crate::auth;
use crate::shared::state::AppState;

pub fn configure_api_routes(state: Arc<AppState>) -> Router {
    let public = Router::new()
        .merge(auth::configure_public_routes())
        .merge(crate::tickets::configure_public_routes())
        .merge(crate::assets::configure_public_routes());

    let protected = Router::new()
        .merge(auth::configure_routes())
        .merge(crate::companies::configure_routes())
        .merge(crate::users::configure_routes())
        .merge(crate::assets::configure_routes())
        .merge(crate::tickets::configure_routes())
        .merge(crate::datacenter::configure_routes())
        .merge(crate::settings::configure_routes())
        .merge(crate::audit::configure_routes())
        .merge(crate::reports::configure_routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .with_state(state)
}
