use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::auth::{self, AppState};
use crate::middleware::{require_admin, require_auth};
use crate::{account, campaigns, contact, donations};

/// Every API route. Cross-cutting layers (CORS, tracing) are added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/signup", post(auth::signup))
        .route("/api/login", post(auth::login))
        .route("/api/logout", get(auth::logout))
        .route("/api/forgot", post(account::forgot_password))
        // Target of the link in the reset mail.
        .route("/reset/{token}", get(account::check_reset_token))
        .route(
            "/api/reset/{token}",
            get(account::check_reset_token).post(account::reset_password),
        )
        .route("/api/contact", post(contact::contact));

    let protected_routes = Router::new()
        .route("/api/account", get(account::get_account))
        .route("/api/account/profile", post(account::update_profile))
        .route("/api/account/password", post(account::change_password))
        .route("/api/account/delete", post(account::delete_account))
        .route("/api/donate", post(donations::donate))
        .route("/api/donations", get(donations::list_donations))
        .route(
            "/api/campaigns",
            get(campaigns::list_campaigns).merge(
                post(campaigns::create_campaign).route_layer(middleware::from_fn(require_admin)),
            ),
        )
        .route(
            "/api/campaigns/{campaign_id}",
            get(campaigns::get_campaign).merge(
                post(campaigns::update_campaign).route_layer(middleware::from_fn(require_admin)),
            ),
        )
        .route(
            "/api/campaigns/{campaign_id}/register",
            post(campaigns::register_for_campaign),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
