//! HTTP API: axum router, session auth and JSON handlers.

pub mod auth;
pub mod handlers;

use crate::components::{ComposioClient, GoogleOAuth, SessionStore};
use crate::service::DashboardService;
use auth::{require_auth, AuthService};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use handlers::{
    calendar_details_handler, calendars_handler, chat_handler, composio_link_handler,
    dashboard_handler, delete_connection_handler, get_connection_handler, google_auth_handler,
    google_callback_handler, health_handler, login_handler, logout_handler, meetings_handler,
    put_connection_handler, signup_handler,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    /// Meeting pipeline orchestration
    pub service: DashboardService,
    /// Users, connections and OAuth material
    pub store: Arc<dyn SessionStore>,
    /// Auth service for JWT operations
    pub auth: Arc<AuthService>,
    /// Present when the direct Google integration is configured
    pub google_oauth: Option<GoogleOAuth>,
    /// Present when the integration broker is configured
    pub composio: Option<Arc<ComposioClient>>,
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/auth/google", get(google_auth_handler))
        .route("/api/composio/link", post(composio_link_handler))
        .route(
            "/api/connection",
            get(get_connection_handler)
                .put(put_connection_handler)
                .delete(delete_connection_handler),
        )
        .route("/api/calendars", get(calendars_handler))
        .route("/api/calendars/details", post(calendar_details_handler))
        .route("/api/meetings", get(meetings_handler))
        .route("/api/chat", get(chat_handler))
        .route("/api/dashboard", get(dashboard_handler))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/auth/signup", post(signup_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/logout", post(logout_handler))
        .route("/api/auth/google/callback", get(google_callback_handler))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
