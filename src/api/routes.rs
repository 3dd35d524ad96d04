use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::{self, Next},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::analytics::{AnalyticsReporter, Clock, EventRecorder};
use crate::auth::{auth_middleware, AuthService};
use crate::config::Config;
use crate::storage::Storage;

use super::handlers::{get_agent_analytics, health_check, track_interaction, AppState};

pub fn create_api_router(
    storage: Arc<dyn Storage>,
    auth_service: Arc<AuthService>,
    config: Arc<Config>,
    clock: Arc<dyn Clock>,
) -> Router {
    let reporter = AnalyticsReporter::new(
        Arc::clone(&storage),
        Arc::clone(&clock),
        &config.analytics,
    );
    let recorder = EventRecorder::new(storage, reporter, clock, &config.analytics);
    let state = Arc::new(AppState {
        recorder,
        client_ip: config.client_ip.clone(),
    });

    // Tracking is called from public profile pages
    let public_routes = Router::new().route("/agents/{id}/track", post(track_interaction));

    let protected_routes = Router::new()
        .route("/agents/{id}/analytics", get(get_agent_analytics))
        .route_layer(middleware::from_fn(
            move |headers: HeaderMap, req: Request, next: Next| {
                let auth = Arc::clone(&auth_service);
                auth_middleware(auth, headers, req, next)
            },
        ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", public_routes.merge(protected_routes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
