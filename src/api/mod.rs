//! API handlers for Rentflow REST endpoints

pub mod equipment;
pub mod events;
pub mod health;
pub mod openapi;
pub mod rentals;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderName},
    routing::{get, post, put},
    Router,
};
use std::str::FromStr;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::actor::{Actor, ActorKind},
    AppState,
};

pub const ACTOR_ID_HEADER: HeaderName = HeaderName::from_static("x-actor-id");
pub const ACTOR_KIND_HEADER: HeaderName = HeaderName::from_static("x-actor-kind");

/// Caller identity taken from the `X-Actor-Id` / `X-Actor-Kind` headers.
///
/// Authentication happens upstream; without headers the caller is `system`.
pub struct RequestActor(pub Actor);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestActor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header_str(parts, &ACTOR_ID_HEADER)?
            .map(Uuid::from_str)
            .transpose()
            .map_err(|_| AppError::BadRequest("X-Actor-Id must be a UUID".to_string()))?;

        let kind = match header_str(parts, &ACTOR_KIND_HEADER)? {
            None => ActorKind::default(),
            Some(raw) => raw
                .parse()
                .map_err(|_| AppError::BadRequest(format!("Unknown actor kind: {}", raw)))?,
        };

        Ok(RequestActor(Actor { id, kind }))
    }
}

fn header_str<'a>(parts: &'a Parts, name: &HeaderName) -> Result<Option<&'a str>, AppError> {
    parts
        .headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| AppError::BadRequest(format!("Invalid {} header", name)))
        })
        .transpose()
}

/// Create the application router with all routes
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Rentals
        .route("/rentals", post(rentals::create_rental))
        .route("/rentals/statuses", get(rentals::list_statuses))
        .route("/rentals/:id", get(rentals::get_rental))
        .route("/rentals/:id/transition", post(rentals::transition_rental))
        .route("/rentals/:id/equipment-sync", post(rentals::sync_equipment))
        .route("/rentals/:id/payment", post(rentals::record_payment))
        // Equipment
        .route("/equipment", post(equipment::create_equipment))
        .route("/equipment/:id", get(equipment::get_equipment))
        .route("/equipment/:id/availability", put(equipment::update_availability))
        .route("/equipment/:id/reconcile", post(equipment::reconcile_equipment))
        // Realtime feed
        .route("/events/stream", get(events::stream_events))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}
