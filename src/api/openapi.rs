//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{equipment, events, health, rentals};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Rentflow API",
        version = "1.0.0",
        description = "Equipment rental lifecycle REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Rentals
        rentals::create_rental,
        rentals::get_rental,
        rentals::transition_rental,
        rentals::sync_equipment,
        rentals::record_payment,
        rentals::list_statuses,
        // Equipment
        equipment::get_equipment,
        equipment::create_equipment,
        equipment::update_availability,
        equipment::reconcile_equipment,
        // Events
        events::stream_events,
    ),
    components(
        schemas(
            // Rentals
            crate::models::rental::Rental,
            crate::models::rental::CreateRental,
            crate::models::rental::PaymentOutcome,
            crate::models::enums::RentalStatus,
            crate::models::enums::PaymentStatus,
            rentals::TransitionRequest,
            rentals::PaymentRequest,
            rentals::StatusInfo,
            crate::services::lifecycle::TransitionResult,
            crate::services::lifecycle::PendingEquipmentUpdate,
            // Equipment
            crate::models::equipment::Equipment,
            crate::models::equipment::CreateEquipment,
            crate::models::equipment::UpdateAvailability,
            crate::models::enums::Availability,
            crate::models::enums::OwnerAvailability,
            crate::services::availability::AvailabilityPlan,
            crate::services::availability::SkipReason,
            // Events
            crate::models::event::LifecycleEvent,
            crate::models::actor::ActorKind,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rentals", description = "Rental lifecycle"),
        (name = "equipment", description = "Equipment availability"),
        (name = "events", description = "Realtime lifecycle feed")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
