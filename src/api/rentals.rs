//! Rental endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        enums::RentalStatus,
        rental::{CreateRental, PaymentOutcome, Rental},
    },
    services::{availability::AvailabilityPlan, lifecycle::TransitionResult},
    AppState,
};

use super::RequestActor;

/// Transition request
#[derive(Deserialize, ToSchema)]
pub struct TransitionRequest {
    /// Requested status; legacy `approved`/`rejected` are accepted
    pub target_status: RentalStatus,
    /// Overrides the `X-Actor-Id` header when present
    pub actor_id: Option<Uuid>,
}

/// Payment gateway notification
#[derive(Deserialize, ToSchema)]
pub struct PaymentRequest {
    pub outcome: PaymentOutcome,
}

/// One row of the status table
#[derive(Serialize, ToSchema)]
pub struct StatusInfo {
    pub status: RentalStatus,
    pub label: String,
    pub allowed_targets: Vec<RentalStatus>,
    pub occupies_equipment: bool,
    pub terminal: bool,
}

/// HTTP status for each transition outcome
pub fn transition_status_code(result: &TransitionResult) -> StatusCode {
    match result {
        TransitionResult::Success { .. } | TransitionResult::NoOp { .. } => StatusCode::OK,
        TransitionResult::PartialFailure { .. } => StatusCode::ACCEPTED,
        TransitionResult::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        TransitionResult::NotFound { .. } => StatusCode::NOT_FOUND,
        TransitionResult::Conflict { .. } => StatusCode::CONFLICT,
    }
}

/// Request a rental
#[utoipa::path(
    post,
    path = "/rentals",
    tag = "rentals",
    request_body = CreateRental,
    responses(
        (status = 201, description = "Rental created as pending", body = Rental),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 404, description = "Equipment not found", body = crate::error::ErrorResponse),
        (status = 422, description = "Equipment cannot be booked", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_rental(
    State(state): State<AppState>,
    Json(request): Json<CreateRental>,
) -> AppResult<(StatusCode, Json<Rental>)> {
    let rental = state.services.rentals.create(request).await?;
    Ok((StatusCode::CREATED, Json(rental)))
}

/// Get rental by ID
#[utoipa::path(
    get,
    path = "/rentals/{id}",
    tag = "rentals",
    params(("id" = Uuid, Path, description = "Rental ID")),
    responses(
        (status = 200, description = "Rental details", body = Rental),
        (status = 404, description = "Rental not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_rental(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Rental>> {
    let rental = state.services.rentals.get_by_id(id).await?;
    Ok(Json(rental))
}

/// Move a rental to another status
#[utoipa::path(
    post,
    path = "/rentals/{id}/transition",
    tag = "rentals",
    params(
        ("id" = Uuid, Path, description = "Rental ID"),
        ("X-Actor-Id" = Option<Uuid>, Header, description = "Requesting user"),
        ("X-Actor-Kind" = Option<String>, Header, description = "admin, owner, renter or system")
    ),
    request_body = TransitionRequest,
    responses(
        (status = 200, description = "Transition applied, or already in that status", body = TransitionResult),
        (status = 202, description = "Status committed, equipment availability pending", body = TransitionResult),
        (status = 404, description = "Rental not found", body = TransitionResult),
        (status = 409, description = "Rental changed concurrently", body = TransitionResult),
        (status = 422, description = "Transition not allowed", body = TransitionResult)
    )
)]
pub async fn transition_rental(
    State(state): State<AppState>,
    RequestActor(mut actor): RequestActor,
    Path(id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> AppResult<(StatusCode, Json<TransitionResult>)> {
    if request.actor_id.is_some() {
        actor.id = request.actor_id;
    }

    let result = state
        .services
        .lifecycle
        .request_transition(id, request.target_status, &actor)
        .await?;

    Ok((transition_status_code(&result), Json(result)))
}

/// Replay the equipment availability step for a rental
#[utoipa::path(
    post,
    path = "/rentals/{id}/equipment-sync",
    tag = "rentals",
    params(("id" = Uuid, Path, description = "Rental ID")),
    responses(
        (status = 200, description = "Equipment in line with the rental", body = AvailabilityPlan),
        (status = 404, description = "Rental not found", body = crate::error::ErrorResponse),
        (status = 503, description = "Store still failing", body = crate::error::ErrorResponse)
    )
)]
pub async fn sync_equipment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<AvailabilityPlan>> {
    let plan = state.services.lifecycle.resync_equipment(id).await?;
    Ok(Json(plan))
}

/// Record a payment gateway outcome
#[utoipa::path(
    post,
    path = "/rentals/{id}/payment",
    tag = "rentals",
    params(("id" = Uuid, Path, description = "Rental ID")),
    request_body = PaymentRequest,
    responses(
        (status = 200, description = "Payment recorded", body = Rental),
        (status = 404, description = "Rental not found", body = crate::error::ErrorResponse),
        (status = 422, description = "Rental is cancelled", body = crate::error::ErrorResponse)
    )
)]
pub async fn record_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<PaymentRequest>,
) -> AppResult<Json<Rental>> {
    let rental = state.services.rentals.record_payment(id, request.outcome).await?;
    Ok(Json(rental))
}

/// Rental statuses with their labels and allowed transitions
#[utoipa::path(
    get,
    path = "/rentals/statuses",
    tag = "rentals",
    responses(
        (status = 200, description = "Status table", body = Vec<StatusInfo>)
    )
)]
pub async fn list_statuses() -> Json<Vec<StatusInfo>> {
    let table = RentalStatus::ALL
        .iter()
        .map(|&status| StatusInfo {
            status,
            label: status.label().to_string(),
            allowed_targets: status.allowed_targets().to_vec(),
            occupies_equipment: status.is_occupying(),
            terminal: status.is_terminal(),
        })
        .collect();
    Json(table)
}
