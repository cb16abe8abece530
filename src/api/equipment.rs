//! Equipment API endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::equipment::{CreateEquipment, Equipment, UpdateAvailability},
    services::availability::AvailabilityPlan,
    AppState,
};

use super::RequestActor;

/// Get equipment by ID
#[utoipa::path(
    get,
    path = "/equipment/{id}",
    tag = "equipment",
    params(("id" = Uuid, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "Equipment details", body = Equipment),
        (status = 404, description = "Equipment not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_equipment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Equipment>> {
    let equipment = state.services.equipment.get_by_id(id).await?;
    Ok(Json(equipment))
}

/// Register equipment
#[utoipa::path(
    post,
    path = "/equipment",
    tag = "equipment",
    request_body = CreateEquipment,
    responses(
        (status = 201, description = "Equipment created", body = Equipment),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_equipment(
    State(state): State<AppState>,
    Json(data): Json<CreateEquipment>,
) -> AppResult<(StatusCode, Json<Equipment>)> {
    let equipment = state.services.equipment.create(data).await?;
    Ok((StatusCode::CREATED, Json(equipment)))
}

/// Owner availability change
#[utoipa::path(
    put,
    path = "/equipment/{id}/availability",
    tag = "equipment",
    params(
        ("id" = Uuid, Path, description = "Equipment ID"),
        ("X-Actor-Id" = Option<Uuid>, Header, description = "Requesting user")
    ),
    request_body = UpdateAvailability,
    responses(
        (status = 200, description = "Availability updated", body = Equipment),
        (status = 404, description = "Equipment not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Availability changed concurrently", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_availability(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(id): Path<Uuid>,
    Json(data): Json<UpdateAvailability>,
) -> AppResult<Json<Equipment>> {
    let equipment = state
        .services
        .lifecycle
        .set_owner_availability(id, data.status, &actor)
        .await?;
    Ok(Json(equipment))
}

/// Recompute availability from the equipment's rentals
#[utoipa::path(
    post,
    path = "/equipment/{id}/reconcile",
    tag = "equipment",
    params(("id" = Uuid, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "Reconciliation result", body = AvailabilityPlan),
        (status = 404, description = "Equipment not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn reconcile_equipment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<AvailabilityPlan>> {
    let plan = state.services.lifecycle.reconcile_equipment(id).await?;
    Ok(Json(plan))
}
