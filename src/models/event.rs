//! Rental lifecycle event emitted after every committed transition

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::enums::RentalStatus;
use super::rental::Rental;

/// Lifecycle event payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LifecycleEvent {
    pub rental_id: Uuid,
    pub equipment_id: Uuid,
    pub previous_status: RentalStatus,
    pub new_status: RentalStatus,
    /// Who requested the transition, when known
    pub actor_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}

impl LifecycleEvent {
    /// Build the event for `rental`, which already holds its new status
    pub fn for_transition(rental: &Rental, previous_status: RentalStatus, actor_id: Option<Uuid>) -> Self {
        Self {
            rental_id: rental.id,
            equipment_id: rental.equipment_id,
            previous_status,
            new_status: rental.status,
            actor_id,
            timestamp: rental.updated_at,
        }
    }
}
