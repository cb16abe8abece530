//! Equipment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::enums::{Availability, OwnerAvailability};
use crate::error::AppError;

/// Equipment record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Equipment {
    pub id: Uuid,
    pub owner_id: Uuid,
    /// Equipment name / description
    pub name: String,
    pub availability: Availability,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub struct EquipmentRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub availability: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<EquipmentRow> for Equipment {
    type Error = AppError;

    fn try_from(row: EquipmentRow) -> Result<Self, Self::Error> {
        Ok(Equipment {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            availability: row.availability.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Create equipment request. New equipment always starts `available`.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateEquipment {
    pub owner_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
}

/// Owner availability change request
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateAvailability {
    pub status: OwnerAvailability,
}
