//! Rental model and related types

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::enums::{PaymentStatus, RentalStatus};
use crate::error::AppError;

/// Rental record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Rental {
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub renter_id: Uuid,
    pub owner_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: RentalStatus,
    pub payment_status: PaymentStatus,
    #[schema(value_type = String)]
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw database row; statuses are stored as text
#[derive(Debug, FromRow)]
pub struct RentalRow {
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub renter_id: Uuid,
    pub owner_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: String,
    pub payment_status: String,
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<RentalRow> for Rental {
    type Error = AppError;

    fn try_from(row: RentalRow) -> Result<Self, Self::Error> {
        Ok(Rental {
            id: row.id,
            equipment_id: row.equipment_id,
            renter_id: row.renter_id,
            owner_id: row.owner_id,
            start_date: row.start_date,
            end_date: row.end_date,
            status: row.status.parse()?,
            payment_status: row.payment_status.parse()?,
            total_price: row.total_price,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Create rental request (checkout flow)
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_rental_period"))]
pub struct CreateRental {
    pub equipment_id: Uuid,
    pub renter_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[schema(value_type = String)]
    pub total_price: Decimal,
    /// Defaults to `unpaid`
    pub payment_status: Option<PaymentStatus>,
}

/// Decimal places kept by the `total_price` column
const PRICE_SCALE: u32 = 2;
/// First value that no longer fits `total_price`
const MAX_PRICE_EXCLUSIVE: i64 = 10_000_000_000;

fn validate_rental_period(rental: &CreateRental) -> Result<(), ValidationError> {
    if rental.end_date <= rental.start_date {
        return Err(ValidationError::new("end_date_not_after_start_date"));
    }
    if rental.total_price <= Decimal::ZERO {
        return Err(ValidationError::new("total_price_not_positive"));
    }
    // Stored as NUMERIC(12, 2)
    if rental.total_price.normalize().scale() > PRICE_SCALE {
        return Err(ValidationError::new("total_price_too_precise"));
    }
    if rental.total_price >= Decimal::new(MAX_PRICE_EXCLUSIVE, 0) {
        return Err(ValidationError::new("total_price_too_large"));
    }
    Ok(())
}

/// Payment gateway callback outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Succeeded,
    Failed,
    CashOnDelivery,
}
