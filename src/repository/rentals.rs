//! Rentals repository for database operations

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::WriteOutcome;
use crate::{
    error::AppResult,
    models::{
        enums::{PaymentStatus, RentalStatus},
        rental::{Rental, RentalRow},
    },
};

/// Stored names of the occupying statuses, for `= ANY($n)` filters
fn occupying_statuses() -> Vec<String> {
    RentalStatus::ALL
        .into_iter()
        .filter(|s| s.is_occupying())
        .map(|s| s.as_str().to_string())
        .collect()
}

#[derive(Clone)]
pub struct RentalsRepository {
    pool: Pool<Postgres>,
}

impl RentalsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get rental by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Rental>> {
        sqlx::query_as::<_, RentalRow>("SELECT * FROM rentals WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Rental::try_from)
            .transpose()
    }

    /// Insert a new rental
    pub async fn create(&self, rental: &Rental) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO rentals (
                id, equipment_id, renter_id, owner_id, start_date, end_date,
                status, payment_status, total_price, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(rental.id)
        .bind(rental.equipment_id)
        .bind(rental.renter_id)
        .bind(rental.owner_id)
        .bind(rental.start_date)
        .bind(rental.end_date)
        .bind(rental.status.as_str())
        .bind(rental.payment_status.as_str())
        .bind(rental.total_price)
        .bind(rental.created_at)
        .bind(rental.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Compare-and-set the rental status
    pub async fn update_status(
        &self,
        id: Uuid,
        status: RentalStatus,
        expected_prior: RentalStatus,
        updated_at: DateTime<Utc>,
    ) -> AppResult<WriteOutcome> {
        let result = sqlx::query(
            "UPDATE rentals SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4",
        )
        .bind(status.as_str())
        .bind(updated_at)
        .bind(id)
        .bind(expected_prior.as_str())
        .execute(&self.pool)
        .await?;

        Ok(if result.rows_affected() == 1 {
            WriteOutcome::Applied
        } else {
            WriteOutcome::Conflict
        })
    }

    /// Update payment status
    pub async fn update_payment_status(&self, id: Uuid, status: PaymentStatus) -> AppResult<()> {
        sqlx::query("UPDATE rentals SET payment_status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Count occupying rentals for an equipment
    pub async fn count_occupying(
        &self,
        equipment_id: Uuid,
        excluding_rental_id: Option<Uuid>,
    ) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM rentals
            WHERE equipment_id = $1
              AND status = ANY($2)
              AND ($3::uuid IS NULL OR id <> $3)
            "#,
        )
        .bind(equipment_id)
        .bind(occupying_statuses())
        .bind(excluding_rental_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
